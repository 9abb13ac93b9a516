//! A read-only filesystem view with three backends: an embedded archive, a host
//! directory, and an in-memory-shaped git clone. Everything downstream (template
//! resolution, materialization) talks to `dyn FsView` and never knows which backend
//! it got.

use crate::core::error::FuncError;
use rust_embed::RustEmbed;
use std::fs;
use std::marker::PhantomData;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File { executable: bool },
    Dir,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// A read-only view with three operations: open a file, list a directory, stat a
/// name. `path` arguments are always `/`-separated, repo-relative, with no leading
/// slash (e.g. `"go/http/handle.go"`, or `""` for the root).
pub trait FsView: Send + Sync {
    fn open(&self, path: &str) -> Result<Vec<u8>, FuncError>;
    fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, FuncError>;
    fn stat(&self, path: &str) -> Result<EntryKind, FuncError>;
}

fn not_found(path: &str) -> FuncError {
    FuncError::NotFound(format!("path {path:?} not found"))
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').to_string()
}

fn join_rel(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{base}/{name}")
    }
}

/// Backed by a `rust-embed` archive compiled into the binary. Directory listings are
/// computed by scanning every embedded entry whose parent equals the query, since
/// `rust-embed` only enumerates leaf files.
pub struct EmbeddedFsView<T: RustEmbed> {
    _marker: PhantomData<T>,
}

impl<T: RustEmbed> Default for EmbeddedFsView<T> {
    fn default() -> Self {
        EmbeddedFsView {
            _marker: PhantomData,
        }
    }
}

impl<T: RustEmbed + Send + Sync> FsView for EmbeddedFsView<T> {
    fn open(&self, path: &str) -> Result<Vec<u8>, FuncError> {
        let path = normalize(path);
        T::get(&path)
            .map(|f| f.data.into_owned())
            .ok_or_else(|| not_found(&path))
    }

    fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, FuncError> {
        let prefix = normalize(path);
        let mut seen_dirs = std::collections::BTreeSet::new();
        let mut out = Vec::new();
        for file in T::iter() {
            let file = file.as_ref();
            let rest = if prefix.is_empty() {
                Some(file)
            } else {
                file.strip_prefix(&prefix)
                    .and_then(|r| r.strip_prefix('/'))
            };
            let Some(rest) = rest else { continue };
            if rest.is_empty() {
                continue;
            }
            match rest.find('/') {
                None => out.push(DirEntry {
                    name: rest.to_string(),
                    kind: EntryKind::File { executable: false },
                }),
                Some(idx) => {
                    let dir_name = &rest[..idx];
                    if seen_dirs.insert(dir_name.to_string()) {
                        out.push(DirEntry {
                            name: dir_name.to_string(),
                            kind: EntryKind::Dir,
                        });
                    }
                }
            }
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn stat(&self, path: &str) -> Result<EntryKind, FuncError> {
        let path = normalize(path);
        if T::get(&path).is_some() {
            return Ok(EntryKind::File { executable: false });
        }
        let dir_prefix = format!("{path}/");
        if T::iter().any(|f| f.as_ref().starts_with(&dir_prefix)) || path.is_empty() {
            return Ok(EntryKind::Dir);
        }
        Err(not_found(&path))
    }
}

/// A prefix-rooted passthrough to the host filesystem, translating the view's `/`
/// path separator to the platform's native separator on input.
pub struct HostFsView {
    root: std::path::PathBuf,
}

impl HostFsView {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        HostFsView { root: root.into() }
    }

    fn native_path(&self, path: &str) -> std::path::PathBuf {
        let path = normalize(path);
        let mut full = self.root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            full.push(segment);
        }
        full
    }
}

impl FsView for HostFsView {
    fn open(&self, path: &str) -> Result<Vec<u8>, FuncError> {
        let full = self.native_path(path);
        fs::read(&full).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                not_found(path)
            } else {
                FuncError::Io(e)
            }
        })
    }

    fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, FuncError> {
        let full = self.native_path(path);
        let mut out = Vec::new();
        let read = fs::read_dir(&full).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                not_found(path)
            } else {
                FuncError::Io(e)
            }
        })?;
        for entry in read {
            let entry = entry?;
            let meta = entry.metadata()?;
            let name = entry.file_name().to_string_lossy().to_string();
            let kind = if meta.is_dir() {
                EntryKind::Dir
            } else {
                EntryKind::File {
                    executable: is_executable(&meta),
                }
            };
            out.push(DirEntry { name, kind });
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn stat(&self, path: &str) -> Result<EntryKind, FuncError> {
        let full = self.native_path(path);
        let meta = fs::metadata(&full).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                not_found(path)
            } else {
                FuncError::Io(e)
            }
        })?;
        Ok(if meta.is_dir() {
            EntryKind::Dir
        } else {
            EntryKind::File {
                executable: is_executable(&meta),
            }
        })
    }
}

#[cfg(unix)]
fn is_executable(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &fs::Metadata) -> bool {
    false
}

/// Shallow-clones a git URL into a private temp directory and exposes it as a
/// `HostFsView` over that clone. The clone (and its temp directory) is owned by this
/// struct and removed on drop.
pub struct GitFsView {
    inner: HostFsView,
    _tempdir: tempfile::TempDir,
}

impl GitFsView {
    pub fn clone_shallow(url: &str, revision: Option<&str>) -> Result<GitFsView, FuncError> {
        let tempdir = tempfile::tempdir()?;
        let mut cmd = std::process::Command::new("git");
        cmd.arg("clone").arg("--depth").arg("1").arg("--quiet");
        if let Some(rev) = revision {
            cmd.arg("--branch").arg(rev);
        }
        cmd.arg(url).arg(tempdir.path());
        let output = cmd
            .output()
            .map_err(|e| FuncError::transport(format!("git clone {url}"), e))?;
        if !output.status.success() {
            return Err(FuncError::Transport {
                context: format!("git clone {url}"),
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    String::from_utf8_lossy(&output.stderr).trim().to_string(),
                )),
            });
        }
        let inner = HostFsView::new(tempdir.path());
        Ok(GitFsView {
            inner,
            _tempdir: tempdir,
        })
    }
}

impl FsView for GitFsView {
    fn open(&self, path: &str) -> Result<Vec<u8>, FuncError> {
        self.inner.open(path)
    }
    fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, FuncError> {
        self.inner.list_dir(path)
    }
    fn stat(&self, path: &str) -> Result<EntryKind, FuncError> {
        self.inner.stat(path)
    }
}

/// Hides a single matching name from directory listings and lookups (used to omit
/// `manifest.yaml` during template materialization).
pub struct MaskingFsView<'a> {
    inner: &'a dyn FsView,
    masked_name: String,
}

impl<'a> MaskingFsView<'a> {
    pub fn new(inner: &'a dyn FsView, masked_name: impl Into<String>) -> Self {
        MaskingFsView {
            inner,
            masked_name: masked_name.into(),
        }
    }

    fn is_masked(&self, path: &str) -> bool {
        path.rsplit('/').next().unwrap_or(path) == self.masked_name
    }
}

impl<'a> FsView for MaskingFsView<'a> {
    fn open(&self, path: &str) -> Result<Vec<u8>, FuncError> {
        if self.is_masked(path) {
            return Err(not_found(path));
        }
        self.inner.open(path)
    }

    fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, FuncError> {
        Ok(self
            .inner
            .list_dir(path)?
            .into_iter()
            .filter(|e| e.name != self.masked_name)
            .collect())
    }

    fn stat(&self, path: &str) -> Result<EntryKind, FuncError> {
        if self.is_masked(path) {
            return Err(not_found(path));
        }
        self.inner.stat(path)
    }
}

/// Lets a borrowed `&dyn FsView` be boxed as a `Box<dyn FsView>` in its own right, so
/// callers that may or may not need to re-root a view (see `Repository::effective_view`)
/// can return either the original view or a `SubFsView` wrapping it from one function.
impl FsView for &dyn FsView {
    fn open(&self, path: &str) -> Result<Vec<u8>, FuncError> {
        (**self).open(path)
    }
    fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, FuncError> {
        (**self).list_dir(path)
    }
    fn stat(&self, path: &str) -> Result<EntryKind, FuncError> {
        (**self).stat(path)
    }
}

/// Re-roots another view at a subdirectory (used when a repository manifest declares
/// a non-default templates path).
pub struct SubFsView<'a> {
    inner: &'a dyn FsView,
    sub_root: String,
}

impl<'a> SubFsView<'a> {
    pub fn new(inner: &'a dyn FsView, sub_root: impl Into<String>) -> Self {
        SubFsView {
            inner,
            sub_root: normalize(&sub_root.into()),
        }
    }

    fn full_path(&self, path: &str) -> String {
        join_rel(&self.sub_root, &normalize(path))
    }
}

impl<'a> FsView for SubFsView<'a> {
    fn open(&self, path: &str) -> Result<Vec<u8>, FuncError> {
        self.inner.open(&self.full_path(path))
    }
    fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, FuncError> {
        self.inner.list_dir(&self.full_path(path))
    }
    fn stat(&self, path: &str) -> Result<EntryKind, FuncError> {
        self.inner.stat(&self.full_path(path))
    }
}

/// Recursively copies `sub_path` of `view` into the host directory `dest`, creating
/// intermediate directories with mode 0755 and preserving file mode from the source.
/// Fails fast on the first I/O error.
pub fn copy_tree(view: &dyn FsView, sub_path: &str, dest: &Path) -> Result<(), FuncError> {
    fs::create_dir_all(dest)?;
    set_dir_mode(dest)?;
    for entry in view.list_dir(sub_path)? {
        let child_view_path = join_rel(sub_path, &entry.name);
        let child_dest = dest.join(&entry.name);
        match entry.kind {
            EntryKind::Dir => copy_tree(view, &child_view_path, &child_dest)?,
            EntryKind::File { executable } => {
                let data = view.open(&child_view_path)?;
                fs::write(&child_dest, data)?;
                set_file_mode(&child_dest, executable)?;
            }
        }
    }
    Ok(())
}

#[cfg(unix)]
fn set_dir_mode(path: &Path) -> Result<(), FuncError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_dir_mode(_path: &Path) -> Result<(), FuncError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_mode(path: &Path, executable: bool) -> Result<(), FuncError> {
    use std::os::unix::fs::PermissionsExt;
    let mode = if executable { 0o755 } else { 0o644 };
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_file_mode(_path: &Path, _executable: bool) -> Result<(), FuncError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn host_view_round_trips_nested_file() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/b/c.txt"), b"hi").unwrap();
        let view = HostFsView::new(dir.path());
        assert_eq!(view.open("a/b/c.txt").unwrap(), b"hi");
        let listing = view.list_dir("a").unwrap();
        assert_eq!(listing, vec![DirEntry { name: "b".to_string(), kind: EntryKind::Dir }]);
    }

    #[test]
    fn masking_view_hides_manifest() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("manifest.yaml"), b"x").unwrap();
        fs::write(dir.path().join("main.go"), b"package main").unwrap();
        let host = HostFsView::new(dir.path());
        let masked = MaskingFsView::new(&host, "manifest.yaml");
        let names: Vec<_> = masked.list_dir("").unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["main.go".to_string()]);
        assert!(masked.open("manifest.yaml").is_err());
    }

    #[test]
    fn sub_view_reroots_at_subdirectory() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("templates/go")).unwrap();
        fs::write(dir.path().join("templates/go/main.go"), b"package main").unwrap();
        let host = HostFsView::new(dir.path());
        let sub = SubFsView::new(&host, "templates");
        assert_eq!(sub.open("go/main.go").unwrap(), b"package main");
    }

    #[test]
    fn copy_tree_preserves_structure() {
        let src = tempdir().unwrap();
        fs::create_dir_all(src.path().join("pkg")).unwrap();
        fs::write(src.path().join("pkg/lib.go"), b"package pkg").unwrap();
        fs::write(src.path().join("main.go"), b"package main").unwrap();
        let view = HostFsView::new(src.path());

        let dest = tempdir().unwrap();
        copy_tree(&view, "", dest.path()).unwrap();

        assert_eq!(fs::read(dest.path().join("main.go")).unwrap(), b"package main");
        assert_eq!(fs::read(dest.path().join("pkg/lib.go")).unwrap(), b"package pkg");
    }
}
