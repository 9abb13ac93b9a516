//! The set of template repositories funcctl knows about: the embedded `default`
//! repository, always present and always first, plus zero or more extended
//! repositories cloned under a repositories directory on disk.

use crate::core::error::FuncError;
use crate::core::fsview::{EmbeddedFsView, GitFsView, HostFsView};
use crate::core::repository::Repository;
use rust_embed::RustEmbed;
use std::path::{Path, PathBuf};

#[derive(RustEmbed)]
#[folder = "embedded_templates/"]
struct DefaultRepoAssets;

const DEFAULT_NAME: &str = "default";

/// Manages repository discovery, addition, and removal. In the common case this
/// wraps a `repositories_path` directory on disk (one subdirectory per extended
/// repository); in single-URI override mode it instead serves exactly one
/// repository, cloned on demand and addressed as `"default"`.
pub struct Repositories {
    repositories_path: Option<PathBuf>,
    single_uri_override: Option<String>,
}

impl Repositories {
    pub fn new(repositories_path: Option<PathBuf>) -> Repositories {
        Repositories {
            repositories_path,
            single_uri_override: None,
        }
    }

    /// Restrict this manager to exactly one repository, served from `uri` and always
    /// addressed as `"default"`, regardless of `repositories_path`.
    pub fn with_single_uri_override(uri: impl Into<String>) -> Repositories {
        Repositories {
            repositories_path: None,
            single_uri_override: Some(uri.into()),
        }
    }

    fn default_repository(&self) -> Result<Repository, FuncError> {
        if let Some(uri) = &self.single_uri_override {
            let view = open_uri(uri)?;
            return Ok(Repository::new(DEFAULT_NAME, view));
        }
        Ok(Repository::new(
            DEFAULT_NAME,
            Box::new(EmbeddedFsView::<DefaultRepoAssets>::default()),
        ))
    }

    /// Every known repository, `default` always first, extended repositories sorted
    /// by name after it. Ignored entirely in single-URI override mode.
    pub fn all(&self) -> Result<Vec<Repository>, FuncError> {
        let mut out = vec![self.default_repository()?];
        if self.single_uri_override.is_some() {
            return Ok(out);
        }
        if let Some(path) = &self.repositories_path {
            if path.is_dir() {
                let mut names: Vec<String> = std::fs::read_dir(path)?
                    .filter_map(|e| e.ok())
                    .filter(|e| e.path().is_dir())
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect();
                names.sort();
                for name in names {
                    out.push(Repository::new(
                        name.clone(),
                        Box::new(HostFsView::new(path.join(&name))),
                    ));
                }
            }
        }
        Ok(out)
    }

    /// Look up a single repository by name.
    pub fn get(&self, name: &str) -> Result<Repository, FuncError> {
        self.all()?
            .into_iter()
            .find(|r| r.name == name)
            .ok_or_else(|| FuncError::NotFound(format!("repository {name:?} not found")))
    }

    /// Clone `uri` into `<repositories_path>/<name>`, making it available as an
    /// extended repository.
    pub fn add(&self, name: &str, uri: &str) -> Result<(), FuncError> {
        if name == DEFAULT_NAME {
            return Err(FuncError::Validation(
                "default is a reserved repository name".to_string(),
            ));
        }
        let base = self.repositories_path.as_ref().ok_or_else(|| {
            FuncError::MissingConfig("no repositories path is configured".to_string())
        })?;
        std::fs::create_dir_all(base)?;
        let dest = base.join(name);
        if dest.exists() {
            return Err(FuncError::AlreadyInitialized(format!(
                "repository {name:?} already exists"
            )));
        }
        clone_into(uri, &dest)
    }

    pub fn rename(&self, from: &str, to: &str) -> Result<(), FuncError> {
        if from == DEFAULT_NAME || to == DEFAULT_NAME {
            return Err(FuncError::Validation(
                "default is a reserved repository name".to_string(),
            ));
        }
        let base = self.repositories_path.as_ref().ok_or_else(|| {
            FuncError::MissingConfig("no repositories path is configured".to_string())
        })?;
        let src = base.join(from);
        let dst = base.join(to);
        if !src.is_dir() {
            return Err(FuncError::NotFound(format!("repository {from:?} not found")));
        }
        std::fs::rename(src, dst)?;
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Result<(), FuncError> {
        if name == DEFAULT_NAME {
            return Err(FuncError::Validation(
                "the default repository cannot be removed".to_string(),
            ));
        }
        let base = self.repositories_path.as_ref().ok_or_else(|| {
            FuncError::MissingConfig("no repositories path is configured".to_string())
        })?;
        let dir = base.join(name);
        if !dir.is_dir() {
            return Err(FuncError::NotFound(format!("repository {name:?} not found")));
        }
        std::fs::remove_dir_all(dir)?;
        Ok(())
    }
}

fn open_uri(uri: &str) -> Result<Box<dyn crate::core::fsview::FsView>, FuncError> {
    if Path::new(uri).is_dir() {
        Ok(Box::new(HostFsView::new(uri)))
    } else {
        Ok(Box::new(GitFsView::clone_shallow(uri, None)?))
    }
}

fn clone_into(uri: &str, dest: &Path) -> Result<(), FuncError> {
    if Path::new(uri).is_dir() {
        crate::core::fsview::copy_tree(&HostFsView::new(uri), "", dest)
    } else {
        let output = std::process::Command::new("git")
            .arg("clone")
            .arg("--quiet")
            .arg(uri)
            .arg(dest)
            .output()
            .map_err(|e| FuncError::transport(format!("git clone {uri}"), e))?;
        if !output.status.success() {
            return Err(FuncError::Transport {
                context: format!("git clone {uri}"),
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    String::from_utf8_lossy(&output.stderr).trim().to_string(),
                )),
            });
        }
        Ok(())
    }
}
