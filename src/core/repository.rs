//! A single template repository: an `FsView` laid out as `<runtime>/<template>/...`,
//! with an optional `manifest.yaml` at the repository, runtime, and template level
//! contributing inheritable defaults (nearest wins).

use crate::core::defaults;
use crate::core::error::FuncError;
use crate::core::function::{HealthEndpoints, Invocation};
use crate::core::fsview::{EntryKind, FsView, MaskingFsView, SubFsView};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// The inheritable subset of a Function's configuration that a repository, runtime,
/// or template can default. Every field is optional: `None` means "not set at this
/// level", so merging can tell "unset" apart from "set to empty".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Repository-level only: re-roots runtime/template discovery at this subdirectory
    /// instead of the repository root. Ignored when read from a runtime or template
    /// manifest.
    #[serde(default)]
    pub templates: Option<String>,
    #[serde(default)]
    pub health_endpoints: Option<HealthEndpoints>,
    #[serde(default)]
    pub buildpacks: Option<Vec<String>>,
    #[serde(default)]
    pub builder_images: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub invocation: Option<Invocation>,
}

impl Manifest {
    /// Overlay `more`-specific fields onto `self`, with `more` winning wherever it
    /// sets a field. Used to fold repository -> runtime -> template into one manifest.
    fn layered_with(mut self, more: Manifest) -> Manifest {
        if more.health_endpoints.is_some() {
            self.health_endpoints = more.health_endpoints;
        }
        if more.buildpacks.is_some() {
            self.buildpacks = more.buildpacks;
        }
        if more.builder_images.is_some() {
            self.builder_images = more.builder_images;
        }
        if more.invocation.is_some() {
            self.invocation = more.invocation;
        }
        self
    }

    /// Apply this manifest's defaults onto a loaded function's in-memory fields,
    /// never overwriting a value the function already set explicitly.
    pub fn apply_defaults(&self, function: &mut crate::core::function::Function) {
        if function.health_endpoints == HealthEndpoints::default() {
            if let Some(he) = &self.health_endpoints {
                function.health_endpoints = he.clone();
            }
        }
        if function.buildpacks.is_empty() {
            if let Some(bp) = &self.buildpacks {
                function.buildpacks = bp.clone();
            }
        }
        if function.builder_images.is_empty() {
            if let Some(bi) = &self.builder_images {
                function.builder_images = bi.clone();
            }
        }
        if function.invocation.is_none() {
            function.invocation = self.invocation.clone();
        }
    }
}

fn load_manifest(view: &dyn FsView, dir: &str) -> Result<Manifest, FuncError> {
    let path = if dir.is_empty() {
        defaults::MANIFEST_FILE.to_string()
    } else {
        format!("{dir}/{}", defaults::MANIFEST_FILE)
    };
    match view.open(&path) {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            serde_yaml::from_str(&text)
                .map_err(|e| FuncError::Yaml(format!("{path} is not valid: {e}")))
        }
        Err(_) => Ok(Manifest::default()),
    }
}

/// A named collection of runtime/template directories, backed by an `FsView`.
pub struct Repository {
    pub name: String,
    view: Box<dyn FsView>,
}

impl Repository {
    pub fn new(name: impl Into<String>, view: Box<dyn FsView>) -> Repository {
        Repository {
            name: name.into(),
            view,
        }
    }

    /// The view runtimes/templates are actually listed and materialized under: the
    /// repository root, unless its top-level `manifest.yaml` declares a `templates`
    /// subdirectory, in which case the view is re-rooted there.
    fn effective_view(&self) -> Result<Box<dyn FsView + '_>, FuncError> {
        let repo_manifest = load_manifest(self.view.as_ref(), "")?;
        match repo_manifest.templates {
            Some(sub_root) if !sub_root.trim().is_empty() => {
                Ok(Box::new(SubFsView::new(self.view.as_ref(), sub_root)))
            }
            _ => Ok(Box::new(self.view.as_ref())),
        }
    }

    /// Top-level directory names: the runtimes this repository provides templates for.
    pub fn runtimes(&self) -> Result<Vec<String>, FuncError> {
        let mut out: Vec<String> = self
            .effective_view()?
            .list_dir("")?
            .into_iter()
            .filter(|e| matches!(e.kind, EntryKind::Dir))
            .map(|e| e.name)
            .collect();
        out.sort();
        Ok(out)
    }

    /// Template directory names under a given runtime.
    pub fn templates(&self, runtime: &str) -> Result<Vec<String>, FuncError> {
        let mut out: Vec<String> = self
            .effective_view()?
            .list_dir(runtime)?
            .into_iter()
            .filter(|e| matches!(e.kind, EntryKind::Dir))
            .map(|e| e.name)
            .collect();
        out.sort();
        Ok(out)
    }

    /// The repository-level manifest is always read from the true repository root (it
    /// is the one that may declare `templates`), while the runtime/template manifests
    /// are read from the effective (possibly re-rooted) view.
    fn manifest_for(&self, view: &dyn FsView, runtime: &str, template: &str) -> Result<Manifest, FuncError> {
        let repo_manifest = load_manifest(self.view.as_ref(), "")?;
        let runtime_manifest = load_manifest(view, runtime)?;
        let template_dir = format!("{runtime}/{template}");
        let template_manifest = load_manifest(view, &template_dir)?;
        Ok(repo_manifest
            .layered_with(runtime_manifest)
            .layered_with(template_manifest))
    }

    /// Copy a template's file tree (excluding `manifest.yaml` at every level it could
    /// appear) into `dest`, and return the merged manifest that governs it.
    pub fn materialize(
        &self,
        runtime: &str,
        template: &str,
        dest: &Path,
    ) -> Result<Manifest, FuncError> {
        let view = self.effective_view()?;
        let template_dir = format!("{runtime}/{template}");
        if !self.templates(runtime)?.iter().any(|t| t == template) {
            return Err(FuncError::NotFound(format!(
                "template {template:?} not found for runtime {runtime:?} in repository {:?}",
                self.name
            )));
        }
        let manifest = self.manifest_for(view.as_ref(), runtime, template)?;
        let sub = SubFsView::new(view.as_ref(), template_dir);
        let masked = MaskingFsView::new(&sub, defaults::MANIFEST_FILE);
        crate::core::fsview::copy_tree(&masked, "", dest)?;
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fsview::HostFsView;
    use std::fs;
    use tempfile::tempdir;

    fn sample_repo(dir: &Path) {
        fs::create_dir_all(dir.join("go/http")).unwrap();
        fs::write(dir.join("go/http/handle.go"), "package function").unwrap();
        fs::write(
            dir.join("manifest.yaml"),
            "buildpacks:\n  - gcr.io/paketo-buildpacks/go\n",
        )
        .unwrap();
        fs::write(
            dir.join("go/http/manifest.yaml"),
            "invocation:\n  format: http\n",
        )
        .unwrap();
    }

    #[test]
    fn runtimes_and_templates_list_directories() {
        let dir = tempdir().unwrap();
        sample_repo(dir.path());
        let repo = Repository::new("default", Box::new(HostFsView::new(dir.path())));
        assert_eq!(repo.runtimes().unwrap(), vec!["go".to_string()]);
        assert_eq!(repo.templates("go").unwrap(), vec!["http".to_string()]);
    }

    #[test]
    fn materialize_merges_manifests_and_masks_manifest_file() {
        let dir = tempdir().unwrap();
        sample_repo(dir.path());
        let repo = Repository::new("default", Box::new(HostFsView::new(dir.path())));

        let dest = tempdir().unwrap();
        let manifest = repo.materialize("go", "http", dest.path()).unwrap();

        assert!(dest.path().join("handle.go").exists());
        assert!(!dest.path().join("manifest.yaml").exists());
        assert_eq!(
            manifest.buildpacks.unwrap(),
            vec!["gcr.io/paketo-buildpacks/go".to_string()]
        );
        assert_eq!(manifest.invocation.unwrap().format, crate::core::function::InvocationFormat::Http);
    }

    #[test]
    fn manifest_templates_key_rerooots_runtime_and_template_discovery() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/go/http")).unwrap();
        fs::write(dir.path().join("src/go/http/handle.go"), "package function").unwrap();
        fs::write(dir.path().join("manifest.yaml"), "templates: src\n").unwrap();

        let repo = Repository::new("default", Box::new(HostFsView::new(dir.path())));
        assert_eq!(repo.runtimes().unwrap(), vec!["go".to_string()]);
        assert_eq!(repo.templates("go").unwrap(), vec!["http".to_string()]);

        let dest = tempdir().unwrap();
        repo.materialize("go", "http", dest.path()).unwrap();
        assert!(dest.path().join("handle.go").exists());
    }

    #[test]
    fn materialize_unknown_template_errors() {
        let dir = tempdir().unwrap();
        sample_repo(dir.path());
        let repo = Repository::new("default", Box::new(HostFsView::new(dir.path())));
        let dest = tempdir().unwrap();
        assert!(repo.materialize("go", "cloudevent", dest.path()).is_err());
    }
}
