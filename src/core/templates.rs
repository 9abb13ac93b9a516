//! Resolves a `(runtime, template)` pair across every known repository and
//! materializes the chosen template into a Function's root.

use crate::core::error::FuncError;
use crate::core::function::Function;
use crate::core::repositories::Repositories;
use crate::core::sorted_set::SortedSet;

/// A thin view over `Repositories` that knows how template full names are built:
/// bare (`http`) for the default repository, `repo/template` for any other.
pub struct Templates<'a> {
    repositories: &'a Repositories,
}

impl<'a> Templates<'a> {
    pub fn new(repositories: &'a Repositories) -> Templates<'a> {
        Templates { repositories }
    }

    /// Every template full name available for `runtime`, across all repositories.
    /// Default-repository names come first (bare), in sorted order, followed by each
    /// extended repository's names (prefixed `repo/`), also sorted. Duplicate full
    /// names are dropped, first occurrence wins.
    pub fn list(&self, runtime: &str) -> Result<Vec<String>, FuncError> {
        let mut seen = SortedSet::new();
        let mut out = Vec::new();
        for repo in self.repositories.all()? {
            let names = match repo.templates(runtime) {
                Ok(names) => names,
                Err(_) => continue,
            };
            for name in names {
                let fullname = if repo.name == "default" {
                    name
                } else {
                    format!("{}/{name}", repo.name)
                };
                if !seen.contains(&fullname) {
                    seen.insert(fullname.clone());
                    out.push(fullname);
                }
            }
        }
        Ok(out)
    }

    fn split_fullname(fullname: &str) -> (&str, &str) {
        match fullname.split_once('/') {
            Some((repo, template)) => (repo, template),
            None => ("default", fullname),
        }
    }

    /// Materialize `fullname` (bare for the default repository, `repo/template`
    /// otherwise) into `function.root`, then apply any inherited defaults the
    /// repository/runtime/template manifests declare onto `function`.
    pub fn write(&self, function: &mut Function, fullname: &str) -> Result<(), FuncError> {
        let (repo_name, template_name) = Self::split_fullname(fullname);
        let repo = self.repositories.get(repo_name)?;
        let manifest = repo.materialize(&function.runtime, template_name, &function.root)?;
        manifest.apply_defaults(function);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::function::InvocationFormat;
    use tempfile::tempdir;

    #[test]
    fn list_includes_embedded_default_templates_bare() {
        let repos = Repositories::new(None);
        let templates = Templates::new(&repos);
        let names = templates.list("go").unwrap();
        assert!(names.contains(&"http".to_string()));
        assert!(names.contains(&"cloudevent".to_string()));
    }

    #[test]
    fn list_prefixes_extended_repository_names() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("mine/go/grpc")).unwrap();
        std::fs::write(dir.path().join("mine/go/grpc/handle.go"), "package function").unwrap();

        let repos = Repositories::new(Some(dir.path().to_path_buf()));
        let templates = Templates::new(&repos);
        let names = templates.list("go").unwrap();
        assert!(names.contains(&"mine/grpc".to_string()));
        assert!(names.contains(&"http".to_string()));
    }

    #[test]
    fn write_materializes_files_and_applies_invocation_default() {
        let repos = Repositories::new(None);
        let templates = Templates::new(&repos);

        let root = tempdir().unwrap();
        let mut function = Function {
            name: "hello".to_string(),
            runtime: "go".to_string(),
            registry: "alice".to_string(),
            root: root.path().to_path_buf(),
            created: 1,
            ..Function::default()
        };

        templates.write(&mut function, "http").unwrap();

        assert!(root.path().join("handle.go").exists());
        assert!(!root.path().join("manifest.yaml").exists());
        assert_eq!(function.invocation.unwrap().format, InvocationFormat::Http);
    }

    #[test]
    fn write_unknown_template_errors() {
        let repos = Repositories::new(None);
        let templates = Templates::new(&repos);
        let root = tempdir().unwrap();
        let mut function = Function {
            name: "hello".to_string(),
            runtime: "go".to_string(),
            root: root.path().to_path_buf(),
            ..Function::default()
        };
        assert!(templates.write(&mut function, "nonexistent").is_err());
    }
}
