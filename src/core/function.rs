//! The Function entity: a typed, on-disk project representation.
//!
//! A Function is persisted as exactly one document, `<Root>/func.yaml`. This module
//! owns its shape, its load/validate/write lifecycle, image-name derivation, the
//! build fingerprint, and env/label interpolation.

use crate::core::defaults;
use crate::core::error::FuncError;
use crate::core::migration;
use crate::core::time;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn dns_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").unwrap())
}

fn env_interp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\{\{\s*env:([A-Za-z_][A-Za-z0-9_]*)\s*\}\}$").unwrap())
}

fn secret_interp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\{\{\s*secret:([A-Za-z0-9_.-]+)(?::([A-Za-z0-9_.-]+))?\s*\}\}$").unwrap()
    })
}

fn config_map_interp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\{\{\s*configMap:([A-Za-z0-9_.-]+)(?::([A-Za-z0-9_.-]+))?\s*\}\}$").unwrap()
    })
}

/// A K8s label name: an optional `domain/` prefix followed by a short name.
fn label_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^([a-z0-9]([-a-z0-9.]*[a-z0-9])?/)?[A-Za-z0-9]([-A-Za-z0-9_.]{0,61}[A-Za-z0-9])?$",
        )
        .unwrap()
    })
}

fn label_value_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z0-9]([-A-Za-z0-9_.]{0,61}[A-Za-z0-9])?)?$").unwrap())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildType {
    Local,
    Git,
    Disabled,
}

impl Default for BuildType {
    fn default() -> Self {
        BuildType::Local
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationFormat {
    Http,
    #[serde(rename = "cloudevent")]
    CloudEvent,
}

impl Default for InvocationFormat {
    fn default() -> Self {
        InvocationFormat::Http
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitConfig {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "contextDir")]
    pub context_dir: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "configMap")]
    pub config_map: Option<String>,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Options {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_scale: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_scale: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency_target: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_limit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthEndpoints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invocation {
    pub format: InvocationFormat,
}

/// The central entity: a typed, on-disk project representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Function {
    pub spec_version: String,

    /// Absolute path on disk. Never persisted; derived on load.
    #[serde(skip)]
    pub root: PathBuf,

    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub runtime: String,
    #[serde(default = "default_template")]
    pub template: String,
    #[serde(default)]
    pub registry: String,
    #[serde(default)]
    pub image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_digest: String,
    #[serde(default)]
    pub build_type: BuildType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitConfig>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub builder_images: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buildpacks: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_envs: Vec<EnvVar>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<EnvVar>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub options: Options,
    #[serde(default)]
    pub health_endpoints: HealthEndpoints,
    /// Unix-epoch seconds of first successful create. Zero means "not initialized".
    #[serde(default)]
    pub created: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocation: Option<Invocation>,
}

fn default_template() -> String {
    defaults::DEFAULT_TEMPLATE.to_string()
}

impl Default for Function {
    fn default() -> Self {
        Function {
            spec_version: String::new(),
            root: PathBuf::new(),
            name: String::new(),
            namespace: None,
            runtime: String::new(),
            template: default_template(),
            registry: String::new(),
            image: String::new(),
            image_digest: String::new(),
            build_type: BuildType::default(),
            git: None,
            builder_images: BTreeMap::new(),
            buildpacks: Vec::new(),
            volumes: Vec::new(),
            build_envs: Vec::new(),
            envs: Vec::new(),
            labels: Vec::new(),
            options: Options::default(),
            health_endpoints: HealthEndpoints::default(),
            created: 0,
            invocation: None,
        }
    }
}

impl Function {
    /// Load and validate a Function from `<path>/func.yaml`, applying any pending
    /// schema migrations and setting `root` to the absolute form of `path`.
    ///
    /// Fails with `NotInitialized` if the file does not exist, so callers can
    /// distinguish "not a Function directory" from "invalid Function".
    pub fn load(path: &Path) -> Result<Function, FuncError> {
        let root = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf());
        let func_path = root.join(defaults::FUNCTION_FILE);
        if !func_path.is_file() {
            return Err(FuncError::NotInitialized(format!(
                "{} does not exist",
                func_path.display()
            )));
        }

        let raw = fs::read_to_string(&func_path)?;
        let mut doc: serde_yaml::Value =
            serde_yaml::from_str(&raw).map_err(|e| FuncError::yaml_parse(&func_path, e))?;

        migration::migrate(&mut doc)?;

        let mut function: Function = serde_yaml::from_value(doc)
            .map_err(|e| FuncError::yaml_parse(&func_path, e))?;
        function.root = root;
        function.validate()?;
        Ok(function)
    }

    /// Collect every field-level validation problem, grouped by field, into one
    /// bundled error. Returns `Ok(())` iff the Function is fully valid.
    pub fn validate(&self) -> Result<(), FuncError> {
        let mut problems: Vec<String> = Vec::new();

        if !dns_label_re().is_match(&self.name) {
            problems.push(format!(
                "name: {:?} must match ^[a-z0-9]([-a-z0-9]*[a-z0-9])?$",
                self.name
            ));
        }
        if self.runtime.trim().is_empty() {
            problems.push("runtime: must not be empty".to_string());
        }
        if self.root.as_os_str().is_empty() {
            problems.push("root: must be set".to_string());
        }

        match self.build_type {
            BuildType::Git => {
                match &self.git {
                    Some(g) if !g.url.trim().is_empty() => {}
                    _ => problems.push("git.url: required when buildType is git".to_string()),
                }
            }
            _ => {}
        }

        for (idx, v) in self.volumes.iter().enumerate() {
            let has_secret = v.secret.is_some();
            let has_cm = v.config_map.is_some();
            if has_secret == has_cm {
                problems.push(format!(
                    "volumes[{idx}]: exactly one of secret or configMap is required"
                ));
            }
            if v.path.trim().is_empty() {
                problems.push(format!("volumes[{idx}].path: must not be empty"));
            }
        }

        for (idx, e) in self.build_envs.iter().enumerate() {
            validate_env("buildEnvs", idx, e, &mut problems);
        }
        for (idx, e) in self.envs.iter().enumerate() {
            validate_env("envs", idx, e, &mut problems);
        }

        for (idx, l) in self.labels.iter().enumerate() {
            if l.key.trim().is_empty() || !label_key_re().is_match(&l.key) {
                problems.push(format!("labels[{idx}].key: {:?} is not a valid label key", l.key));
            }
            if let Some(v) = &l.value {
                if !env_interp_re().is_match(v) && !label_value_re().is_match(v) {
                    problems.push(format!(
                        "labels[{idx}].value: {:?} is not a valid label value",
                        v
                    ));
                }
            }
        }

        if let (Some(min), Some(max)) = (self.options.min_scale, self.options.max_scale) {
            if min > max {
                problems.push("options.minScale: must not exceed options.maxScale".to_string());
            }
        }
        if let (Some(target), Some(limit)) = (
            self.options.concurrency_target,
            self.options.concurrency_limit,
        ) {
            if limit > 0 && target > limit {
                problems.push(
                    "options.concurrencyTarget: must not exceed options.concurrencyLimit"
                        .to_string(),
                );
            }
        }

        if !matches!(
            self.build_type,
            BuildType::Local | BuildType::Git | BuildType::Disabled
        ) {
            problems.push("buildType: must be one of local, git, disabled".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(FuncError::Validation(problems.join("\n")))
        }
    }

    /// Serialize to YAML and write atomically to `<root>/func.yaml` with mode 0644.
    pub fn write(&self) -> Result<(), FuncError> {
        self.validate()?;
        let func_path = self.root.join(defaults::FUNCTION_FILE);
        let yaml = serde_yaml::to_string(self)
            .map_err(|e| FuncError::Yaml(format!("failed to serialize function: {e}")))?;

        let tmp_path = func_path.with_extension("yaml.tmp");
        {
            let mut tmp = fs::File::create(&tmp_path)?;
            tmp.write_all(yaml.as_bytes())?;
            tmp.sync_all()?;
        }
        set_mode(&tmp_path, 0o644)?;
        fs::rename(&tmp_path, &func_path)?;
        Ok(())
    }

    /// True iff `Created` is non-zero and `func.yaml` parses (callers typically check
    /// this right after `Function::load`, which already implies it).
    pub fn is_initialized(&self) -> bool {
        self.created != 0
    }

    /// Derive `Image` from `Registry` + `Name` per the image-name derivation rules.
    pub fn image_name(&self) -> Result<String, FuncError> {
        derive_image_name(&self.registry, &self.name)
    }

    /// Stamp Image with the derived value if it is currently unset.
    pub fn ensure_image(&mut self) -> Result<(), FuncError> {
        if self.image.trim().is_empty() {
            self.image = self.image_name()?;
        }
        Ok(())
    }

    /// Produce a map from each Env's name to its resolved value: literals pass
    /// through, `{{ env:NAME }}` resolves from the process environment (missing is
    /// an error), and secret/configMap-shaped values are left untouched for the
    /// deployer to resolve against the cluster.
    pub fn interpolate(&self, envs: &[EnvVar]) -> Result<BTreeMap<String, String>, FuncError> {
        let mut out = BTreeMap::new();
        for e in envs {
            let Some(value) = &e.value else {
                continue;
            };
            if let Some(caps) = env_interp_re().captures(value) {
                let var = &caps[1];
                let resolved = std::env::var(var)?;
                out.insert(e.name.clone(), resolved);
            } else if secret_interp_re().is_match(value) || config_map_interp_re().is_match(value)
            {
                out.insert(e.name.clone(), value.clone());
            } else {
                out.insert(e.name.clone(), value.clone());
            }
        }
        Ok(out)
    }
}

fn validate_env(field: &str, idx: usize, e: &EnvVar, problems: &mut Vec<String>) {
    if e.name.trim().is_empty() {
        problems.push(format!("{field}[{idx}].name: must not be empty"));
    }
    if let Some(v) = &e.value {
        let shaped = env_interp_re().is_match(v)
            || secret_interp_re().is_match(v)
            || config_map_interp_re().is_match(v);
        // Any literal value is allowed; interpolation-shaped values must match exactly.
        if v.trim_start().starts_with("{{") && !shaped {
            problems.push(format!(
                "{field}[{idx}].value: {:?} looks like an interpolation but does not match env:/secret:/configMap: syntax",
                v
            ));
        }
    }
}

/// `{Registry: "alice", Name: "f"} -> docker.io/alice/f:latest`; registries with 2 or
/// 3 path segments are used as-is; 4+ segments mean the image name was embedded in the
/// registry, which is an error; empty Name or Registry is an error.
pub fn derive_image_name(registry: &str, name: &str) -> Result<String, FuncError> {
    if name.trim().is_empty() {
        return Err(FuncError::MissingConfig("Name is required to derive Image".to_string()));
    }
    if registry.trim().is_empty() {
        return Err(FuncError::MissingConfig(
            "Registry is required to derive Image".to_string(),
        ));
    }

    let segments: Vec<&str> = registry.split('/').filter(|s| !s.is_empty()).collect();
    let base = match segments.len() {
        1 => format!("{}/{}", defaults::DEFAULT_REGISTRY, segments[0]),
        2 | 3 => segments.join("/"),
        _ => {
            return Err(FuncError::Validation(format!(
                "registry {registry:?} has too many path segments; the image name must not be embedded in Registry"
            )))
        }
    };
    Ok(format!("{base}/{name}:latest"))
}

/// Fails if `dir` is not "effectively empty": any `func.yaml`, any `.gitignore`, or
/// any non-hidden entry disqualifies it.
pub fn ensure_empty_root(dir: &Path) -> Result<(), FuncError> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();
        if name == defaults::FUNCTION_FILE || name == ".gitignore" {
            return Err(FuncError::AlreadyInitialized(format!(
                "{} already contains {}",
                dir.display(),
                name
            )));
        }
        if !name.starts_with('.') {
            return Err(FuncError::AlreadyInitialized(format!(
                "{} is not empty: found {}",
                dir.display(),
                name
            )));
        }
    }
    Ok(())
}

/// SHA-256 over the concatenation of each source file's path plus its modification
/// time in nanoseconds, visiting the tree in filesystem walk order and skipping
/// `.func` and `.git`.
pub fn fingerprint(root: &Path) -> Result<String, FuncError> {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    let mut entries = Vec::new();
    walk(root, root, &mut entries)?;
    entries.sort();
    for (rel, nanos) in entries {
        hasher.update(rel.as_bytes());
        hasher.update(nanos.to_string().as_bytes());
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<(String, u128)>) -> Result<(), FuncError> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<Result<_, _>>()?;
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if name_str == defaults::RUN_DATA_DIR || name_str == ".git" {
            continue;
        }
        let path = entry.path();
        let meta = entry.metadata()?;
        if meta.is_dir() {
            walk(root, &path, out)?;
        } else {
            let rel = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            out.push((rel, time::mtime_nanos(&meta)));
        }
    }
    Ok(())
}

/// True iff the Function loads, has an Image or ImageDigest, `.func/built` exists,
/// and its contents equal the current fingerprint.
pub fn is_built(root: &Path) -> bool {
    let Ok(function) = Function::load(root) else {
        return false;
    };
    if function.image.is_empty() && function.image_digest.is_empty() {
        return false;
    }
    let built_path = root.join(defaults::RUN_DATA_DIR).join(defaults::BUILT_FILE);
    let Ok(recorded) = fs::read_to_string(&built_path) else {
        return false;
    };
    let Ok(current) = fingerprint(root) else {
        return false;
    };
    recorded.trim() == current
}

/// Stamp `<root>/.func/built` with the current fingerprint.
pub fn write_built_fingerprint(root: &Path) -> Result<(), FuncError> {
    let dir = root.join(defaults::RUN_DATA_DIR);
    fs::create_dir_all(&dir)?;
    let fp = fingerprint(root)?;
    fs::write(dir.join(defaults::BUILT_FILE), fp)?;
    Ok(())
}

/// Ensure `<root>/.func/` exists and `<root>/.gitignore` ignores it.
pub fn ensure_run_data_dir(root: &Path) -> Result<(), FuncError> {
    fs::create_dir_all(root.join(defaults::RUN_DATA_DIR))?;
    ensure_gitignore_entry(root, &format!("/{}", defaults::RUN_DATA_DIR))
}

/// Ensure a given entry exists in the project's `.gitignore` file. Creates the file
/// if it doesn't exist; appends the entry if not already present.
pub fn ensure_gitignore_entry(root: &Path, entry: &str) -> Result<(), FuncError> {
    let gitignore_path = root.join(".gitignore");
    let content = fs::read_to_string(&gitignore_path).unwrap_or_default();
    if content.lines().any(|line| line.trim() == entry) {
        return Ok(());
    }
    let mut new_content = content;
    if !new_content.is_empty() && !new_content.ends_with('\n') {
        new_content.push('\n');
    }
    new_content.push_str(entry);
    new_content.push('\n');
    fs::write(&gitignore_path, new_content)?;
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), FuncError> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(mode);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<(), FuncError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Function {
        Function {
            spec_version: "0.34.0".to_string(),
            root: PathBuf::from("/tmp/irrelevant-for-round-trip"),
            name: "hello".to_string(),
            runtime: "go".to_string(),
            registry: "alice".to_string(),
            created: 12345,
            ..Function::default()
        }
    }

    #[test]
    fn image_name_single_token_registry_prepends_docker_io() {
        assert_eq!(
            derive_image_name("alice", "f").unwrap(),
            "docker.io/alice/f:latest"
        );
    }

    #[test]
    fn image_name_two_token_registry_used_as_is() {
        assert_eq!(
            derive_image_name("quay.io/alice", "f").unwrap(),
            "quay.io/alice/f:latest"
        );
    }

    #[test]
    fn image_name_three_token_registry_used_as_is() {
        assert_eq!(
            derive_image_name("docker.io/alice/sub", "f").unwrap(),
            "docker.io/alice/sub/f:latest"
        );
    }

    #[test]
    fn image_name_rejects_embedded_image_name() {
        assert!(derive_image_name("docker.io/alice/sub/extra", "f").is_err());
    }

    #[test]
    fn image_name_requires_name_and_registry() {
        assert!(derive_image_name("alice", "").is_err());
        assert!(derive_image_name("", "f").is_err());
    }

    #[test]
    fn write_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let mut f = sample();
        f.root = dir.path().to_path_buf();
        f.write().unwrap();

        let loaded = Function::load(dir.path()).unwrap();
        assert_eq!(loaded.name, f.name);
        assert_eq!(loaded.runtime, f.runtime);
        assert_eq!(loaded.registry, f.registry);
        assert_eq!(loaded.created, f.created);
        assert_eq!(loaded.spec_version, f.spec_version);
    }

    #[test]
    fn validate_rejects_bad_name() {
        let mut f = sample();
        f.name = "Not_A_Label".to_string();
        assert!(f.validate().is_err());
    }

    #[test]
    fn validate_requires_git_config_when_git_build_type() {
        let mut f = sample();
        f.build_type = BuildType::Git;
        assert!(f.validate().is_err());
        f.git = Some(GitConfig {
            url: "https://example.com/repo.git".to_string(),
            ..GitConfig::default()
        });
        assert!(f.validate().is_ok());
    }

    #[test]
    fn validate_rejects_volume_with_both_secret_and_config_map() {
        let mut f = sample();
        f.volumes.push(Volume {
            secret: Some("s".to_string()),
            config_map: Some("c".to_string()),
            path: "/mnt".to_string(),
        });
        assert!(f.validate().is_err());
    }

    #[test]
    fn validate_rejects_volume_with_neither() {
        let mut f = sample();
        f.volumes.push(Volume {
            path: "/mnt".to_string(),
            ..Volume::default()
        });
        assert!(f.validate().is_err());
    }

    #[test]
    fn interpolate_resolves_env_reference() {
        unsafe {
            std::env::set_var("FUNCCTL_TEST_VAR", "value123");
        }
        let f = sample();
        let envs = vec![EnvVar {
            name: "X".to_string(),
            value: Some("{{ env:FUNCCTL_TEST_VAR }}".to_string()),
        }];
        let resolved = f.interpolate(&envs).unwrap();
        assert_eq!(resolved.get("X").unwrap(), "value123");
    }

    #[test]
    fn interpolate_leaves_secret_reference_untouched() {
        let f = sample();
        let envs = vec![EnvVar {
            name: "X".to_string(),
            value: Some("{{ secret:my-secret:key }}".to_string()),
        }];
        let resolved = f.interpolate(&envs).unwrap();
        assert_eq!(resolved.get("X").unwrap(), "{{ secret:my-secret:key }}");
    }

    #[test]
    fn empty_root_rejects_existing_func_yaml() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("func.yaml"), "name: x").unwrap();
        assert!(ensure_empty_root(dir.path()).is_err());
    }

    #[test]
    fn empty_root_rejects_non_hidden_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("README.md"), "hi").unwrap();
        assert!(ensure_empty_root(dir.path()).is_err());
    }

    #[test]
    fn empty_root_allows_hidden_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".editorconfig"), "").unwrap();
        assert!(ensure_empty_root(dir.path()).is_ok());
    }

    #[test]
    fn fingerprint_changes_when_a_source_file_changes() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("main.go"), "package main").unwrap();
        let fp1 = fingerprint(dir.path()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        fs::write(dir.path().join("main.go"), "package main\n// changed").unwrap();
        let fp2 = fingerprint(dir.path()).unwrap();
        assert_ne!(fp1, fp2);
    }

    #[test]
    fn fingerprint_ignores_func_and_git_dirs() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("main.go"), "package main").unwrap();
        let fp1 = fingerprint(dir.path()).unwrap();
        fs::create_dir_all(dir.path().join(".func")).unwrap();
        fs::write(dir.path().join(".func").join("scratch"), "xyz").unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git").join("HEAD"), "ref: refs/heads/main").unwrap();
        let fp2 = fingerprint(dir.path()).unwrap();
        assert_eq!(fp1, fp2);
    }

    #[test]
    fn is_built_false_before_build_true_after() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("main.go"), "package main").unwrap();
        let mut f = sample();
        f.root = dir.path().to_path_buf();
        f.write().unwrap();

        assert!(!is_built(dir.path()));

        f.image = "docker.io/alice/hello:latest".to_string();
        f.write().unwrap();
        write_built_fingerprint(dir.path()).unwrap();
        assert!(is_built(dir.path()));
    }
}
