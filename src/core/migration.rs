//! Ordered schema migrations applied to a Function document on load.
//!
//! A migration is `(target_version, fn)`. The fixed, ordered list below is compiled
//! into the binary. On load, every migration whose target version is strictly newer
//! than the document's current `specVersion` (treating a missing/empty version as
//! `0.0.0`) runs in order against a schema-agnostic YAML mapping, so that the current
//! schema's strictness never blocks reading an older file forward.

use crate::core::error::FuncError;
use serde_yaml::Value;

/// Current funcctl schema version: the target of the last registered migration.
pub const CURRENT_SPEC_VERSION: &str = "0.34.0";

const LEGACY_DEFAULT_BUILDPACK_BUILDER: &str = "docker.io/paketobuildpacks/builder:base";

struct Migration {
    target_version: &'static str,
    up: fn(&mut Value),
}

fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            target_version: "0.19.0",
            up: migrate_creation_stamp,
        },
        Migration {
            target_version: "0.23.0",
            up: migrate_builder_images,
        },
        Migration {
            target_version: "0.25.0",
            up: migrate_spec_version_rename,
        },
        Migration {
            target_version: "0.34.0",
            up: migrate_specs_structure,
        },
    ]
}

/// Parse a `major.minor.patch` semver string, defaulting missing/unparseable
/// components to `0.0.0`. No external semver dependency: the version space here is
/// exactly the fixed list of migration targets plus whatever a document carries.
fn parse_version(v: &str) -> (u64, u64, u64) {
    let mut parts = v.trim().split('.').map(|p| p.parse::<u64>().unwrap_or(0));
    (
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    )
}

fn version_str(doc: &Value) -> String {
    doc.as_mapping()
        .and_then(|m| {
            m.get(Value::String("specVersion".to_string()))
                .or_else(|| m.get(Value::String("version".to_string())))
        })
        .and_then(|v| v.as_str())
        .unwrap_or("0.0.0")
        .to_string()
}

/// Apply every pending migration in order, then stamp `specVersion` to the current
/// schema version. Idempotent: running this again on an already-migrated document is
/// a no-op because every migration's target is <= `CURRENT_SPEC_VERSION`.
pub fn migrate(doc: &mut Value) -> Result<(), FuncError> {
    if doc.as_mapping().is_none() {
        return Err(FuncError::Yaml("func.yaml is not valid: expected a mapping at the document root".to_string()));
    }

    let current = parse_version(&version_str(doc));
    for migration in all_migrations() {
        let target = parse_version(migration.target_version);
        if target > current {
            (migration.up)(doc);
        }
    }

    set_field(doc, "specVersion", Value::String(CURRENT_SPEC_VERSION.to_string()));
    remove_field(doc, "version");
    Ok(())
}

fn set_field(doc: &mut Value, key: &str, value: Value) {
    if let Some(map) = doc.as_mapping_mut() {
        map.insert(Value::String(key.to_string()), value);
    }
}

fn remove_field(doc: &mut Value, key: &str) -> Option<Value> {
    doc.as_mapping_mut()
        .and_then(|m| m.remove(Value::String(key.to_string())))
}

fn get_field<'a>(doc: &'a Value, key: &str) -> Option<&'a Value> {
    doc.as_mapping()
        .and_then(|m| m.get(Value::String(key.to_string())))
}

fn is_truthy_nonzero(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Number(n) => n.as_u64().map(|x| x != 0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// If `Created` is zero/unset but `Name` and `Runtime` are populated, this is a
/// pre-migration Function (rather than a fresh in-memory one): stamp `created` to now.
fn migrate_creation_stamp(doc: &mut Value) {
    let already_stamped = get_field(doc, "created").map(is_truthy_nonzero).unwrap_or(false);
    if already_stamped {
        return;
    }
    let has_name = get_field(doc, "name")
        .and_then(|v| v.as_str())
        .map(|s| !s.is_empty())
        .unwrap_or(false);
    let has_runtime = get_field(doc, "runtime")
        .and_then(|v| v.as_str())
        .map(|s| !s.is_empty())
        .unwrap_or(false);
    if has_name && has_runtime {
        set_field(doc, "created", Value::Number(crate::core::time::now_epoch_secs().into()));
    }
}

/// The prior schema had `builder: <image>`; if its value differed from the
/// then-default buildpack image, migrate it to `builderImages[pack] = <value>`.
fn migrate_builder_images(doc: &mut Value) {
    let Some(builder) = remove_field(doc, "builder") else {
        return;
    };
    let Some(builder_str) = builder.as_str() else {
        return;
    };
    if builder_str.is_empty() || builder_str == LEGACY_DEFAULT_BUILDPACK_BUILDER {
        return;
    }

    let mut builder_images = get_field(doc, "builderImages")
        .and_then(|v| v.as_mapping())
        .cloned()
        .unwrap_or_default();
    builder_images.insert(Value::String("pack".to_string()), Value::String(builder_str.to_string()));
    set_field(doc, "builderImages", Value::Mapping(builder_images));
}

/// Rename the `version` field to `specVersion`.
fn migrate_spec_version_rename(doc: &mut Value) {
    if get_field(doc, "specVersion").is_some() {
        return;
    }
    if let Some(version) = remove_field(doc, "version") {
        set_field(doc, "specVersion", version);
    }
}

/// Repartition top-level fields that an older nested schema grouped under `build`,
/// `run`, and `deploy` back to the canonical flat top level, preserving every value
/// and never overwriting a key already present at the top level.
fn migrate_specs_structure(doc: &mut Value) {
    for group in ["build", "run", "deploy"] {
        let Some(group_value) = remove_field(doc, group) else {
            continue;
        };
        let Some(group_map) = group_value.as_mapping() else {
            continue;
        };
        let entries: Vec<(Value, Value)> = group_map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        if let Some(top) = doc.as_mapping_mut() {
            for (k, v) in entries {
                top.entry(k).or_insert(v);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn migrate_is_idempotent() {
        let mut doc = yaml("name: hello\nruntime: go\n");
        migrate(&mut doc).unwrap();
        let once = doc.clone();
        migrate(&mut doc).unwrap();
        assert_eq!(once, doc);
        assert_eq!(version_str(&doc), CURRENT_SPEC_VERSION);
    }

    #[test]
    fn migrate_stamps_created_for_pre_migration_function() {
        let mut doc = yaml("name: hello\nruntime: go\n");
        migrate(&mut doc).unwrap();
        let created = get_field(&doc, "created").unwrap();
        assert!(is_truthy_nonzero(created));
    }

    #[test]
    fn migrate_renames_version_to_spec_version() {
        let mut doc = yaml("name: hello\nruntime: go\nversion: 0.10.0\n");
        migrate(&mut doc).unwrap();
        assert!(get_field(&doc, "version").is_none());
        assert_eq!(version_str(&doc), CURRENT_SPEC_VERSION);
    }

    #[test]
    fn migrate_moves_non_default_builder_into_builder_images() {
        let mut doc = yaml("name: hello\nruntime: go\nbuilder: docker.io/custom/builder:v2\n");
        migrate(&mut doc).unwrap();
        assert!(get_field(&doc, "builder").is_none());
        let images = get_field(&doc, "builderImages").unwrap().as_mapping().unwrap();
        assert_eq!(
            images.get(Value::String("pack".to_string())).unwrap().as_str().unwrap(),
            "docker.io/custom/builder:v2"
        );
    }

    #[test]
    fn migrate_ignores_default_builder_image() {
        let mut doc = yaml(&format!(
            "name: hello\nruntime: go\nbuilder: {LEGACY_DEFAULT_BUILDPACK_BUILDER}\n"
        ));
        migrate(&mut doc).unwrap();
        assert!(get_field(&doc, "builderImages").is_none());
    }

    #[test]
    fn migrate_flattens_build_run_deploy_groups() {
        let mut doc = yaml(
            "name: hello\nruntime: go\nbuild:\n  buildpacks: [pack-a]\nrun:\n  envs: []\ndeploy:\n  namespace: prod\n",
        );
        migrate(&mut doc).unwrap();
        assert!(get_field(&doc, "build").is_none());
        assert!(get_field(&doc, "run").is_none());
        assert!(get_field(&doc, "deploy").is_none());
        assert_eq!(
            get_field(&doc, "namespace").unwrap().as_str().unwrap(),
            "prod"
        );
        assert!(get_field(&doc, "buildpacks").is_some());
    }

    #[test]
    fn migrate_leaves_already_current_version_unchanged_structurally() {
        let mut doc = yaml(&format!("name: hello\nruntime: go\nspecVersion: {CURRENT_SPEC_VERSION}\ncreated: 5\n"));
        let before = doc.clone();
        migrate(&mut doc).unwrap();
        assert_eq!(doc, before);
    }
}
