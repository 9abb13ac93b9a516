// src/core/defaults.rs
// Centralized default values for funcctl, in the teacher's schemas-constants style.

/// Registry used to derive `Image` when a Function sets only a single-token `Registry`.
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// Template used when a Function does not specify one at create time.
pub const DEFAULT_TEMPLATE: &str = "http";

/// Directory (relative to a Function's Root) that holds run-scoped artifacts.
pub const RUN_DATA_DIR: &str = ".func";

/// File (inside `RUN_DATA_DIR`) whose contents are the hex-encoded build fingerprint.
pub const BUILT_FILE: &str = "built";

/// Name of the repository that is always present and always first.
pub const DEFAULT_REPOSITORY_NAME: &str = "default";

/// Filename of a Function's on-disk document.
pub const FUNCTION_FILE: &str = "func.yaml";

/// Filename of a repository/runtime/template manifest.
pub const MANIFEST_FILE: &str = "manifest.yaml";
