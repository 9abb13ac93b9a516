//! funcctl: a library and CLI for the lifecycle of scale-to-zero Functions.
//!
//! A Function is a small, typed project (`func.yaml` at its root) that moves through
//! a fixed sequence of phases — Create, Build, Push, Deploy, Route, Run, Invoke,
//! Info, List, Remove — each delegated to a pluggable external collaborator (a
//! container builder, an image pusher, a cluster deployer, ...). `core::client::Client`
//! is the orchestrator; `core` as a whole owns the data model, the template
//! resolution stack, and the ambient concerns (errors, migrations, progress
//! reporting) that every phase shares.
//!
//! This crate ships no real collaborators of its own: an embedding application
//! supplies them via `core::client::ClientBuilder`. The bundled CLI (`cli`) wires
//! none at all, so lifecycle commands that need one fail fast with a named
//! `MissingConfig` error rather than silently doing nothing.

pub mod cli;
pub mod core;

pub use crate::core::error::FuncError;

/// Parse CLI arguments and dispatch to a bare `Client` (no collaborators wired).
/// Transport- and I/O-level errors are propagated as `anyhow::Error`; domain errors
/// are `FuncError`, which implements `std::error::Error` and flows through cleanly.
pub fn run() -> anyhow::Result<()> {
    cli::run()
}
