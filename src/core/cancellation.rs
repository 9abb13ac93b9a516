//! A minimal cancellation handle shared between an orchestrator call and the
//! external collaborator it invokes: `Arc<AtomicBool>`, no async runtime. Every
//! pluggable collaborator trait takes a `&Cancellation` and is expected to consult
//! it at its own blocking points; the orchestrator never forcibly interrupts a call
//! already in progress.

use crate::core::error::FuncError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Cancellation {
        Cancellation(Arc::new(AtomicBool::new(false)))
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Convenience for collaborators: `cancellation.check()?` at a blocking point.
    pub fn check(&self) -> Result<(), FuncError> {
        if self.is_cancelled() {
            Err(FuncError::Cancelled("operation was cancelled".to_string()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_handle_is_not_cancelled() {
        let c = Cancellation::new();
        assert!(!c.is_cancelled());
        assert!(c.check().is_ok());
    }

    #[test]
    fn cancel_is_visible_across_clones() {
        let c = Cancellation::new();
        let clone = c.clone();
        clone.cancel();
        assert!(c.is_cancelled());
        assert!(c.check().is_err());
    }
}
