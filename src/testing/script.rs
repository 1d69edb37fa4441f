//! Immutable scripts

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use super::operation::Operation;
use super::report::RunObserver;

/// An ordered, frozen sequence of operations bound to a service
///
/// Produced only by [`ScriptBuilder::build`](super::ScriptBuilder::build).
/// Cloning is cheap and shares the operation list.
#[derive(Clone)]
pub struct Script {
    pub(crate) name: String,
    pub(crate) service: Uuid,
    pub(crate) operations: Arc<[Operation]>,
    pub(crate) observer: Option<Arc<dyn RunObserver>>,
}

impl Script {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Service the run binds to on connect
    pub fn service(&self) -> Uuid {
        self.service
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Session observer bound at set-up, if any
    pub fn observer(&self) -> Option<&Arc<dyn RunObserver>> {
        self.observer.as_ref()
    }

    /// Number of operations that would run with the given optional policy
    pub fn runnable(&self, include_optional: bool) -> usize {
        self.operations
            .iter()
            .filter(|op| include_optional || !op.optional)
            .count()
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Script")
            .field("name", &self.name)
            .field("service", &self.service)
            .field("operations", &self.operations.len())
            .field("observer", &self.observer.is_some())
            .finish()
    }
}
