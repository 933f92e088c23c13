//! Resilience for remote calls
//!
//! A [`CallSite`] names what is being attempted and how unmatched failures
//! should be reported; a [`RetryPolicy`] says how hard to try; the
//! [`ResilientInvoker`] runs the operation under both.

mod retry;

pub use retry::{ResilientInvoker, RetryPolicy};

use crate::error::Fallback;

/// Description of one remote operation at the point it is invoked
#[derive(Debug, Clone, PartialEq)]
pub struct CallSite {
    operation: String,
    resource_type: String,
    resource: String,
    fallback: Fallback,
}

impl CallSite {
    /// Describe an operation on a resource
    ///
    /// Unmatched failures become an internal error until a fallback is set.
    pub fn new(
        operation: impl Into<String>,
        resource_type: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        let operation = operation.into();
        let fallback = Fallback::internal(format!("{} failed", operation));
        Self {
            operation,
            resource_type: resource_type.into(),
            resource: resource.into(),
            fallback,
        }
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Resource type used in not-found messages, e.g. `Table`
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn fallback(&self) -> &Fallback {
        &self.fallback
    }
}
