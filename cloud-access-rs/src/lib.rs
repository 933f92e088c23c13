//! # Cloud Access
//!
//! A resilient access layer for the remote services the UniVoice platform
//! depends on: a structured-record store, an object store, a record stream,
//! a parameter store and a secret store.
//!
//! This crate provides:
//!
//! - A create-once registry of service clients
//! - Retry with exponential backoff for transient provider failures
//! - A fixed domain error taxonomy with a stable wire shape
//! - Cached remote parameter and uncached secret resolution
//! - Storage, object and stream facades built on the above
//!
//! ## Architecture
//!
//! - `ClientRegistry`: hands out shared `ClientHandle`s built by a `ClientFactory`
//! - `ResilientInvoker`: runs one remote operation under a `RetryPolicy`
//! - `DomainError`: the only error type callers see
//! - `ConfigResolver`: parameters and secrets that degrade to `None`
//! - `AccessLayer`: all of the above wired together at startup

pub mod backends;
pub mod config;
pub mod core;
pub mod error;
pub mod observability;
pub mod resilience;
pub mod services;

// Utility module for common functionality
mod util;

pub use crate::backends::MemoryClientFactory;
pub use crate::config::{ConfigResolver, Settings};
pub use crate::core::{AccessLayerBuilder, ClientFactory, ClientHandle, ClientRegistry, ServiceId};
pub use crate::error::{DomainError, ErrorKind, FailureKind, ProviderError, Result};
pub use crate::observability::{init_logging, LoggingConfig, TraceAnnotator};
pub use crate::resilience::{CallSite, ResilientInvoker, RetryPolicy};
pub use crate::services::{AccessLayer, ObjectStorage, RecordStorage, StreamPublisher};

/// Create a new access layer builder
pub fn builder() -> AccessLayerBuilder {
    AccessLayerBuilder::new()
}

#[cfg(test)]
mod tests;
