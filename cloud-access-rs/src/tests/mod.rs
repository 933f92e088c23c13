//! Unit tests for the access layer
//!
//! This module contains tests for the registry, the invoker, the error
//! taxonomy, configuration and the facades.

pub mod facade_tests;
pub mod http_backend_tests;
pub mod logging_tests;
