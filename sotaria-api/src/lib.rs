//! Sotaria apiserver library
//!
//! Serves the `projects` resource of the `sotaria.io` API group. Projects
//! are the namespaces a caller is allowed to see, resolved from namespace
//! role labels and project role bindings.

// Core modules
pub mod config;
pub mod error;

// Application state
pub mod state;
pub use state::AppState;

// Project registry
pub mod registry;

// HTTP surface
pub mod api;
pub mod middleware;

// Logging configuration
pub mod logging;

// Health checks and readiness probes
pub mod health;

// Graceful shutdown handling
pub mod shutdown;
