//! # Job Backend Client
//!
//! Transport layer between the orchestrator and the job-control API.
//!
//! - [`JobBackend`]: the interface the orchestrator depends on
//! - [`HttpJobBackend`]: REST implementation over reqwest
//! - [`AuthPolicyBackend`]: decorator reporting 401/403 responses to a handler

pub mod auth_policy;
pub mod http;
pub mod traits;

pub use auth_policy::{AuthFailureHandler, AuthPolicyBackend};
pub use http::HttpJobBackend;
pub use traits::JobBackend;
