//! HTTP contract with the remote RAG service.
//!
//! Defines the [`RagService`] seam the session layer talks to, the wire
//! records exchanged with the service, a `reqwest`-backed implementation,
//! and an in-memory implementation for offline use and tests.

pub mod http;
pub mod mock;
pub mod service;
pub mod wire;

pub use http::HttpRagClient;
pub use mock::MockRagService;
pub use service::{RagService, ServiceResult};
