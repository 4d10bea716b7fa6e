//! Session orchestration for the Ingatini client.
//!
//! Owns the user's identity, the set of attached documents, the
//! conversation transcript with its in-flight exchanges, and the view of
//! persisted query history. Every remote effect goes through a
//! [`ingatini_client::RagService`].

pub mod error;
pub mod history;
pub mod identity;
pub mod orchestrator;
pub mod scope;
pub mod session;

pub use error::SessionError;
pub use history::HistoryLoader;
pub use identity::IdentityHolder;
pub use orchestrator::{QueryDispatch, QueryOrchestrator, QueryResolution, RequestId};
pub use scope::DocumentScope;
pub use session::Session;
