pub mod config;
pub mod error;
pub mod types;

pub use config::IngatiniConfig;
pub use error::{
    IngatiniError, RemoteFailure, RemoteOperation, RemoteServiceError, Result, ValidationError,
};
pub use types::*;
