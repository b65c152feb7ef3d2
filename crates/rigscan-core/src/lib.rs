//! rigscan core - inspection data model, shared run state, and errors

pub mod error;
pub mod state;
pub mod types;

pub use error::{Error, Result};
pub use state::SharedState;
pub use types::*;
