//! Common types for the Leigod auto-pause service

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
