//! Shared types for the Globes travel client workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
