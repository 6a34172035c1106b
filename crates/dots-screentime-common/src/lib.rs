pub mod config;
pub mod error;
pub mod security;
pub mod time;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
