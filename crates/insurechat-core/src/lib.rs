pub mod config;
pub mod error;
pub mod types;

pub use config::InsureChatConfig;
pub use error::{InsureChatError, Result};
pub use types::*;
