//! MindEase Common - Shared configuration, errors, and logging.
//!
//! This crate provides:
//! - Configuration types and loading (file, environment, defaults)
//! - The AI credential resolution used at startup
//! - Error types for configuration handling
//! - Logging setup with noise filtering

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    AiConfig, AiCredential, Config, ConversationConfig, ObservabilityConfig, ServerConfig,
};
pub use error::{Error, Result};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::{AiCredential, Config};
    pub use crate::error::{Error, Result};
    pub use crate::logging::init_logging;
}
