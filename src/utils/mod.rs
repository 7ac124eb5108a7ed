//! Utility modules: logging setup and developer traces.
pub mod devlog;
pub mod logger;
