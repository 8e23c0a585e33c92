//! # Utility Modules
//!
//! Supporting utilities for logging and timing.
//!
//! ## Components
//! - **Logging**: opt-in structured logging setup
//! - **Timeout**: optional-deadline async wrappers

pub mod logging;
pub mod timeout;
