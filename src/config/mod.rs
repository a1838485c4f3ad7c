//! # Configuration
//!
//! Controller-level settings. Everything is read from environment variables
//! once at startup; see [`ControllerConfig::from_env`].

mod controller;

pub use controller::ControllerConfig;
