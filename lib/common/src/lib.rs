//! Shared plumbing for the crtdash workspace: configuration and tracing setup.

pub mod config;

pub mod util {
    pub mod time;
    pub mod trace;
}

pub use config::{ConfigError, MonitorConfig};
