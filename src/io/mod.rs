//! Configuration loading and recorded-session replay.

pub mod config;
pub mod replay;

pub use config::AppConfig;
pub use replay::{DepthLog, PoseLog, ReplayTracker, ReplayVideo};
