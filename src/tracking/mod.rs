//! Camera tracking: turns raw poses from the opaque tracker (or the device
//! sensor fallback) into a smoothed, continuously predicted camera pose.
//!
//! - Pose source selection and lifecycle (`source`)
//! - Constant-velocity prediction (`motion_model`)
//! - Jitter and loss diagnostics (`stats`)
//! - Status state machine and loss recovery (`controller`)

pub mod config;
pub mod controller;
pub mod motion_model;
pub mod source;
pub mod state;
pub mod stats;

pub use config::TrackingConfig;
pub use controller::{FramePoints, TrackingController};
pub use motion_model::MotionModel;
pub use source::{
    DeviceOrientation, FrameBuffer, FrameSource, SensorBackend, TrackerBackend, TrackerInstance,
};
pub use state::{TrackingMode, TrackingStatus};
pub use stats::TrackingStats;
