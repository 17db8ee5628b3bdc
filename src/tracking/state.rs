//! Tracking status state machine.
//!
//! ```text
//! Idle -> Initializing -> { Tracking, Unavailable }
//!                  Tracking <-> Lost
//! ```

use std::fmt;

/// Status of the tracking controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingStatus {
    /// Not started, or stopped.
    Idle,
    /// A pose source is attached but has not produced a pose yet.
    Initializing,
    /// The last pose update succeeded.
    Tracking,
    /// The last pose update failed; the pose is being predicted.
    Lost,
    /// No pose source could be attached. Terminal until the next `start()`.
    Unavailable,
}

impl TrackingStatus {
    /// True while a pose source is attached.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Initializing | Self::Tracking | Self::Lost)
    }
}

impl Default for TrackingStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl fmt::Display for TrackingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::Tracking => "tracking",
            Self::Lost => "lost",
            Self::Unavailable => "unavailable",
        };
        f.write_str(s)
    }
}

/// Which pose source the controller selected at `start()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingMode {
    #[default]
    None,
    Native,
    Sensor,
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Native => "native",
            Self::Sensor => "sensor",
        };
        f.write_str(s)
    }
}
