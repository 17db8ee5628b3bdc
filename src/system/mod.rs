//! Session orchestration.
//!
//! `ArSession` drives the tracking controller every tick and schedules the
//! asynchronous depth estimates that feed the plane mapper.

mod ar_session;

pub use ar_session::{ArSession, DepthRequest, SessionConfig};
