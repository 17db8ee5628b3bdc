//! Planar surface mapping from monocular depth.
//!
//! - Depth back-projection (`sampler`)
//! - Dominant plane extraction (`ransac`)
//! - Temporal fusion, decay and ranking (`fusion`)

pub mod config;
pub mod fusion;
pub mod mapper;
pub mod ransac;
pub mod sampler;
pub mod surface;

pub use config::MapperConfig;
pub use fusion::{FusionConfig, FusionResult, SurfaceStore};
pub use mapper::{MappingOutcome, PlaneMapper};
pub use ransac::{PlaneFit, RansacConfig};
pub use sampler::{DepthBuffer, SamplerConfig};
pub use surface::{PlaneCandidate, SurfaceId, WorldSurface};
