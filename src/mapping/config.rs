use serde::Deserialize;

use crate::mapping::fusion::FusionConfig;
use crate::mapping::ransac::RansacConfig;
use crate::mapping::sampler::SamplerConfig;

/// Configuration for the plane mapper.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    pub sampler: SamplerConfig,
    pub ransac: RansacConfig,
    pub fusion: FusionConfig,
    /// Cycles with fewer valid samples skip fitting.
    pub min_points: usize,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            sampler: SamplerConfig::default(),
            ransac: RansacConfig::default(),
            fusion: FusionConfig::default(),
            min_points: 30,
        }
    }
}
