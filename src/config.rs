use std::fs;
use std::path::Path;

use rand::Rng;
use serde::Deserialize;

use crate::error::ConfigError;

/// Inclusive range for a randomized node count.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CountRange {
    pub min: u32,
    pub max: u32,
}

impl CountRange {
    fn fixed(n: u32) -> Self {
        CountRange { min: n, max: n }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        rng.random_range(self.min..=self.max.max(self.min))
    }
}

/// Launcher settings: how many of each role to start and what to propose.
///
/// The defaults mirror the reference setup: one proposer, one to five
/// acceptors, one to ten learners.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    pub proposers: CountRange,
    pub acceptors: CountRange,
    pub learners: CountRange,
    /// The candidate value the proposer(s) start from.
    pub value: String,
    /// How long a proposer waits after registering before opening its round,
    /// giving the other nodes time to register.
    pub settle_ms: u64,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        LauncherConfig {
            proposers: CountRange::fixed(1),
            acceptors: CountRange { min: 1, max: 5 },
            learners: CountRange { min: 1, max: 10 },
            value: "lets-agree-on-this".to_string(),
            settle_ms: 500,
        }
    }
}

impl LauncherConfig {
    pub fn load(path: &Path) -> Result<LauncherConfig, ConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
