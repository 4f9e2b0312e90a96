//! Performance modes
//!
//! A [`ModeConfig`] picks between the normal, turbo and quality trade-offs.
//! Turbo raises the worker ceiling to the host-derived recommendation and asks
//! the retrieval tool for its fastest, lowest-quality encode; quality mode asks
//! for the best encode at the conservative worker count.
//!
//! The configuration is a plain value: it is copied into each scheduling run
//! and only changed between runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use sysinfo::System;

const GIB: u64 = 1024 * 1024 * 1024;

/// Lower bound for any worker count
pub const MIN_WORKERS: usize = 4;
/// Upper bound for the turbo recommendation
pub const MAX_RECOMMENDED_WORKERS: usize = 12;
/// Upper bound outside turbo mode
pub const MAX_DEFAULT_WORKERS: usize = 10;

/// Host capacity used to size the worker pool
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemResources {
    /// Logical cores available to the process
    pub cores: usize,
    /// Memory available for new allocations, in bytes
    pub memory_bytes: u64,
}

impl SystemResources {
    /// Probe the current host
    ///
    /// Falls back to a single core when parallelism cannot be determined.
    /// Memory is what the host can still hand out, not its installed total.
    #[must_use]
    pub fn detect() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        let mut sys = System::new();
        sys.refresh_memory();

        Self {
            cores,
            memory_bytes: sys.available_memory(),
        }
    }

    /// Memory in whole GiB
    #[must_use]
    pub fn memory_gib(&self) -> u64 {
        self.memory_bytes / GIB
    }
}

/// Encode quality requested from the retrieval tool
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityParam {
    /// Fastest, smallest encode
    Low,
    /// Balanced default
    #[default]
    Normal,
    /// Best available encode
    High,
}

impl QualityParam {
    /// Value passed as the tool's audio quality (0 best .. 9 worst VBR scale)
    #[must_use]
    pub fn as_arg(self) -> &'static str {
        match self {
            Self::Low => "9",
            Self::Normal => "5",
            Self::High => "1",
        }
    }
}

impl fmt::Display for QualityParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        })
    }
}

/// Named mode derived from the flags
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Neither turbo nor quality
    Normal,
    /// Maximum throughput
    Turbo,
    /// Maximum encode quality
    Quality,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Normal => "normal",
            Self::Turbo => "turbo",
            Self::Quality => "quality",
        })
    }
}

/// Current performance mode and the parameters it implies
///
/// `turbo` and `quality` are never both set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeConfig {
    turbo: bool,
    quality: bool,
    worker_count_hint: usize,
    quality_param: QualityParam,
    resources: SystemResources,
}

impl ModeConfig {
    /// Normal mode sized for `resources`
    #[must_use]
    pub fn new(resources: SystemResources) -> Self {
        Self {
            turbo: false,
            quality: false,
            worker_count_hint: compute_recommended_workers(resources),
            quality_param: QualityParam::Normal,
            resources,
        }
    }

    /// Normal mode sized for the current host
    #[must_use]
    pub fn detect() -> Self {
        Self::new(SystemResources::detect())
    }

    /// Switch to turbo, clearing quality mode
    pub fn enable_turbo(&mut self) {
        self.quality = false;
        self.turbo = true;
        self.recompute();
    }

    /// Switch to quality mode, clearing turbo
    pub fn enable_quality(&mut self) {
        self.turbo = false;
        self.quality = true;
        self.recompute();
    }

    /// Return to normal mode
    pub fn reset(&mut self) {
        self.turbo = false;
        self.quality = false;
        self.recompute();
    }

    /// Turn turbo on, or back to normal if it is already on
    pub fn toggle_turbo(&mut self) -> Mode {
        if self.turbo {
            self.reset();
        } else {
            self.enable_turbo();
        }
        self.active_mode()
    }

    /// Turn quality mode on, or back to normal if it is already on
    pub fn toggle_quality(&mut self) -> Mode {
        if self.quality {
            self.reset();
        } else {
            self.enable_quality();
        }
        self.active_mode()
    }

    fn recompute(&mut self) {
        self.worker_count_hint = compute_recommended_workers(self.resources);
        self.quality_param = if self.turbo {
            QualityParam::Low
        } else if self.quality {
            QualityParam::High
        } else {
            QualityParam::Normal
        };
    }

    /// Whether turbo is active
    #[must_use]
    pub fn turbo(&self) -> bool {
        self.turbo
    }

    /// Whether quality mode is active
    #[must_use]
    pub fn quality(&self) -> bool {
        self.quality
    }

    /// Which mode is active
    #[must_use]
    pub fn active_mode(&self) -> Mode {
        match (self.turbo, self.quality) {
            (true, _) => Mode::Turbo,
            (false, true) => Mode::Quality,
            (false, false) => Mode::Normal,
        }
    }

    /// Host-derived recommendation used by turbo mode
    #[must_use]
    pub fn worker_count_hint(&self) -> usize {
        self.worker_count_hint
    }

    /// Encode quality for the current mode
    #[must_use]
    pub fn quality_param(&self) -> QualityParam {
        self.quality_param
    }

    /// Resources this configuration was sized for
    #[must_use]
    pub fn resources(&self) -> SystemResources {
        self.resources
    }

    /// Worker ceiling for the next run
    ///
    /// Turbo uses the recommendation; otherwise `cores × 2` clamped to
    /// `[MIN_WORKERS, MAX_DEFAULT_WORKERS]`.
    #[must_use]
    pub fn compute_optimal_workers(&self) -> usize {
        if self.turbo {
            return self.worker_count_hint;
        }
        self.resources
            .cores
            .saturating_mul(2)
            .clamp(MIN_WORKERS, MAX_DEFAULT_WORKERS)
    }
}

/// Baseline worker count for a host
///
/// `cores × multiplier`, where the multiplier is 3 with at least 16 GiB of
/// available memory, 2 with at least 8 GiB and 1 otherwise, clamped to
/// `[MIN_WORKERS, MAX_RECOMMENDED_WORKERS]`.
#[must_use]
pub fn compute_recommended_workers(resources: SystemResources) -> usize {
    let multiplier = match resources.memory_gib() {
        gib if gib >= 16 => 3,
        gib if gib >= 8 => 2,
        _ => 1,
    };
    resources
        .cores
        .saturating_mul(multiplier)
        .clamp(MIN_WORKERS, MAX_RECOMMENDED_WORKERS)
}
