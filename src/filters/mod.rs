// SPDX-License-Identifier: GPL-3.0-only

//! Colour effects applied to recorded frames
//!
//! The discriminant of each [`FilterType`] is the `filter_mode` value the
//! compute shader switches on, so CPU and GPU paths stay in step.

mod cpu;

pub use cpu::apply_filter_rgba;

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Effect applied by the frame processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u32)]
pub enum FilterType {
    /// Identity
    #[default]
    Standard = 0,
    /// Black & white
    Mono = 1,
    /// Warm brownish tint
    Sepia = 2,
    /// High contrast black & white
    Noir = 3,
    /// Boosted saturation and contrast
    Vivid = 4,
    /// Blue colour temperature shift
    Cool = 5,
    /// Amber colour temperature shift
    Warm = 6,
    /// Lifted blacks with muted colours
    Fade = 7,
    /// Darkened edges
    Vignette = 8,
    /// Inverted colours
    Negative = 9,
    /// Reduced colour levels
    Posterize = 10,
}

impl FilterType {
    pub const ALL: [FilterType; 11] = [
        FilterType::Standard,
        FilterType::Mono,
        FilterType::Sepia,
        FilterType::Noir,
        FilterType::Vivid,
        FilterType::Cool,
        FilterType::Warm,
        FilterType::Fade,
        FilterType::Vignette,
        FilterType::Negative,
        FilterType::Posterize,
    ];

    /// Lower-case name used on the command line and in logs
    pub fn name(&self) -> &'static str {
        match self {
            FilterType::Standard => "standard",
            FilterType::Mono => "mono",
            FilterType::Sepia => "sepia",
            FilterType::Noir => "noir",
            FilterType::Vivid => "vivid",
            FilterType::Cool => "cool",
            FilterType::Warm => "warm",
            FilterType::Fade => "fade",
            FilterType::Vignette => "vignette",
            FilterType::Negative => "negative",
            FilterType::Posterize => "posterize",
        }
    }

    /// Whether the filter leaves pixels untouched
    pub fn is_identity(&self) -> bool {
        *self == FilterType::Standard
    }

    /// Shader mode index
    pub fn mode(&self) -> u32 {
        *self as u32
    }
}

impl std::fmt::Display for FilterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FilterType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        FilterType::ALL
            .into_iter()
            .find(|f| f.name() == wanted)
            .ok_or_else(|| format!("Unknown filter: {}", s))
    }
}
