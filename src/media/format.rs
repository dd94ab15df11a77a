// SPDX-License-Identifier: GPL-3.0-only

//! Output aspect presets and the centre crop they imply

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Aspect preset for the recorded picture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Keep the capture geometry
    #[default]
    Preset,
    /// 1:1
    Square,
    /// 16:9
    Widescreen,
    /// 4:3
    Standard,
}

/// Region of a frame kept after cropping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    /// Pixels to trim from each edge as (left, right, top, bottom)
    pub fn margins(&self, frame_width: u32, frame_height: u32) -> (u32, u32, u32, u32) {
        (
            self.x,
            frame_width.saturating_sub(self.x + self.width),
            self.y,
            frame_height.saturating_sub(self.y + self.height),
        )
    }
}

impl OutputFormat {
    /// Target aspect as (width, height); `None` keeps the source aspect
    pub fn aspect(&self) -> Option<(u32, u32)> {
        match self {
            OutputFormat::Preset => None,
            OutputFormat::Square => Some((1, 1)),
            OutputFormat::Widescreen => Some((16, 9)),
            OutputFormat::Standard => Some((4, 3)),
        }
    }

    /// Largest centred rectangle with the target aspect
    ///
    /// Dimensions are rounded down to even values, which most encoders need.
    pub fn crop_rect(&self, width: u32, height: u32) -> CropRect {
        let full = CropRect {
            x: 0,
            y: 0,
            width,
            height,
        };
        let Some((aw, ah)) = self.aspect() else {
            return full;
        };

        let (w, h) = if (width as u64) * (ah as u64) > (height as u64) * (aw as u64) {
            // Source is wider than the target: trim the sides
            ((height as u64 * aw as u64 / ah as u64) as u32, height)
        } else {
            (width, (width as u64 * ah as u64 / aw as u64) as u32)
        };
        let (w, h) = (w & !1, h & !1);
        if w == 0 || h == 0 {
            return full;
        }

        CropRect {
            x: (width - w) / 2,
            y: (height - h) / 2,
            width: w,
            height: h,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preset" => Ok(OutputFormat::Preset),
            "square" | "1:1" => Ok(OutputFormat::Square),
            "widescreen" | "16:9" => Ok(OutputFormat::Widescreen),
            "standard" | "4:3" => Ok(OutputFormat::Standard),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}
