// SPDX-License-Identifier: GPL-3.0-only
//! GPU filter pipeline
//!
//! All filters operate directly on RGBA textures.

mod gpu_filter;

pub use gpu_filter::{FILTER_SHADER, GpuFilterPipeline};
