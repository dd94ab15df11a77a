// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame filter stage
//!
//! Frames pass through the configured colour effect and then through any
//! injected transforms. GPU resources are built by [`FrameProcessor::prepare`]
//! when a session starts and live as long as the processor, which is one
//! session; `process` never sets up the GPU. Filtering is best effort: when
//! the GPU cannot be used the frame is written unfiltered.

use crate::filters::{FilterType, apply_filter_rgba};
use crate::media::VideoFrame;
use crate::shaders::GpuFilterPipeline;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where the colour effect is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProcessorBackend {
    /// wgpu compute shader; frames pass through unfiltered without an adapter
    #[default]
    Gpu,
    /// Scalar CPU path
    Cpu,
}

/// Externally supplied frame stage, applied after the built-in filter
pub trait FrameTransform: Send + Sync {
    fn transform(&self, frame: VideoFrame) -> VideoFrame;
}

impl<F> FrameTransform for F
where
    F: Fn(VideoFrame) -> VideoFrame + Send + Sync,
{
    fn transform(&self, frame: VideoFrame) -> VideoFrame {
        self(frame)
    }
}

enum GpuState {
    Ready(Box<GpuFilterPipeline>),
    /// Not built for this processor; GPU-filtered frames pass through
    Unavailable,
}

/// Session-scoped frame processor
pub struct FrameProcessor {
    filter: FilterType,
    backend: ProcessorBackend,
    gpu: GpuState,
    transforms: Vec<Arc<dyn FrameTransform>>,
    gpu_failures: u64,
}

impl FrameProcessor {
    pub fn new(filter: FilterType, backend: ProcessorBackend) -> Self {
        Self {
            filter,
            backend,
            gpu: GpuState::Unavailable,
            transforms: Vec::new(),
            gpu_failures: 0,
        }
    }

    /// Processor with its GPU pipeline built up front
    ///
    /// Blocks on adapter and shader setup when the GPU backend has a filter
    /// to run, so call it before samples flow.
    pub fn prepare(filter: FilterType, backend: ProcessorBackend) -> Self {
        let mut processor = Self::new(filter, backend);
        if backend != ProcessorBackend::Gpu || filter.is_identity() {
            return processor;
        }

        processor.gpu = match pollster::block_on(GpuFilterPipeline::new()) {
            Ok(pipeline) => {
                info!(filter = %filter, "GPU filter pipeline ready");
                GpuState::Ready(Box::new(pipeline))
            }
            Err(e) => {
                warn!(error = %e, "GPU filter unavailable, recording unfiltered frames");
                GpuState::Unavailable
            }
        };
        processor
    }

    /// Whether a GPU pipeline was built for this processor
    pub fn has_gpu(&self) -> bool {
        matches!(self.gpu, GpuState::Ready(_))
    }

    pub fn filter(&self) -> FilterType {
        self.filter
    }

    pub fn backend(&self) -> ProcessorBackend {
        self.backend
    }

    /// Append a stage run after the built-in filter
    pub fn add_transform(&mut self, transform: Arc<dyn FrameTransform>) {
        self.transforms.push(transform);
    }

    /// Whether processing would leave frames untouched
    pub fn is_passthrough(&self) -> bool {
        self.filter.is_identity() && self.transforms.is_empty()
    }

    /// Transform one frame; geometry is kept, row padding may be dropped
    pub fn process(&mut self, frame: VideoFrame) -> VideoFrame {
        if self.is_passthrough() || frame.validate().is_err() {
            return frame;
        }

        let mut frame = if self.filter.is_identity() {
            frame
        } else {
            match self.backend {
                ProcessorBackend::Cpu => self.filter_cpu(frame),
                ProcessorBackend::Gpu => self.filter_gpu(frame),
            }
        };

        for transform in &self.transforms {
            frame = transform.transform(frame);
        }
        frame
    }

    fn filter_cpu(&self, frame: VideoFrame) -> VideoFrame {
        let mut data = frame.data.to_vec();
        apply_filter_rgba(&mut data, frame.width, frame.height, frame.stride, self.filter);
        VideoFrame::with_stride(data, frame.width, frame.height, frame.stride)
    }

    fn filter_gpu(&mut self, frame: VideoFrame) -> VideoFrame {
        let GpuState::Ready(pipeline) = &mut self.gpu else {
            return frame;
        };

        match pollster::block_on(pipeline.apply_filter_rgba(
            &frame.data,
            frame.width,
            frame.height,
            frame.stride,
            self.filter,
        )) {
            Ok(packed) => VideoFrame::new(packed, frame.width, frame.height),
            Err(e) => {
                self.gpu_failures += 1;
                if self.gpu_failures == 1 {
                    warn!(error = %e, "GPU filter failed, passing frame through");
                } else {
                    debug!(error = %e, failures = self.gpu_failures, "GPU filter failed");
                }
                frame
            }
        }
    }
}

impl std::fmt::Debug for FrameProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameProcessor")
            .field("filter", &self.filter)
            .field("backend", &self.backend)
            .field("gpu", &self.has_gpu())
            .field("transforms", &self.transforms.len())
            .finish()
    }
}
