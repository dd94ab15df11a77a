// SPDX-License-Identifier: GPL-3.0-only

//! Processing pipelines
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Live capture │ ──▶ │  Video Pipeline   │ ──▶ │   MP4 File   │
//! │ (RGBA, S16LE)│     │  - Pause offsets  │     │              │
//! │              │     │  - Filters        │     │              │
//! │              │     │  - Encoding       │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```
//!
//! - [`video`]: recording controller, media writer and GStreamer sink

pub mod video;
