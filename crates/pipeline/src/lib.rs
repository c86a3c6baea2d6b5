//! omniexport Pipeline
//!
//! Turns a recorded six-camera stream into image files, one frame at a time:
//!
//! - [`options`]: raw option strings to a validated [`options::PipelineConfig`]
//! - [`buffers`]: per-camera output geometry and the reusable buffer set
//! - [`session`]: the open stream, its header and read position
//! - [`controller`]: the init, configure, seek and frame loop state machine
//! - [`export`]: multi-camera and panorama exporters
//! - [`output`]: output directory creation and file naming

pub mod buffers;
pub mod controller;
pub mod export;
pub mod options;
pub mod output;
pub mod session;

pub use controller::{FramePipelineController, PipelineState, RunSummary};
pub use options::{ConfigResolver, PipelineConfig, RawOptions};
