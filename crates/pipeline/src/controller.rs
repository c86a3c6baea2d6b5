//! Frame pipeline state machine.
//!
//! ```text
//! Init ──► Configure ──► Seek ──► Loop ──► Done
//! ```
//!
//! Anything that goes wrong before `Loop` aborts the run with an
//! [`OmniexportError`]. Inside the loop a failing frame is recorded in the
//! [`RunSummary`] and the next frame is attempted.

use std::ops::RangeInclusive;

use omniexport_common::{OmniexportError, OmniexportResult};
use omniexport_engine::{EngineError, ImagingEngine};

use crate::buffers::{negotiate_auxiliary, BufferGeometry, CameraBufferSet, NegotiationFailure};
use crate::export::{ExportResult, ExportStrategy};
use crate::options::{ExportMode, FrameSelector, PipelineConfig};
use crate::output::DirectoryManager;
use crate::session::StreamSession;

/// Where the controller is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Init,
    Configure,
    Seek,
    Loop,
    Done,
}

/// Frames actually exported, clamped to the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRange {
    pub start: u32,
    pub end: u32,
}

impl FrameRange {
    /// Clamp `selector` to a stream of `total` frames. `None` for an empty
    /// stream.
    pub fn resolve(selector: FrameSelector, total: u32) -> Option<Self> {
        let last = total.checked_sub(1)?;
        let (start, end) = match selector {
            FrameSelector::All => (0, last),
            FrameSelector::Range { start, end } => (start.min(last), end.min(last)),
        };
        Some(Self { start, end })
    }

    pub fn frames(&self) -> RangeInclusive<u32> {
        self.start..=self.end
    }

    pub fn len(&self) -> u32 {
        if self.start > self.end {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Loop step at which a frame was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipStage {
    Read,
    Convert,
    TextureUpdate,
}

/// What happened to one frame.
#[derive(Debug)]
pub enum FrameOutcome {
    Exported {
        frame: u32,
        result: ExportResult,
    },
    Skipped {
        frame: u32,
        stage: SkipStage,
        error: EngineError,
    },
}

impl FrameOutcome {
    pub fn frame(&self) -> u32 {
        match self {
            Self::Exported { frame, .. } | Self::Skipped { frame, .. } => *frame,
        }
    }
}

/// Per-frame outcomes of a completed run.
#[derive(Debug)]
pub struct RunSummary {
    pub range: FrameRange,
    pub outcomes: Vec<FrameOutcome>,
    /// Optional engine settings that were refused during setup.
    pub degraded: Vec<NegotiationFailure>,
}

impl RunSummary {
    /// Frames that reached an exporter, in order.
    pub fn exported_frames(&self) -> Vec<u32> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, FrameOutcome::Exported { .. }))
            .map(FrameOutcome::frame)
            .collect()
    }

    pub fn skipped_frames(&self) -> Vec<u32> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, FrameOutcome::Skipped { .. }))
            .map(FrameOutcome::frame)
            .collect()
    }

    pub fn files_written(&self) -> usize {
        self.export_results().map(|r| r.written().len()).sum()
    }

    pub fn write_failures(&self) -> usize {
        self.export_results().map(|r| r.failures().len()).sum()
    }

    /// Whether every frame in range was exported without a failed write.
    pub fn is_clean(&self) -> bool {
        self.outcomes.iter().all(|o| match o {
            FrameOutcome::Exported { result, .. } => result.is_success(),
            FrameOutcome::Skipped { .. } => false,
        })
    }

    fn export_results(&self) -> impl Iterator<Item = &ExportResult> {
        self.outcomes.iter().filter_map(|o| match o {
            FrameOutcome::Exported { result, .. } => Some(result),
            FrameOutcome::Skipped { .. } => None,
        })
    }
}

/// Drives one export run over an engine it owns.
pub struct FramePipelineController<E: ImagingEngine> {
    engine: E,
    config: PipelineConfig,
    state: PipelineState,
}

impl<E: ImagingEngine> FramePipelineController<E> {
    pub fn new(engine: E, config: PipelineConfig) -> Self {
        Self {
            engine,
            config,
            state: PipelineState::Init,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Run the whole pipeline.
    ///
    /// The stream and buffers live for the duration of this call; on a fatal
    /// error they are released before it returns and [`Self::state`] names
    /// the stage that failed.
    pub fn run(&mut self) -> OmniexportResult<RunSummary> {
        self.state = PipelineState::Init;
        let (mut session, mut buffers, mut degraded) = self.initialize()?;

        self.state = PipelineState::Configure;
        degraded.extend(self.configure_output()?);

        self.state = PipelineState::Seek;
        let range = FrameRange::resolve(self.config.frames, session.total_frames()).ok_or_else(
            || OmniexportError::initialization("frame range", "stream contains no frames"),
        )?;
        if range.is_empty() {
            tracing::warn!(
                start = range.start,
                end = range.end,
                "Frame range is empty, nothing to export"
            );
        }

        let output = DirectoryManager::new(&self.config.output_prefix);
        output.ensure()?;
        session
            .seek(range.start)
            .map_err(|e| OmniexportError::initialization("seek", e))?;

        let strategy = ExportStrategy::new(self.config.mode, output, self.config.format);

        self.state = PipelineState::Loop;
        let mut outcomes = Vec::with_capacity(range.len() as usize);
        for frame in range.frames() {
            tracing::info!(frame, end = range.end, "Processing frame");
            outcomes.push(self.process_frame(&mut session, &mut buffers, &strategy, frame));
        }

        self.state = PipelineState::Done;
        let summary = RunSummary {
            range,
            outcomes,
            degraded,
        };
        tracing::info!(
            exported = summary.exported_frames().len(),
            degraded = summary.degraded.len(),
            skipped = summary.skipped_frames().len(),
            files = summary.files_written(),
            failed_writes = summary.write_failures(),
            "Export complete"
        );
        Ok(summary)
    }

    /// Open the stream, load calibration, probe and allocate.
    fn initialize(
        &mut self,
    ) -> OmniexportResult<(StreamSession, CameraBufferSet, Vec<NegotiationFailure>)> {
        let engine: &mut dyn ImagingEngine = &mut self.engine;
        let mut session = StreamSession::open(engine, &self.config.source)?;
        if session.total_frames() == 0 {
            return Err(OmniexportError::initialization(
                "stream header",
                "stream contains no frames",
            ));
        }

        session.load_calibration(engine)?;

        engine
            .set_color_processing(self.config.color_method)
            .map_err(|e| OmniexportError::initialization("color processing", e))?;

        let probe = session
            .read_next()
            .map_err(|e| OmniexportError::initialization("probe frame", e))?;
        let geometry = BufferGeometry::derive(
            probe.cols,
            probe.rows,
            self.config.color_method,
            probe.data_format,
        );
        tracing::info!(
            native_width = probe.cols,
            native_height = probe.rows,
            texture_width = geometry.width,
            texture_height = geometry.height,
            pixel_format = ?geometry.pixel_format,
            "Probed stream geometry"
        );

        let buffers = CameraBufferSet::allocate(geometry)?;
        let degraded = negotiate_auxiliary(engine, geometry, &self.config);

        Ok((session, buffers, degraded))
    }

    /// Panoramic canvas and rotation. Nothing to do for per-camera export.
    ///
    /// A refused rotation is returned rather than raised.
    fn configure_output(&mut self) -> OmniexportResult<Option<NegotiationFailure>> {
        if self.config.mode == ExportMode::MultiCamera {
            return Ok(None);
        }

        self.engine
            .configure_panorama(self.config.width, self.config.height)
            .map_err(|e| OmniexportError::initialization("panorama canvas", e))?;

        let rotation = self.config.rotation;
        if rotation.is_zero() {
            return Ok(None);
        }
        match self.engine.set_mesh_rotation(rotation.to_mesh_rotation()) {
            Ok(()) => {
                tracing::info!(
                    front = rotation.front,
                    down = rotation.down,
                    "Applied panorama rotation"
                );
                Ok(None)
            }
            Err(error) => {
                tracing::warn!(error = %error, "Could not set panorama rotation");
                Ok(Some(NegotiationFailure {
                    resource: "panorama rotation",
                    error,
                }))
            }
        }
    }

    fn process_frame(
        &mut self,
        session: &mut StreamSession,
        buffers: &mut CameraBufferSet,
        strategy: &ExportStrategy,
        frame: u32,
    ) -> FrameOutcome {
        let skipped = |stage: SkipStage, error: EngineError| {
            tracing::warn!(frame, ?stage, error = %error, "Skipping frame");
            FrameOutcome::Skipped {
                frame,
                stage,
                error,
            }
        };

        let raw = match session.read_frame_at(frame) {
            Ok(raw) => raw,
            Err(e) => return skipped(SkipStage::Read, e),
        };

        let pixel_format = buffers.geometry().pixel_format;
        if let Err(e) = self
            .engine
            .convert_frame(&raw, &mut buffers.targets_mut(), pixel_format)
        {
            return skipped(SkipStage::Convert, e);
        }

        let result = match strategy {
            ExportStrategy::MultiCamera(exporter) => exporter.export(&mut self.engine, frame, buffers),
            ExportStrategy::Panorama(exporter) => {
                if let Err(e) = self.engine.update_textures(&buffers.views()) {
                    return skipped(SkipStage::TextureUpdate, e);
                }
                exporter.export(&mut self.engine, frame)
            }
        };
        FrameOutcome::Exported { frame, result }
    }
}
