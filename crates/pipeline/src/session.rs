//! Open stream handle.

use std::path::Path;

use tempfile::NamedTempFile;

use omniexport_common::{OmniexportError, OmniexportResult};
use omniexport_engine::{EngineResult, FrameStream, ImagingEngine, RawFrame, StreamHeader};

/// File name prefix of the temporary calibration file.
pub const CALIBRATION_PREFIX: &str = "omx_calibration_";

/// A stream opened through the engine, with its header and read position.
pub struct StreamSession {
    stream: Box<dyn FrameStream>,
    header: StreamHeader,
    /// Index the next sequential read returns. `None` after a failed read,
    /// since the engine's position is no longer trustworthy.
    position: Option<u32>,
}

impl StreamSession {
    /// Open `path` and read its header.
    pub fn open(engine: &mut dyn ImagingEngine, path: &Path) -> OmniexportResult<Self> {
        let mut stream = engine
            .open_stream(path)
            .map_err(|e| OmniexportError::initialization("stream open", e))?;
        let header = stream
            .read_header()
            .map_err(|e| OmniexportError::initialization("stream header", e))?;

        tracing::info!(
            path = %path.display(),
            serial_base = header.serial_base,
            serial_head = header.serial_head,
            frame_rate = header.frame_rate,
            data_format = ?header.data_format,
            frames = header.frame_count,
            "Opened stream"
        );

        Ok(Self {
            stream,
            header,
            position: Some(0),
        })
    }

    pub fn header(&self) -> &StreamHeader {
        &self.header
    }

    pub fn total_frames(&self) -> u32 {
        self.header.frame_count
    }

    pub fn position(&self) -> Option<u32> {
        self.position
    }

    /// Move the read position to `index`.
    pub fn seek(&mut self, index: u32) -> EngineResult<()> {
        match self.stream.seek(index) {
            Ok(()) => {
                self.position = Some(index);
                Ok(())
            }
            Err(e) => {
                self.position = None;
                Err(e)
            }
        }
    }

    /// Read the next frame in sequence.
    pub fn read_next(&mut self) -> EngineResult<RawFrame> {
        let result = self.stream.read_frame();
        self.position = match &result {
            Ok(frame) => frame.index.checked_add(1),
            Err(_) => None,
        };
        result
    }

    /// Read frame `index`, seeking first unless the stream is already there.
    pub fn read_frame_at(&mut self, index: u32) -> EngineResult<RawFrame> {
        if self.position != Some(index) {
            tracing::debug!(frame = index, position = ?self.position, "Re-seeking stream");
            self.seek(index)?;
        }
        self.read_next()
    }

    /// Extract the embedded calibration into a scoped temporary file and
    /// load it into the engine.
    ///
    /// Returns `Ok(false)` when no temporary file can be created or extraction
    /// fails, which only costs calibration accuracy. A calibration that
    /// extracts but does not load is fatal.
    pub fn load_calibration(&mut self, engine: &mut dyn ImagingEngine) -> OmniexportResult<bool> {
        self.load_calibration_in(engine, &std::env::temp_dir())
    }

    /// [`Self::load_calibration`] with the temporary file placed in `dir`.
    pub fn load_calibration_in(
        &mut self,
        engine: &mut dyn ImagingEngine,
        dir: &Path,
    ) -> OmniexportResult<bool> {
        let file = match tempfile::Builder::new()
            .prefix(CALIBRATION_PREFIX)
            .suffix(".cfg")
            .tempfile_in(dir)
        {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(
                    dir = %dir.display(),
                    error = %e,
                    "Could not create calibration file, continuing without calibration"
                );
                return Ok(false);
            }
        };

        if let Err(e) = self.stream.extract_calibration(file.path()) {
            tracing::warn!(error = %e, "Could not extract calibration from stream");
            return Ok(false);
        }
        load_from(engine, &file)?;
        Ok(true)
    }
}

fn load_from(engine: &mut dyn ImagingEngine, file: &NamedTempFile) -> OmniexportResult<()> {
    engine
        .load_calibration(file.path())
        .map_err(|e| OmniexportError::initialization("calibration load", e))?;
    tracing::debug!(engine = engine.name(), "Loaded stream calibration");
    Ok(())
}
