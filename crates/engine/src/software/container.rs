//! Uncompressed multi-camera stream container.
//!
//! Layout:
//!
//! ```text
//! # {"header":{...},"calibration":"..."}\n
//! frame 0: camera 0 plane | camera 1 plane | ... | camera 5 plane
//! frame 1: ...
//! ```
//!
//! Each plane holds `cols × rows` Bayer (RGGB) samples, one byte each for
//! 8-bit formats and two little-endian bytes each for 12/16-bit formats.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::frame::{RawFrame, StreamHeader};
use crate::{FrameStream, CAMERA_COUNT};

const HEADER_PREFIX: &str = "# ";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ContainerHeader {
    header: StreamHeader,
    #[serde(default)]
    calibration: Option<String>,
}

/// Bytes occupied by one frame of the given header.
pub fn frame_bytes(header: &StreamHeader) -> EngineResult<usize> {
    CAMERA_COUNT
        .checked_mul(header.cols as usize)
        .and_then(|n| n.checked_mul(header.rows as usize))
        .and_then(|n| n.checked_mul(header.data_format.sample_bytes()))
        .ok_or_else(|| EngineError::InvalidHeader {
            message: format!(
                "frame size {}x{} overflows the address space",
                header.cols, header.rows
            ),
        })
}

/// Reads frames from a container file.
pub struct StreamReader {
    path: PathBuf,
    reader: BufReader<File>,
    header: StreamHeader,
    calibration: Option<String>,
    data_offset: u64,
    frame_bytes: usize,
    position: u32,
}

impl StreamReader {
    /// Open a container and parse its header line.
    pub fn open(path: &Path) -> EngineResult<Self> {
        let file = File::open(path).map_err(|e| EngineError::StreamOpen {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut reader = BufReader::new(file);

        let mut line = String::new();
        let header_len = reader.read_line(&mut line).map_err(|e| EngineError::StreamOpen {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let json = line
            .strip_prefix(HEADER_PREFIX)
            .ok_or_else(|| EngineError::StreamOpen {
                path: path.to_path_buf(),
                message: "missing stream header line".to_string(),
            })?;
        let container: ContainerHeader =
            serde_json::from_str(json.trim_end()).map_err(|e| EngineError::InvalidHeader {
                message: e.to_string(),
            })?;

        if container.header.cols == 0 || container.header.rows == 0 {
            return Err(EngineError::InvalidHeader {
                message: "frame dimensions must be non-zero".to_string(),
            });
        }

        let frame_bytes = frame_bytes(&container.header)?;
        (frame_bytes as u64)
            .checked_mul(u64::from(container.header.frame_count))
            .and_then(|n| n.checked_add(header_len as u64))
            .ok_or_else(|| EngineError::InvalidHeader {
                message: format!(
                    "{} frames of {frame_bytes} bytes overflow the stream length",
                    container.header.frame_count
                ),
            })?;
        tracing::debug!(
            path = %path.display(),
            frames = container.header.frame_count,
            frame_bytes,
            "Opened stream container"
        );

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            header: container.header,
            calibration: container.calibration,
            data_offset: header_len as u64,
            frame_bytes,
            position: 0,
        })
    }

    /// Current read position.
    pub fn position(&self) -> u32 {
        self.position
    }
}

impl FrameStream for StreamReader {
    fn read_header(&mut self) -> EngineResult<StreamHeader> {
        Ok(self.header.clone())
    }

    fn read_frame(&mut self) -> EngineResult<RawFrame> {
        let index = self.position;
        if index >= self.header.frame_count {
            return Err(EngineError::EndOfStream { index });
        }
        self.position += 1;

        let offset = self.data_offset + index as u64 * self.frame_bytes as u64;
        let mut data = vec![0u8; self.frame_bytes];
        self.reader
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.reader.read_exact(&mut data))
            .map_err(|e| EngineError::CorruptFrame {
                index,
                message: format!("{}: {e}", self.path.display()),
            })?;

        Ok(RawFrame {
            index,
            cols: self.header.cols,
            rows: self.header.rows,
            data_format: self.header.data_format,
            data,
        })
    }

    fn seek(&mut self, index: u32) -> EngineResult<()> {
        if index >= self.header.frame_count {
            return Err(EngineError::FrameOutOfRange {
                index,
                count: self.header.frame_count,
            });
        }
        self.position = index;
        Ok(())
    }

    fn extract_calibration(&mut self, dest: &Path) -> EngineResult<()> {
        let calibration = self
            .calibration
            .as_deref()
            .ok_or(EngineError::NoCalibration)?;
        std::fs::write(dest, calibration)?;
        Ok(())
    }
}

/// Writes a container file frame by frame.
pub struct StreamWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    header: StreamHeader,
    frames_written: u32,
}

impl StreamWriter {
    /// Create a container, writing the header as the first line.
    ///
    /// `header.frame_count` must equal the number of frames written before
    /// [`StreamWriter::finish`].
    pub fn create(
        path: impl Into<PathBuf>,
        header: StreamHeader,
        calibration: Option<&str>,
    ) -> EngineResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        let mut writer = BufWriter::new(file);

        let container = ContainerHeader {
            header: header.clone(),
            calibration: calibration.map(str::to_string),
        };
        let json = serde_json::to_string(&container)
            .map_err(|e| EngineError::invalid_argument(format!("unserializable header: {e}")))?;
        writeln!(writer, "{HEADER_PREFIX}{json}")?;

        Ok(Self {
            writer,
            path,
            header,
            frames_written: 0,
        })
    }

    /// Append one frame given one sample plane per camera.
    ///
    /// 8-bit formats store the low byte of each sample.
    pub fn write_frame(&mut self, planes: &[Vec<u16>]) -> EngineResult<()> {
        if planes.len() != CAMERA_COUNT {
            return Err(EngineError::invalid_argument(format!(
                "expected {CAMERA_COUNT} camera planes, got {}",
                planes.len()
            )));
        }
        let plane_len = self.header.cols as usize * self.header.rows as usize;
        let wide = self.header.data_format.is_high_bit_depth();

        for (camera, plane) in planes.iter().enumerate() {
            if plane.len() != plane_len {
                return Err(EngineError::invalid_argument(format!(
                    "camera {camera} plane holds {} samples, expected {plane_len}",
                    plane.len()
                )));
            }
            let bytes: Vec<u8> = if wide {
                plane.iter().flat_map(|s| s.to_le_bytes()).collect()
            } else {
                plane.iter().map(|s| (*s).min(u8::MAX as u16) as u8).collect()
            };
            self.writer.write_all(&bytes)?;
        }

        self.frames_written += 1;
        Ok(())
    }

    /// Flush and verify the frame count announced in the header.
    pub fn finish(mut self) -> EngineResult<PathBuf> {
        self.writer.flush()?;
        if self.frames_written != self.header.frame_count {
            return Err(EngineError::invalid_argument(format!(
                "header announces {} frames but {} were written",
                self.header.frame_count, self.frames_written
            )));
        }
        Ok(self.path.clone())
    }

    /// Number of frames written.
    pub fn frames_written(&self) -> u32 {
        self.frames_written
    }
}

impl Drop for StreamWriter {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}
