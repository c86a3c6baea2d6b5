//! Runs against an engine that fails on command, checking that per-frame and
//! per-file failures stay contained while setup failures abort the run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use omniexport_common::OmniexportError;
use omniexport_engine::software::{SoftwareEngine, StreamWriter};
use omniexport_engine::{
    ColorProcessingMethod, DataFormat, EngineError, EngineResult, FrameStream, ImageFileFormat,
    ImageView, ImagingEngine, MeshRotation, PixelFormat, ProcessedImage, RawFrame, StreamHeader,
    CAMERA_COUNT,
};
use omniexport_pipeline::controller::{FrameOutcome, SkipStage};
use omniexport_pipeline::options::{ConfigResolver, RawOptions};
use omniexport_pipeline::{FramePipelineController, PipelineState};

/// Stream wrapper whose reads fail for selected frame indices.
struct FlakyStream {
    inner: Box<dyn FrameStream>,
    fail_reads: HashSet<u32>,
    position: u32,
}

impl FrameStream for FlakyStream {
    fn read_header(&mut self) -> EngineResult<StreamHeader> {
        self.inner.read_header()
    }

    fn read_frame(&mut self) -> EngineResult<RawFrame> {
        let index = self.position;
        self.position += 1;
        if self.fail_reads.contains(&index) {
            // Leave the inner stream somewhere else entirely.
            let _ = self.inner.seek(0);
            return Err(EngineError::CorruptFrame {
                index,
                message: "injected".to_string(),
            });
        }
        self.inner.read_frame()
    }

    fn seek(&mut self, index: u32) -> EngineResult<()> {
        self.inner.seek(index)?;
        self.position = index;
        Ok(())
    }

    fn extract_calibration(&mut self, dest: &Path) -> EngineResult<()> {
        self.inner.extract_calibration(dest)
    }
}

#[derive(Default)]
struct Script {
    fail_reads: HashSet<u32>,
    fail_convert: HashSet<u32>,
    fail_textures: bool,
    fail_canvas: bool,
    fail_rotation: bool,
    fail_blending: bool,
    fail_save_camera: Option<usize>,
}

/// Software engine with injected failures. Records every save and whether
/// the target directory existed at that moment.
struct ScriptedEngine {
    inner: SoftwareEngine,
    script: Script,
    saves: Vec<(PathBuf, bool)>,
    rotation: Option<MeshRotation>,
}

impl ScriptedEngine {
    fn new(script: Script) -> Self {
        Self {
            inner: SoftwareEngine::new(),
            script,
            saves: Vec::new(),
            rotation: None,
        }
    }
}

impl ImagingEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn open_stream(&mut self, path: &Path) -> EngineResult<Box<dyn FrameStream>> {
        Ok(Box::new(FlakyStream {
            inner: self.inner.open_stream(path)?,
            fail_reads: self.script.fail_reads.clone(),
            position: 0,
        }))
    }

    fn load_calibration(&mut self, path: &Path) -> EngineResult<()> {
        self.inner.load_calibration(path)
    }

    fn set_color_processing(&mut self, method: ColorProcessingMethod) -> EngineResult<()> {
        self.inner.set_color_processing(method)
    }

    fn convert_frame(
        &mut self,
        frame: &RawFrame,
        targets: &mut [&mut [u8]],
        pixel_format: PixelFormat,
    ) -> EngineResult<()> {
        if self.script.fail_convert.contains(&frame.index) {
            return Err(EngineError::conversion("injected"));
        }
        self.inner.convert_frame(frame, targets, pixel_format)
    }

    fn set_blending_width(&mut self, width: u32) -> EngineResult<()> {
        if self.script.fail_blending {
            return Err(EngineError::unsupported("blending"));
        }
        self.inner.set_blending_width(width)
    }

    fn initialize_alpha_masks(&mut self, width: u32, height: u32) -> EngineResult<()> {
        self.inner.initialize_alpha_masks(width, height)
    }

    fn set_alpha_masking(&mut self, enabled: bool) -> EngineResult<()> {
        self.inner.set_alpha_masking(enabled)
    }

    fn configure_panorama(&mut self, width: u32, height: u32) -> EngineResult<()> {
        if self.script.fail_canvas {
            return Err(EngineError::render("no off-screen surface"));
        }
        self.inner.configure_panorama(width, height)
    }

    fn set_mesh_rotation(&mut self, rotation: MeshRotation) -> EngineResult<()> {
        if self.script.fail_rotation {
            return Err(EngineError::unsupported("rotation"));
        }
        self.rotation = Some(rotation);
        self.inner.set_mesh_rotation(rotation)
    }

    fn update_textures(&mut self, textures: &[ImageView<'_>]) -> EngineResult<()> {
        if self.script.fail_textures {
            return Err(EngineError::render("texture upload failed"));
        }
        self.inner.update_textures(textures)
    }

    fn render_panorama(&mut self) -> EngineResult<ProcessedImage> {
        self.inner.render_panorama()
    }

    fn save_image(
        &mut self,
        image: &ImageView<'_>,
        path: &Path,
        format: ImageFileFormat,
    ) -> EngineResult<()> {
        let dir_exists = path.parent().is_some_and(Path::is_dir);
        self.saves.push((path.to_path_buf(), dir_exists));

        let camera_tag = self
            .script
            .fail_save_camera
            .map(|camera| format!("_cam{camera}."));
        if let Some(tag) = camera_tag {
            if path.to_string_lossy().contains(&tag) {
                return Err(EngineError::save(path, "disk full"));
            }
        }
        self.inner.save_image(image, path, format)
    }
}

fn write_stream(path: &Path, frames: u32) {
    let header = StreamHeader {
        serial_base: 1,
        serial_head: 2,
        frame_rate: 5.0,
        data_format: DataFormat::Raw8,
        cols: 4,
        rows: 4,
        frame_count: frames,
        stream_version: 1,
    };
    let mut writer = StreamWriter::create(path, header, None).unwrap();
    for frame in 0..frames {
        let planes: Vec<Vec<u16>> = (0..CAMERA_COUNT)
            .map(|_| vec![frame as u16 * 40; 16])
            .collect();
        writer.write_frame(&planes).unwrap();
    }
    writer.finish().unwrap();
}

struct Fixture {
    _dir: tempfile::TempDir,
    source: PathBuf,
    output: PathBuf,
}

fn fixture(frames: u32) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("stream.omx");
    let output = dir.path().join("exports");
    write_stream(&source, frames);
    Fixture {
        _dir: dir,
        source,
        output,
    }
}

fn run(
    fixture: &Fixture,
    script: Script,
    tweak: impl FnOnce(&mut RawOptions),
) -> (
    Result<omniexport_pipeline::RunSummary, OmniexportError>,
    FramePipelineController<ScriptedEngine>,
) {
    let mut raw = RawOptions {
        source: Some(fixture.source.display().to_string()),
        output: Some(fixture.output.display().to_string()),
        resolution: Some("64x32".to_string()),
        ..Default::default()
    };
    tweak(&mut raw);
    let config = ConfigResolver::default().resolve(&raw).unwrap().config;
    let mut controller = FramePipelineController::new(ScriptedEngine::new(script), config);
    let result = controller.run();
    (result, controller)
}

fn multi_camera(raw: &mut RawOptions) {
    raw.export_type = Some("6processed".to_string());
    raw.format = Some("png".to_string());
}

#[test]
fn read_failure_skips_only_that_frame() {
    let fixture = fixture(5);
    let script = Script {
        fail_reads: HashSet::from([3]),
        ..Default::default()
    };
    let (result, _) = run(&fixture, script, |raw| {
        multi_camera(raw);
        raw.frame_range = Some("0-4".to_string());
    });
    let summary = result.unwrap();

    assert_eq!(summary.exported_frames(), vec![0, 1, 2, 4]);
    assert_eq!(summary.skipped_frames(), vec![3]);
    assert!(matches!(
        summary.outcomes[3],
        FrameOutcome::Skipped {
            stage: SkipStage::Read,
            ..
        }
    ));
    assert!(fixture.output.join("000004_cam0.png").exists());
    assert!(!fixture.output.join("000003_cam0.png").exists());

    // Frame 4 carries frame 4's pixels, not whatever the stream fell back to.
    let frame4 = image::open(fixture.output.join("000004_cam0.png"))
        .unwrap()
        .to_rgb8();
    assert_eq!(frame4.get_pixel(0, 0).0, [160, 160, 160]);
}

#[test]
fn convert_failure_skips_frame() {
    let fixture = fixture(3);
    let script = Script {
        fail_convert: HashSet::from([1]),
        ..Default::default()
    };
    let (result, _) = run(&fixture, script, multi_camera);
    let summary = result.unwrap();

    assert_eq!(summary.exported_frames(), vec![0, 2]);
    assert!(matches!(
        summary.outcomes[1],
        FrameOutcome::Skipped {
            stage: SkipStage::Convert,
            ..
        }
    ));
}

#[test]
fn one_failed_camera_does_not_stop_the_others() {
    let fixture = fixture(2);
    let script = Script {
        fail_save_camera: Some(2),
        ..Default::default()
    };
    let (result, controller) = run(&fixture, script, multi_camera);
    let summary = result.unwrap();

    assert_eq!(summary.exported_frames(), vec![0, 1]);
    assert_eq!(summary.files_written(), 10);
    assert_eq!(summary.write_failures(), 2);
    assert!(!summary.is_clean());
    assert_eq!(controller.engine().saves.len(), 12);
}

#[test]
fn directory_exists_before_any_save() {
    let fixture = fixture(2);
    let (result, controller) = run(&fixture, Script::default(), |_| {});
    result.unwrap();

    let saves = &controller.engine().saves;
    assert_eq!(saves.len(), 2);
    assert!(saves.iter().all(|(_, dir_exists)| *dir_exists));
}

#[test]
fn texture_failure_skips_panorama_frame() {
    let fixture = fixture(2);
    let script = Script {
        fail_textures: true,
        ..Default::default()
    };
    let (result, controller) = run(&fixture, script, |_| {});
    let summary = result.unwrap();

    assert_eq!(summary.skipped_frames(), vec![0, 1]);
    assert!(controller.engine().saves.is_empty());
    assert_eq!(controller.state(), PipelineState::Done);
}

#[test]
fn probe_failure_is_fatal() {
    let fixture = fixture(3);
    let script = Script {
        fail_reads: HashSet::from([0]),
        ..Default::default()
    };
    let (result, controller) = run(&fixture, script, |_| {});

    let err = result.unwrap_err();
    assert!(err.to_string().contains("probe frame"));
    assert_eq!(controller.state(), PipelineState::Init);
    assert!(!fixture.output.exists());
}

#[test]
fn canvas_failure_is_fatal_only_for_panoramas() {
    let fixture = fixture(1);
    let (result, controller) = run(
        &fixture,
        Script {
            fail_canvas: true,
            ..Default::default()
        },
        |_| {},
    );
    assert!(matches!(
        result.unwrap_err(),
        OmniexportError::Initialization { .. }
    ));
    assert_eq!(controller.state(), PipelineState::Configure);

    let (result, _) = run(
        &fixture,
        Script {
            fail_canvas: true,
            ..Default::default()
        },
        multi_camera,
    );
    assert_eq!(result.unwrap().files_written(), 6);
}

#[test]
fn auxiliary_and_rotation_failures_are_warnings() {
    let fixture = fixture(1);
    let script = Script {
        fail_blending: true,
        fail_rotation: true,
        ..Default::default()
    };
    let (result, controller) = run(&fixture, script, |raw| {
        raw.rotation = Some("Front 10 -Down 20".to_string());
    });

    let summary = result.unwrap();
    assert_eq!(summary.files_written(), 1);
    assert!(summary.is_clean());
    let refused: Vec<&str> = summary.degraded.iter().map(|f| f.resource).collect();
    assert_eq!(refused, vec!["blending width", "panorama rotation"]);
    assert!(controller.engine().rotation.is_none());
}

#[test]
fn rotation_is_applied_once_in_radians() {
    let fixture = fixture(1);
    let (result, controller) = run(&fixture, Script::default(), |raw| {
        raw.rotation = Some("Front 90 -Down 0".to_string());
    });
    result.unwrap();

    let rotation = controller.engine().rotation.unwrap();
    assert!((rotation.x - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    assert_eq!(rotation.y, 0.0);
    assert_eq!(rotation.z, 0.0);
}

#[test]
fn zero_rotation_is_not_sent() {
    let fixture = fixture(1);
    let (result, controller) = run(&fixture, Script::default(), |_| {});
    assert!(result.unwrap().degraded.is_empty());
    assert!(controller.engine().rotation.is_none());
}
