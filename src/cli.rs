// ============================================================================
// brushwork CLI — headless replay of pointer / command scripts
// ============================================================================
//
// Usage examples:
//   brushwork --script strokes.json --output out.png
//   brushwork -i photo.png -s blur.json -o blurred.png
//   brushwork --size 64x64 -s shapes.json -o shapes.png --view-output view.png
//
// Runs the engine on the CPU reference device.  The view is pinned at scale 1
// on the canvas origin, so pointer coordinates in the script are canvas
// coordinates.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use egui::{Pos2, Vec2};
use image::{Rgba, RgbaImage};
use serde::Deserialize;

use crate::canvas::{MAX_LAYERS, PixelRect};
use crate::gpu::{RenderDevice, SoftwareDevice, SurfaceId};
use crate::manager::CanvasManager;
use crate::settings::EngineSettings;
use crate::tools::{InstrumentKind, InstrumentSettings};
use crate::{log_err, log_info, logger};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// brushwork headless painter.
///
/// Replays a JSON script of pointer events and engine commands, then writes
/// the flattened canvas.
#[derive(Parser, Debug)]
#[command(
    name = "brushwork",
    about = "Replay brushwork engine scripts without a window",
    long_about = "Replay a JSON script of pointer events and engine commands against\n\
                  a fresh canvas and write the merged layers as an image.\n\n\
                  Example:\n  \
                  brushwork --script strokes.json --output out.png\n  \
                  brushwork -i photo.png -s blur.json -o blurred.png"
)]
pub struct CliArgs {
    /// JSON array of script commands.
    #[arg(short, long, value_name = "SCRIPT.json")]
    pub script: PathBuf,

    /// Where to write the merged layers (format from extension).
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Image loaded into the first layer.  The canvas takes its size unless
    /// --size is given.
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Canvas size as WIDTHxHEIGHT.
    #[arg(long, value_name = "WxH", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Engine settings file (key=value).  Defaults are used when omitted.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Also write the last composited display frame.
    #[arg(long, value_name = "FILE")]
    pub view_output: Option<PathBuf>,

    /// Echo the session log to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

const DEFAULT_SIZE: (u32, u32) = (512, 512);

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let w: u32 = w.trim().parse().map_err(|e| format!("bad width '{}': {}", w, e))?;
    let h: u32 = h.trim().parse().map_err(|e| format!("bad height '{}': {}", h, e))?;
    if w == 0 || h == 0 {
        return Err("canvas size must be positive".to_string());
    }
    Ok((w, h))
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum CliError {
    Io(std::io::Error),
    Image(image::ImageError),
    Script(serde_json::Error),
    Usage(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Io(e) => write!(f, "I/O error: {}", e),
            CliError::Image(e) => write!(f, "image error: {}", e),
            CliError::Script(e) => write!(f, "script error: {}", e),
            CliError::Usage(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}

impl From<image::ImageError> for CliError {
    fn from(e: image::ImageError) -> Self {
        CliError::Image(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Script(e)
    }
}

// ============================================================================
// Script format
// ============================================================================

fn one() -> u32 {
    1
}

/// One step of a replay script.  Serialized as `{"op": "...", ...}`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptCommand {
    /// Pointer position (canvas pixels) and primary-button state.
    Pointer { x: f32, y: f32, active: bool },
    PanMode { enabled: bool },
    /// Run `count` update-then-draw frames.
    Frame {
        #[serde(default = "one")]
        count: u32,
    },
    Instrument { kind: InstrumentKind },
    Settings { settings: InstrumentSettings },
    Apply,
    Reset,
    CreateLayer {
        #[serde(default)]
        at: Option<usize>,
    },
    RemoveLayer { index: usize },
    MoveLayer { from: usize, to: usize },
    EnableLayer { index: usize, enabled: bool },
    SelectLayer { index: usize },
    ClearLayer { index: usize, color: [u8; 4] },
    Select { left: i32, top: i32, right: i32, bottom: i32 },
    ResetSelection,
    ResizeSaving {
        left: i32,
        top: i32,
        right: i32,
        bottom: i32,
        #[serde(default)]
        fill: [u8; 4],
    },
    ResizeDiscarding { width: u32, height: u32 },
    Crop,
    CenterView,
    PanView { dx: f32, dy: f32 },
    ScaleView { factor: f32 },
    SetScale { scale: f32 },
    SnapView,
}

pub fn parse_script(source: &str) -> Result<Vec<ScriptCommand>, CliError> {
    Ok(serde_json::from_str(source)?)
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the replay and return an OS exit code.
pub fn run(args: CliArgs) -> ExitCode {
    if args.verbose {
        logger::init(true);
    }
    let start = Instant::now();
    match execute(&args) {
        Ok(frames) => {
            if args.verbose {
                println!(
                    "{} frames -> {} ({:.0}ms)",
                    frames,
                    args.output.display(),
                    start.elapsed().as_secs_f64() * 1000.0
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log_err!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Replay `args.script` and write the outputs.  Returns the number of frames
/// run.
pub fn execute(args: &CliArgs) -> Result<u64, CliError> {
    let settings = match &args.config {
        Some(path) => EngineSettings::load_from(path),
        None => EngineSettings::default(),
    };
    let commands = parse_script(&std::fs::read_to_string(&args.script)?)?;
    let input = match &args.input {
        Some(path) => Some(image::open(path)?.into_rgba8()),
        None => None,
    };

    let (width, height) = args
        .size
        .or_else(|| input.as_ref().map(|img| img.dimensions()))
        .unwrap_or(DEFAULT_SIZE);
    let mut session = Session::new(settings, width, height, input.as_ref());

    for (i, command) in commands.iter().enumerate() {
        session
            .run_command(command)
            .map_err(|e| CliError::Usage(format!("command {} ({:?}): {}", i, command, e)))?;
    }
    log_info!("Replayed {} commands, {} frames", commands.len(), session.frames);

    write_rgba(&args.output, session.canvas_size(), session.merged())?;
    if let Some(path) = &args.view_output {
        write_rgba(path, session.canvas_size(), session.view_pixels())?;
    }
    Ok(session.frames)
}

fn write_rgba(path: &Path, (width, height): (u32, u32), pixels: Vec<u8>) -> Result<(), CliError> {
    let img = RgbaImage::from_raw(width, height, pixels)
        .ok_or_else(|| CliError::Usage("pixel buffer does not match canvas size".to_string()))?;
    img.save(path)?;
    Ok(())
}

// ============================================================================
// Replay session
// ============================================================================

/// Engine plus the display surface frames are drawn into.  The display
/// surface is canvas sized and follows resizes.
struct Session {
    manager: CanvasManager<SoftwareDevice>,
    display: SurfaceId,
    frames: u64,
}

impl Session {
    fn new(settings: EngineSettings, width: u32, height: u32, input: Option<&RgbaImage>) -> Self {
        let mut manager = CanvasManager::with_settings(SoftwareDevice::new(), width, height, settings);
        manager.create_layer(None);
        match input {
            Some(img) => {
                manager.clear_layer(0, Rgba([0, 0, 0, 0]));
                let region = PixelRect::from_size(img.width().min(width), img.height().min(height));
                manager.upload_layer_region(0, region, img.as_raw(), img.width() as usize * 4);
            }
            None => manager.clear_layer(0, Rgba([255, 255, 255, 255])),
        }

        let display = manager.device_mut().create_surface(width, height);
        let mut session = Self { manager, display, frames: 0 };
        session.pin_view();
        session
    }

    fn canvas_size(&self) -> (u32, u32) {
        self.manager.canvas_size()
    }

    fn viewport(&self) -> PixelRect {
        let (w, h) = self.canvas_size();
        PixelRect::from_size(w, h)
    }

    /// Scale 1 at the origin, no inertia.
    fn pin_view(&mut self) {
        self.manager.set_absolute_canvas_scale(1.0);
        let offset = -self.manager.view().position();
        self.manager.pan_view(offset);
        self.manager.snap_view(self.viewport());
    }

    fn check_layer(&self, index: usize) -> Result<(), String> {
        let count = self.manager.layer_count();
        if index < count {
            Ok(())
        } else {
            Err(format!("layer {} does not exist ({} layers)", index, count))
        }
    }

    fn run_command(&mut self, command: &ScriptCommand) -> Result<(), String> {
        let m = &mut self.manager;
        match *command {
            ScriptCommand::Pointer { x, y, active } => m.set_pointer_state(Pos2::new(x, y), active),
            ScriptCommand::PanMode { enabled } => m.enable_pointer_pan_view_mode(enabled),
            ScriptCommand::Frame { count } => {
                for _ in 0..count {
                    let viewport = self.viewport();
                    self.manager.update_and_draw(self.display, viewport);
                    self.frames += 1;
                }
            }
            ScriptCommand::Instrument { kind } => m.select_instrument(kind),
            ScriptCommand::Settings { settings } => m.update_instrument_settings(settings),
            ScriptCommand::Apply => m.apply_instrument(),
            ScriptCommand::Reset => m.reset_instrument(),
            ScriptCommand::CreateLayer { at } => {
                if m.layer_count() >= MAX_LAYERS {
                    return Err(format!("canvas already has {} layers", MAX_LAYERS));
                }
                if let Some(at) = at
                    && at > m.layer_count()
                {
                    return Err(format!("cannot insert a layer at {}", at));
                }
                m.create_layer(at);
            }
            ScriptCommand::RemoveLayer { index } => {
                self.check_layer(index)?;
                self.manager.remove_layer(index);
            }
            ScriptCommand::MoveLayer { from, to } => {
                self.check_layer(from)?;
                self.check_layer(to)?;
                self.manager.move_layer(from, to);
            }
            ScriptCommand::EnableLayer { index, enabled } => {
                self.check_layer(index)?;
                self.manager.enable_layer(index, enabled);
            }
            ScriptCommand::SelectLayer { index } => {
                self.check_layer(index)?;
                self.manager.set_current_layer(index);
            }
            ScriptCommand::ClearLayer { index, color } => {
                self.check_layer(index)?;
                self.manager.clear_layer(index, Rgba(color));
            }
            ScriptCommand::Select { left, top, right, bottom } => {
                m.set_selection(PixelRect::new(left, top, right, bottom));
            }
            ScriptCommand::ResetSelection => m.reset_selection(),
            ScriptCommand::ResizeSaving { left, top, right, bottom, fill } => {
                let rect = PixelRect::new(left, top, right, bottom);
                if rect.is_empty() {
                    return Err(format!("resize rect {:?} has no area", rect));
                }
                if m.resize_saving_contents(rect, Rgba(fill)) {
                    self.recreate_display();
                }
            }
            ScriptCommand::ResizeDiscarding { width, height } => {
                if width == 0 || height == 0 {
                    return Err("canvas size must be positive".to_string());
                }
                m.resize_discarding_contents(width, height);
                self.recreate_display();
            }
            ScriptCommand::Crop => {
                if m.crop_to_selection() {
                    self.recreate_display();
                }
            }
            ScriptCommand::CenterView => m.center_view(),
            ScriptCommand::PanView { dx, dy } => m.pan_view(Vec2::new(dx, dy)),
            ScriptCommand::ScaleView { factor } => {
                if !(factor > 0.0 && factor.is_finite()) {
                    return Err(format!("bad scale factor {}", factor));
                }
                m.scale_view(factor);
            }
            ScriptCommand::SetScale { scale } => {
                if !(scale > 0.0 && scale.is_finite()) {
                    return Err(format!("bad canvas scale {}", scale));
                }
                m.set_absolute_canvas_scale(scale);
            }
            ScriptCommand::SnapView => {
                let viewport = self.viewport();
                self.manager.snap_view(viewport);
            }
        }
        Ok(())
    }

    fn recreate_display(&mut self) {
        let (w, h) = self.canvas_size();
        let device = self.manager.device_mut();
        device.destroy_surface(self.display);
        self.display = device.create_surface(w, h);
    }

    fn merged(&mut self) -> Vec<u8> {
        let (w, h) = self.canvas_size();
        let mut pixels = vec![0u8; w as usize * h as usize * 4];
        self.manager.download_merged_layers(&mut pixels, 0);
        pixels
    }

    fn view_pixels(&mut self) -> Vec<u8> {
        let viewport = self.viewport();
        let (w, h) = viewport.size();
        let mut pixels = vec![0u8; w as usize * h as usize * 4];
        self.manager.device_mut().download_pixels(self.display, viewport, &mut pixels, 0);
        pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_argument_parses() {
        assert_eq!(parse_size("64x32"), Ok((64, 32)));
        assert_eq!(parse_size("8X8"), Ok((8, 8)));
        assert!(parse_size("0x8").is_err());
        assert!(parse_size("64").is_err());
    }

    #[test]
    fn script_commands_deserialize() {
        let script = r#"[
            {"op": "instrument", "kind": "brush"},
            {"op": "settings", "settings": {"kind": "brush", "color": [255, 0, 0, 255], "width": 2.0}},
            {"op": "pointer", "x": 1.0, "y": 1.0, "active": true},
            {"op": "frame"},
            {"op": "create_layer"},
            {"op": "resize_saving", "left": -2, "top": 0, "right": 8, "bottom": 8},
            {"op": "apply"}
        ]"#;
        let commands = parse_script(script).expect("valid script");
        assert_eq!(commands.len(), 7);
        assert_eq!(commands[0], ScriptCommand::Instrument { kind: InstrumentKind::Brush });
        assert_eq!(commands[3], ScriptCommand::Frame { count: 1 });
        assert_eq!(commands[4], ScriptCommand::CreateLayer { at: None });
        match &commands[1] {
            ScriptCommand::Settings { settings: InstrumentSettings::Brush(b) } => {
                assert_eq!(b.color, Rgba([255, 0, 0, 255]));
                assert_eq!(b.width, 2.0);
                assert!(b.blend_enabled);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unknown_op_is_a_script_error() {
        assert!(matches!(parse_script(r#"[{"op": "explode"}]"#), Err(CliError::Script(_))));
    }

    #[test]
    fn replay_writes_merged_canvas() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("script.json");
        std::fs::write(
            &script,
            r#"[
                {"op": "settings", "settings": {"kind": "pencil", "color": [0, 0, 255, 255]}},
                {"op": "instrument", "kind": "pencil"},
                {"op": "pointer", "x": 0.5, "y": 2.5, "active": true},
                {"op": "frame"},
                {"op": "pointer", "x": 7.5, "y": 2.5, "active": true},
                {"op": "frame"},
                {"op": "pointer", "x": 7.5, "y": 2.5, "active": false},
                {"op": "frame"}
            ]"#,
        )
        .expect("write script");

        let args = CliArgs {
            script,
            output: dir.path().join("out.png"),
            input: None,
            size: Some((8, 8)),
            config: None,
            view_output: Some(dir.path().join("view.png")),
            verbose: false,
        };
        assert_eq!(execute(&args).expect("replay"), 3);

        let out = image::open(&args.output).expect("output").into_rgba8();
        assert_eq!(out.dimensions(), (8, 8));
        assert_eq!(*out.get_pixel(4, 2), Rgba([0, 0, 255, 255]));
        assert_eq!(*out.get_pixel(4, 5), Rgba([255, 255, 255, 255]));
        assert!(dir.path().join("view.png").exists());
    }

    #[test]
    fn undersized_vertex_buffer_in_config_is_tolerated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("script.json");
        std::fs::write(&script, r#"[{"op": "frame", "count": 2}]"#).expect("write script");
        let config = dir.path().join("brushwork.cfg");
        std::fs::write(&config, "vertex_buffer_bytes=1024\n").expect("write config");

        let args = CliArgs {
            script,
            output: dir.path().join("out.png"),
            input: None,
            size: Some((4, 4)),
            config: Some(config),
            view_output: None,
            verbose: false,
        };
        assert_eq!(execute(&args).expect("replay"), 2);
        assert!(args.output.exists());
    }
}
