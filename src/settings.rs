// ============================================================================
// ENGINE SETTINGS — tunable constants, persisted as a key=value .cfg file
// ============================================================================

use std::path::{Path, PathBuf};

use image::Rgba;

use crate::gpu::batcher::MIN_BUFFER_BYTES;
use crate::log_warn;

#[derive(Clone, Debug, PartialEq)]
pub struct EngineSettings {
    /// Fraction of the remaining distance the displayed view covers per frame.
    pub view_inertia: f32,
    /// Relative margin left around a centered canvas.
    pub centered_view_margin: f32,
    /// View-space distance within which a pointer press grabs a shape anchor.
    pub anchor_grab_distance: f32,
    /// Size of the geometry batcher's vertex buffer.
    pub vertex_buffer_bytes: usize,
    pub background_top: Rgba<u8>,
    pub background_bottom: Rgba<u8>,
    pub canvas_shadow_width: f32,
    pub canvas_shadow_color: Rgba<u8>,
    pub selection_shadow_color: Rgba<u8>,
    pub checker_cell_size: f32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            view_inertia: 0.15,
            centered_view_margin: 0.1,
            anchor_grab_distance: 4.0,
            vertex_buffer_bytes: 65536,
            background_top: Rgba([0x0D, 0x38, 0x63, 0xFF]),
            background_bottom: Rgba([0x56, 0x82, 0xAD, 0xFF]),
            canvas_shadow_width: 12.0,
            canvas_shadow_color: Rgba([0x00, 0x00, 0x00, 0x50]),
            selection_shadow_color: Rgba([0x00, 0x6A, 0xC4, 0x80]),
            checker_cell_size: 8.0,
        }
    }
}

impl EngineSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/brushwork/brushwork.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\brushwork\brushwork.cfg
    /// On macOS:   ~/Library/Application Support/brushwork/brushwork.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("brushwork").join("brushwork.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("brushwork")
                    .join("brushwork.cfg"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?;
            Some(config_dir.join("brushwork").join("brushwork.cfg"))
        }
    }

    /// Load from the default location (defaults if missing or corrupt).
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load settings from `path`.  A missing file gives the defaults; unknown
    /// keys and unparsable values are skipped.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else { return Self::default() };
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            let ok = match key {
                "view_inertia" => parse_into(val, &mut s.view_inertia),
                "centered_view_margin" => parse_into(val, &mut s.centered_view_margin),
                "anchor_grab_distance" => parse_into(val, &mut s.anchor_grab_distance),
                "vertex_buffer_bytes" => parse_into(val, &mut s.vertex_buffer_bytes),
                "background_top" => color_into(val, &mut s.background_top),
                "background_bottom" => color_into(val, &mut s.background_bottom),
                "canvas_shadow_width" => parse_into(val, &mut s.canvas_shadow_width),
                "canvas_shadow_color" => color_into(val, &mut s.canvas_shadow_color),
                "selection_shadow_color" => color_into(val, &mut s.selection_shadow_color),
                "checker_cell_size" => parse_into(val, &mut s.checker_cell_size),
                _ => true,
            };
            if !ok {
                log_warn!("Ignoring bad settings value {}={}", key, val);
            }
        }
        s.sanitize();
        s
    }

    /// Put every out-of-range value back to its default.
    fn sanitize(&mut self) {
        let d = Self::default();
        if !(self.view_inertia > 0.0 && self.view_inertia <= 1.0) {
            log_warn!("view_inertia={} outside (0, 1], using {}", self.view_inertia, d.view_inertia);
            self.view_inertia = d.view_inertia;
        }
        if !(self.centered_view_margin >= 0.0 && self.centered_view_margin < 1.0) {
            log_warn!(
                "centered_view_margin={} outside [0, 1), using {}",
                self.centered_view_margin,
                d.centered_view_margin
            );
            self.centered_view_margin = d.centered_view_margin;
        }
        if !(self.anchor_grab_distance.is_finite() && self.anchor_grab_distance >= 0.0) {
            log_warn!("anchor_grab_distance={} is invalid, using {}", self.anchor_grab_distance, d.anchor_grab_distance);
            self.anchor_grab_distance = d.anchor_grab_distance;
        }
        if self.vertex_buffer_bytes < MIN_BUFFER_BYTES {
            log_warn!(
                "vertex_buffer_bytes={} below the {}-byte minimum, using {}",
                self.vertex_buffer_bytes,
                MIN_BUFFER_BYTES,
                d.vertex_buffer_bytes
            );
            self.vertex_buffer_bytes = d.vertex_buffer_bytes;
        }
        if !(self.canvas_shadow_width.is_finite() && self.canvas_shadow_width >= 0.0) {
            log_warn!("canvas_shadow_width={} is invalid, using {}", self.canvas_shadow_width, d.canvas_shadow_width);
            self.canvas_shadow_width = d.canvas_shadow_width;
        }
        if !(self.checker_cell_size.is_finite() && self.checker_cell_size > 0.0) {
            log_warn!("checker_cell_size={} is invalid, using {}", self.checker_cell_size, d.checker_cell_size);
            self.checker_cell_size = d.checker_cell_size;
        }
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "view_inertia={}\n\
             centered_view_margin={}\n\
             anchor_grab_distance={}\n\
             vertex_buffer_bytes={}\n\
             background_top={}\n\
             background_bottom={}\n\
             canvas_shadow_width={}\n\
             canvas_shadow_color={}\n\
             selection_shadow_color={}\n\
             checker_cell_size={}\n",
            self.view_inertia,
            self.centered_view_margin,
            self.anchor_grab_distance,
            self.vertex_buffer_bytes,
            color_to_str(self.background_top),
            color_to_str(self.background_bottom),
            self.canvas_shadow_width,
            color_to_str(self.canvas_shadow_color),
            color_to_str(self.selection_shadow_color),
            self.checker_cell_size,
        )
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())
    }
}

fn parse_into<T: std::str::FromStr>(val: &str, slot: &mut T) -> bool {
    match val.parse::<T>() {
        Ok(v) => {
            *slot = v;
            true
        }
        Err(_) => false,
    }
}

fn color_into(val: &str, slot: &mut Rgba<u8>) -> bool {
    match str_to_color(val) {
        Some(c) => {
            *slot = c;
            true
        }
        None => false,
    }
}

/// Serialize a colour as "r,g,b,a"
pub fn color_to_str(c: Rgba<u8>) -> String {
    format!("{},{},{},{}", c[0], c[1], c[2], c[3])
}

/// Parse a colour from "r,g,b,a"
pub fn str_to_color(s: &str) -> Option<Rgba<u8>> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 4 {
        return None;
    }
    let mut out = [0u8; 4];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = part.trim().parse::<u8>().ok()?;
    }
    Some(Rgba(out))
}

/// Serde adapter storing `Rgba<u8>` as a plain `[r, g, b, a]` array.
pub mod rgba_serde {
    use image::Rgba;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(c: &Rgba<u8>, s: S) -> Result<S::Ok, S::Error> {
        c.0.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Rgba<u8>, D::Error> {
        <[u8; 4]>::deserialize(d).map(Rgba)
    }
}
