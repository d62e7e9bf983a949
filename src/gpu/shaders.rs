// ============================================================================
// GPU SHADERS — WGSL fragment stages for the custom effects
// ============================================================================
//
// The engine hands these to the device as opaque bytes keyed by effect and
// never parses them.  Uniform layouts mirror the `#[repr(C)]` constant structs
// (CheckerboardConstants, BrightnessContrastGammaConstants, BlurConstants,
// SharpenConstants) byte for byte.  The bound layer texture lives in group 1.
// ============================================================================

use super::CustomEffect;

/// WGSL source registered for `effect`.
pub fn source(effect: CustomEffect) -> &'static str {
    match effect {
        CustomEffect::Checkerboard => CHECKERBOARD_SHADER,
        CustomEffect::BrightnessContrastGamma => BRIGHTNESS_CONTRAST_GAMMA_SHADER,
        CustomEffect::GaussianBlur => GAUSSIAN_BLUR_SHADER,
        CustomEffect::Sharpen => SHARPEN_SHADER,
    }
}

/// Transparency checkerboard.  Cells are measured in target pixels so the
/// pattern does not scale with zoom.
pub const CHECKERBOARD_SHADER: &str = r#"
struct CheckerUniforms {
    cell_size: f32,
    light: u32,  // packed RGBA8
    dark: u32,
};

@group(0) @binding(0) var<uniform> u: CheckerUniforms;

struct FragmentInput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@fragment
fn fs_checker(in: FragmentInput) -> @location(0) vec4<f32> {
    let cell = floor(in.position.xy / u.cell_size);
    let odd = (i32(cell.x) + i32(cell.y)) & 1;
    return select(unpack4x8unorm(u.light), unpack4x8unorm(u.dark), odd == 1);
}
"#;

/// Brightness / contrast / gamma, per colour channel in 0..1 space:
///   c' = clamp((c - 0.5) * contrast + 0.5 + brightness, 0, 1) ^ (1 / gamma)
pub const BRIGHTNESS_CONTRAST_GAMMA_SHADER: &str = r#"
struct BcgUniforms {
    brightness: f32,
    contrast: f32,
    gamma: f32,
    _pad0: f32,
};

@group(0) @binding(0) var<uniform> u: BcgUniforms;
@group(1) @binding(0) var layer_tex: texture_2d<f32>;

struct FragmentInput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@fragment
fn fs_bcg(in: FragmentInput) -> @location(0) vec4<f32> {
    let size = vec2<f32>(textureDimensions(layer_tex));
    let texel = vec2<i32>(clamp(in.uv * size, vec2<f32>(0.0), size - vec2<f32>(1.0)));
    let px = textureLoad(layer_tex, texel, 0);
    let lin = clamp((px.rgb - vec3<f32>(0.5)) * u.contrast + vec3<f32>(0.5 + u.brightness),
                    vec3<f32>(0.0), vec3<f32>(1.0));
    let inv_gamma = 1.0 / max(u.gamma, 0.01);
    return vec4<f32>(pow(lin, vec3<f32>(inv_gamma)), px.a);
}
"#;

/// Gaussian blur, single pass over a (2r+1)^2 window with clamp-to-edge
/// addressing, sigma = r / 3.
pub const GAUSSIAN_BLUR_SHADER: &str = r#"
struct BlurUniforms {
    radius: u32,
};

@group(0) @binding(0) var<uniform> u: BlurUniforms;
@group(1) @binding(0) var layer_tex: texture_2d<f32>;

struct FragmentInput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@fragment
fn fs_blur(in: FragmentInput) -> @location(0) vec4<f32> {
    let dims = vec2<i32>(textureDimensions(layer_tex));
    let center = vec2<i32>(in.uv * vec2<f32>(dims));
    let r = i32(u.radius);
    let sigma = max(f32(r) / 3.0, 0.5);
    var acc = vec4<f32>(0.0);
    var total = 0.0;
    for (var dy: i32 = -r; dy <= r; dy = dy + 1) {
        for (var dx: i32 = -r; dx <= r; dx = dx + 1) {
            let w = exp(-f32(dx * dx + dy * dy) / (2.0 * sigma * sigma));
            let p = clamp(center + vec2<i32>(dx, dy), vec2<i32>(0), dims - vec2<i32>(1));
            acc = acc + textureLoad(layer_tex, p, 0) * w;
            total = total + w;
        }
    }
    return acc / total;
}
"#;

/// Laplacian sharpen: c' = c + intensity * (4c - N - S - E - W).
pub const SHARPEN_SHADER: &str = r#"
struct SharpenUniforms {
    intensity: f32,
};

@group(0) @binding(0) var<uniform> u: SharpenUniforms;
@group(1) @binding(0) var layer_tex: texture_2d<f32>;

struct FragmentInput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

fn load_clamped(p: vec2<i32>, dims: vec2<i32>) -> vec4<f32> {
    return textureLoad(layer_tex, clamp(p, vec2<i32>(0), dims - vec2<i32>(1)), 0);
}

@fragment
fn fs_sharpen(in: FragmentInput) -> @location(0) vec4<f32> {
    let dims = vec2<i32>(textureDimensions(layer_tex));
    let c = vec2<i32>(in.uv * vec2<f32>(dims));
    let center = load_clamped(c, dims);
    let edges = load_clamped(c + vec2<i32>(0, -1), dims)
              + load_clamped(c + vec2<i32>(0, 1), dims)
              + load_clamped(c + vec2<i32>(-1, 0), dims)
              + load_clamped(c + vec2<i32>(1, 0), dims);
    let rgb = clamp(center.rgb + u.intensity * (4.0 * center.rgb - edges.rgb),
                    vec3<f32>(0.0), vec3<f32>(1.0));
    return vec4<f32>(rgb, center.a);
}
"#;
