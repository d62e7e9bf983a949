//! Interactive raster-painting engine: a bounded layer stack, instrument
//! state machines, a pannable/zoomable view and a compositor, all driving an
//! abstract rendering device.
//!
//! The host owns the window and input.  Each frame it reports the pointer to
//! a [`CanvasManager`], then calls [`CanvasManager::update`] and
//! [`CanvasManager::draw`].  [`gpu::SoftwareDevice`] is a CPU implementation
//! of [`gpu::RenderDevice`] used by the tests and the headless CLI.

#![allow(clippy::too_many_arguments)]

#[macro_use]
pub mod logger;

pub mod canvas;
pub mod cli;
pub mod gpu;
pub mod manager;
pub mod ops;
pub mod settings;
pub mod tools;
pub mod view;

pub use canvas::{LayerStack, MAX_LAYERS, PixelRect, Selection};
pub use gpu::{RenderDevice, SoftwareDevice, SurfaceId};
pub use manager::CanvasManager;
pub use settings::EngineSettings;
pub use tools::{Instrument, InstrumentKind, InstrumentSettings};
pub use view::{Affine2, ViewTransform};
