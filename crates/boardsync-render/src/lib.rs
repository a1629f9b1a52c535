//! BoardSync Render Library
//!
//! Deterministic replay of board operations onto a drawing surface.
//! Ships a CPU raster surface with PNG export and a recording surface for
//! inspection.

pub mod color;
mod images;
mod raster;
mod recorder;
mod renderer;
mod view;

pub use color::{Rgba, css_color, parse_color};
pub use images::{ImageCache, ImageState, decode_data_url};
pub use raster::{RasterSurface, encode_png};
pub use recorder::{DrawCommand, SceneRecorder};
pub use renderer::{Composite, RenderOutcome, RenderResult, Renderer, RendererError, Surface, arrow_head};
pub use view::BoardView;
