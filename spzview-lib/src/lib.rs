pub mod camera;
pub mod common;
pub mod decode;
pub mod decompress;
pub mod encode;
pub mod error;
pub mod gesture;
pub mod header;
pub mod packed;
pub mod render;
mod structures;
pub mod viewer;

pub use camera::{CameraConfig, CameraState, SharedCamera};
pub use decode::decode_points;
pub use decompress::{decompress, decompress_with, DecompressOptions};
pub use encode::{compress, encode_points};
pub use error::{RenderError, SpzError};
pub use gesture::{GestureMapper, PanState};
pub use header::parse_header;
pub use packed::pack_for_gpu;
pub use render::{
    Drawable, FrameInput, FrameOutcome, RenderBackend, RenderContext, SurfaceSize,
};
pub use structures::{
    BoundingBox, GaussianCloud, GaussianPoint, PackedGaussiansHeader, PackedSplat, SplatBuffer,
    FLAG_ANTIALIASED, HEADER_SIZE, MAGIC, VERSION,
};
pub use viewer::{load_spz, SceneLoader, Viewer};

cfg_if::cfg_if! {
if #[cfg(feature = "async")] {
    pub use decompress::decompress_async;
    pub use viewer::load_spz_async;
}
}
