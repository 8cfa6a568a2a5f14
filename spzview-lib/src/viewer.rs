use crate::camera::{CameraConfig, CameraState, SharedCamera};
use crate::decode::decode_points;
use crate::decompress::{decompress_with, DecompressOptions};
use crate::error::{RenderError, SpzError};
use crate::gesture::GestureMapper;
use crate::header::parse_header;
use crate::render::{Drawable, FrameOutcome, RenderBackend, RenderContext};
use crate::structures::GaussianCloud;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::sync::Arc;

/// Runs the full load pipeline on a compressed SPZ buffer.
///
/// The inflated scratch buffer is dropped before returning on every path.
pub fn load_spz(compressed: &[u8], options: &DecompressOptions) -> Result<GaussianCloud, SpzError> {
    let decompressed = decompress_with(compressed, options)?;
    let (header, _) = parse_header(&decompressed)?;
    decode_points(&decompressed, &header)
}

/// Slot holding the current scene.
///
/// Clones share the slot, so a loader thread can decode and publish while
/// the render thread keeps reading. Decoding happens outside the lock; the
/// write lock is held only for the pointer swap.
#[derive(Debug, Clone)]
pub struct SceneLoader {
    slot: Arc<RwLock<Option<Arc<GaussianCloud>>>>,
    decompress: DecompressOptions,
}

impl SceneLoader {
    pub fn new(decompress: DecompressOptions) -> Self {
        Self {
            slot: Arc::new(RwLock::new(None)),
            decompress,
        }
    }

    fn publish(&self, cloud: GaussianCloud) -> Arc<GaussianCloud> {
        let cloud = Arc::new(cloud);
        *self.slot.write() = Some(cloud.clone());
        log::info!(
            "Loaded {} splats (SH degree {})",
            cloud.num_points,
            cloud.sh_degree
        );
        cloud
    }

    fn finish(
        &self,
        loaded: Result<GaussianCloud, SpzError>,
    ) -> Result<Arc<GaussianCloud>, SpzError> {
        match loaded {
            Ok(cloud) => Ok(self.publish(cloud)),
            Err(e) => {
                log::warn!("SPZ load failed, keeping previous scene: {}", e);
                Err(e)
            }
        }
    }

    /// Decodes `compressed` and swaps it in as the current scene. On failure
    /// the previous scene is left as it was.
    pub fn load_spz(&self, compressed: &[u8]) -> Result<Arc<GaussianCloud>, SpzError> {
        self.finish(load_spz(compressed, &self.decompress))
    }

    pub fn current(&self) -> Option<Arc<GaussianCloud>> {
        self.slot.read().clone()
    }
}

/// Application-level owner of the loaded scene, camera and renderer.
///
/// Every entry point takes `&self`. Gestures only touch the pan state and the
/// camera, loads only the scene slot, and frames copy both before taking the
/// render lock, so the three never wait on each other for longer than a
/// snapshot.
#[derive(Debug)]
pub struct Viewer<B: RenderBackend> {
    render: Mutex<RenderContext<B>>,
    gestures: Mutex<GestureMapper>,
    camera: SharedCamera,
    camera_config: CameraConfig,
    scene: SceneLoader,
}

impl<B: RenderBackend> Viewer<B> {
    pub fn new(backend: B, camera_config: CameraConfig, decompress: DecompressOptions) -> Self {
        let camera = SharedCamera::new(CameraState::default());
        Self {
            render: Mutex::new(RenderContext::new(backend, camera_config)),
            gestures: Mutex::new(GestureMapper::new(camera.clone(), camera_config)),
            camera,
            camera_config,
            scene: SceneLoader::new(decompress),
        }
    }

    pub fn load_spz(&self, compressed: &[u8]) -> Result<Arc<GaussianCloud>, SpzError> {
        self.scene.load_spz(compressed)
    }

    pub fn scene(&self) -> Option<Arc<GaussianCloud>> {
        self.scene.current()
    }

    /// Handle for loading scenes from another thread.
    pub fn scene_loader(&self) -> SceneLoader {
        self.scene.clone()
    }

    pub fn camera(&self) -> &SharedCamera {
        &self.camera
    }

    /// A gesture mapper with its own pan state, driving this viewer's camera.
    pub fn gesture_mapper(&self) -> GestureMapper {
        GestureMapper::new(self.camera.clone(), self.camera_config)
    }

    pub fn on_pan_begin(&self, x: f32, y: f32) {
        self.gestures.lock().on_pan_begin(x, y);
    }

    pub fn on_pan_change(&self, x: f32, y: f32) {
        self.gestures.lock().on_pan_change(x, y);
    }

    pub fn on_pan_end(&self) {
        self.gestures.lock().on_pan_end();
    }

    pub fn on_pinch_change(&self, scale: f32) {
        self.gestures.lock().on_pinch_change(scale);
    }

    pub fn init_renderer(&self, width: u32, height: u32) -> Result<(), RenderError> {
        self.render.lock().init_renderer(width, height)
    }

    pub fn resize_swapchain(&self, width: u32, height: u32) {
        self.render.lock().resize_swapchain(width, height);
    }

    pub fn render_frame(&self, drawable: &Drawable<'_>) -> FrameOutcome {
        let scene = self.scene();
        let camera = self.camera.snapshot();
        self.render
            .lock()
            .render_frame(drawable, scene.as_deref(), &camera)
    }

    pub fn is_renderer_initialized(&self) -> bool {
        self.render.lock().is_renderer_initialized()
    }

    pub fn teardown_renderer(&self) {
        self.render.lock().teardown_renderer();
    }

    pub fn render_context(&self) -> MutexGuard<'_, RenderContext<B>> {
        self.render.lock()
    }
}

cfg_if::cfg_if! {
if #[cfg(feature = "async")] {
    use crate::decompress::decompress_async;

    pub async fn load_spz_async(
        compressed: &[u8],
        options: &DecompressOptions,
    ) -> Result<GaussianCloud, SpzError> {
        let decompressed = decompress_async(compressed, options).await?;
        let (header, _) = parse_header(&decompressed)?;
        decode_points(&decompressed, &header)
    }

    impl SceneLoader {
        pub async fn load_spz_async(
            &self,
            compressed: &[u8],
        ) -> Result<Arc<GaussianCloud>, SpzError> {
            self.finish(load_spz_async(compressed, &self.decompress).await)
        }
    }

    impl<B: RenderBackend> Viewer<B> {
        pub async fn load_spz_async(
            &self,
            compressed: &[u8],
        ) -> Result<Arc<GaussianCloud>, SpzError> {
            self.scene.load_spz_async(compressed).await
        }
    }
}
}
