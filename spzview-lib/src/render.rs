//! Boundary to the GPU renderer.
//!
//! The backend is external; this module only sequences calls into it. A
//! [`RenderContext`] is owned by the application and passed around explicitly.

use crate::camera::{CameraConfig, CameraState};
use crate::error::RenderError;
use crate::structures::GaussianCloud;
use std::ffi::c_void;
use std::marker::PhantomData;
use std::ptr::NonNull;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Non-owning handle to the platform drawable for a single frame.
///
/// It borrows the platform object for `'frame` and is neither `Clone` nor
/// `Send`, so a backend cannot keep it past `draw`.
///
/// ```compile_fail
/// use spzview_lib::Drawable;
///
/// let kept: Drawable<'static> = {
///     let mut target = 0u8;
///     Drawable::new(&mut target)
/// };
/// ```
#[derive(Debug)]
pub struct Drawable<'frame> {
    handle: NonNull<c_void>,
    _frame: PhantomData<&'frame mut c_void>,
}

impl<'frame> Drawable<'frame> {
    /// Borrows `target` as this frame's drawable.
    pub fn new<T>(target: &'frame mut T) -> Self {
        Self {
            handle: NonNull::from(target).cast(),
            _frame: PhantomData,
        }
    }

    /// Wraps a raw platform handle. Returns `None` for null.
    ///
    /// # Safety
    ///
    /// `handle` must stay valid for `'frame`, and the returned token must not
    /// outlive the frame that produced the handle.
    pub unsafe fn from_raw(handle: *mut c_void) -> Option<Self> {
        NonNull::new(handle).map(|handle| Self {
            handle,
            _frame: PhantomData,
        })
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut c_void {
        self.handle.as_ptr()
    }
}

/// Everything a backend needs to draw one frame.
#[derive(Debug)]
pub struct FrameInput<'a> {
    pub points: &'a GaussianCloud,
    pub camera: CameraState,
    pub view: glam::Mat4,
    pub projection: glam::Mat4,
    pub surface: SurfaceSize,
}

pub trait RenderBackend {
    fn init(&mut self, size: SurfaceSize) -> Result<(), RenderError>;

    fn resize(&mut self, size: SurfaceSize);

    fn draw(&mut self, drawable: &Drawable<'_>, frame: &FrameInput<'_>);

    fn teardown(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Drawn,
    Skipped,
}

#[derive(Debug)]
pub struct RenderContext<B: RenderBackend> {
    backend: B,
    camera_config: CameraConfig,
    size: Option<SurfaceSize>,
    pending_resize: Option<SurfaceSize>,
}

impl<B: RenderBackend> RenderContext<B> {
    pub fn new(backend: B, camera_config: CameraConfig) -> Self {
        Self {
            backend,
            camera_config,
            size: None,
            pending_resize: None,
        }
    }

    pub fn init_renderer(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if self.size.is_some() {
            return Ok(());
        }
        let size = SurfaceSize::new(width, height);
        self.backend.init(size)?;
        self.size = Some(size);
        log::info!("Renderer initialized at {}x{}", width, height);
        Ok(())
    }

    #[inline]
    pub fn is_renderer_initialized(&self) -> bool {
        self.size.is_some()
    }

    /// Records a new surface size; it takes effect before the next frame
    /// touches its drawable.
    pub fn resize_swapchain(&mut self, width: u32, height: u32) {
        self.pending_resize = Some(SurfaceSize::new(width, height));
    }

    pub fn surface_size(&self) -> Option<SurfaceSize> {
        self.size
    }

    pub fn render_frame(
        &mut self,
        drawable: &Drawable<'_>,
        points: Option<&GaussianCloud>,
        camera: &CameraState,
    ) -> FrameOutcome {
        let Some(mut size) = self.size else {
            return FrameOutcome::Skipped;
        };
        if let Some(new_size) = self.pending_resize.take() {
            if new_size != size {
                log::debug!(
                    "Applying swapchain resize {}x{}",
                    new_size.width,
                    new_size.height
                );
                self.backend.resize(new_size);
                self.size = Some(new_size);
                size = new_size;
            }
        }
        let Some(points) = points else {
            return FrameOutcome::Skipped;
        };

        let frame = FrameInput {
            points,
            camera: *camera,
            view: camera.view_matrix(&self.camera_config),
            projection: camera.projection_matrix(size.aspect_ratio(), &self.camera_config),
            surface: size,
        };
        self.backend.draw(drawable, &frame);
        FrameOutcome::Drawn
    }

    pub fn teardown_renderer(&mut self) {
        if self.size.take().is_some() {
            self.pending_resize = None;
            self.backend.teardown();
            log::info!("Renderer torn down");
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
