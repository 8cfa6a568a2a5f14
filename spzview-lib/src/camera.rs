use glam::{Mat4, Vec3};
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraConfig {
    /// Radians of orbit per unit of pan.
    pub sensitivity: f32,
    /// Orbit radius at zoom 1.0.
    pub base_radius: f32,
    pub min_radius: f32,
    pub max_radius: f32,
    pub pitch_limit: f32,
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            sensitivity: 0.005,
            base_radius: 10.0,
            min_radius: 0.1,
            max_radius: 300.0,
            pitch_limit: 1.5,
            fov_y_degrees: 45.0,
            near: 0.1,
            far: 1500.0,
        }
    }
}

impl CameraConfig {
    /// Zoom range that keeps the radius inside `[min_radius, max_radius]`.
    #[inline]
    fn zoom_range(&self) -> (f32, f32) {
        (
            self.base_radius / self.max_radius,
            self.base_radius / self.min_radius,
        )
    }
}

/// Orbit camera around `target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub yaw: f32,
    pub pitch: f32,
    pub zoom: f32,
    pub target: [f32; 3],
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            zoom: 1.0,
            target: [0.0; 3],
        }
    }
}

impl CameraState {
    pub fn orbit(&mut self, dx: f32, dy: f32, config: &CameraConfig) {
        self.yaw -= dx * config.sensitivity;
        self.pitch = (self.pitch - dy * config.sensitivity)
            .clamp(-config.pitch_limit, config.pitch_limit);
    }

    /// Multiplies the zoom by `factor`; non-positive or non-finite factors are
    /// dropped.
    pub fn zoom_by(&mut self, factor: f32, config: &CameraConfig) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let (lo, hi) = config.zoom_range();
        self.zoom = (self.zoom * factor).clamp(lo, hi);
    }

    pub fn translate(&mut self, offset: [f32; 3]) {
        for (t, o) in self.target.iter_mut().zip(offset) {
            *t += o;
        }
    }

    pub fn reset_orientation(&mut self) {
        self.yaw = 0.0;
        self.pitch = 0.0;
    }

    #[inline]
    pub fn radius(&self, config: &CameraConfig) -> f32 {
        config.base_radius / self.zoom
    }

    pub fn eye(&self, config: &CameraConfig) -> Vec3 {
        let r = self.radius(config);
        let (sin_y, cos_y) = self.yaw.sin_cos();
        let (sin_p, cos_p) = self.pitch.sin_cos();
        Vec3::from(self.target) + Vec3::new(r * cos_p * sin_y, r * sin_p, r * cos_p * cos_y)
    }

    pub fn view_matrix(&self, config: &CameraConfig) -> Mat4 {
        Mat4::look_at_rh(self.eye(config), Vec3::from(self.target), Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect_ratio: f32, config: &CameraConfig) -> Mat4 {
        Mat4::perspective_rh_gl(
            config.fov_y_degrees.to_radians(),
            aspect_ratio,
            config.near,
            config.far,
        )
    }
}

/// Camera shared between the interaction thread (writer) and the render
/// thread (reader). Every update holds the write lock for the whole group of
/// field changes, so readers only ever see complete states.
#[derive(Debug, Clone, Default)]
pub struct SharedCamera {
    inner: Arc<RwLock<CameraState>>,
}

impl SharedCamera {
    pub fn new(state: CameraState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut CameraState) -> R) -> R {
        f(&mut self.inner.write())
    }

    pub fn snapshot(&self) -> CameraState {
        *self.inner.read()
    }
}
