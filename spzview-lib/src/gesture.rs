//! Touch gesture handling.
//!
//! Pan and pinch are tracked independently. Pan orbits the camera (yaw and
//! pitch), pinch scales the zoom, so both may be active at once without
//! touching the same fields.

use crate::camera::{CameraConfig, SharedCamera};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PanState {
    #[default]
    Idle,
    Active {
        anchor: (f32, f32),
        last: (f32, f32),
    },
}

#[derive(Debug, Clone)]
pub struct GestureMapper {
    camera: SharedCamera,
    config: CameraConfig,
    pan: PanState,
}

impl GestureMapper {
    pub fn new(camera: SharedCamera, config: CameraConfig) -> Self {
        Self {
            camera,
            config,
            pan: PanState::Idle,
        }
    }

    #[inline]
    pub fn pan_state(&self) -> PanState {
        self.pan
    }

    pub fn on_pan_begin(&mut self, x: f32, y: f32) {
        self.pan = PanState::Active {
            anchor: (x, y),
            last: (x, y),
        };
    }

    /// Applies the movement since the previous reported point, not since the
    /// anchor.
    pub fn on_pan_change(&mut self, x: f32, y: f32) {
        let PanState::Active { anchor, last } = self.pan else {
            return;
        };
        let dx = x - last.0;
        // screen y grows downwards
        let dy = last.1 - y;
        if dx != 0.0 || dy != 0.0 {
            let config = &self.config;
            self.camera.update(|cam| cam.orbit(dx, dy, config));
        }
        self.pan = PanState::Active {
            anchor,
            last: (x, y),
        };
    }

    pub fn on_pan_end(&mut self) {
        self.pan = PanState::Idle;
    }

    pub fn on_pan_cancel(&mut self) {
        self.on_pan_end();
    }

    /// `scale` is the recogniser's factor since its last callback; the caller
    /// resets it to 1.0 afterwards, so successive calls compose.
    pub fn on_pinch_change(&mut self, scale: f32) {
        let config = &self.config;
        self.camera.update(|cam| cam.zoom_by(scale, config));
    }
}
