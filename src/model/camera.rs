use glam::{Mat4, Vec3};

/// Fixed 2D camera: an orthographic box the size of the canvas, y down
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub width: f32,
    pub height: f32,
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width as f32,
            height: height as f32,
            eye: Vec3::new(0.0, 0.0, 1.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
        }
    }

    /// Pixel (0,0) is the top-left corner. wgpu clips depth to 0..1, so the
    /// z = 0 scene plane (one unit in front of the eye) lands at depth 0.5.
    pub fn projection(&self) -> Mat4 {
        Mat4::orthographic_rh(0.0, self.width, self.height, 0.0, 0.0, 2.0)
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn proj_view(&self) -> Mat4 {
        self.projection() * self.view()
    }
}
