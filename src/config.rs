use glam::{Vec2, Vec3};

/// Tunables for the rigid-body simulation and the player controls
#[derive(Debug, Clone)]
pub struct PhysicsConfig {
    /// Gravity in physics units per second squared; +y points down the screen
    pub gravity: Vec2,
    /// Render-space pixels per physics unit
    pub world_scale: f32,
    pub jump_speed: f32,
    pub move_speed: f32,
    pub velocity_iterations: usize,
    pub position_iterations: usize,
    pub friction: f32,
    /// Upper bound for a single frame's step, in seconds
    pub max_frame_dt: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, 35.0),
            world_scale: 30.0,
            jump_speed: 15.0,
            move_speed: 5.0,
            velocity_iterations: 6,
            position_iterations: 2,
            friction: 0.9,
            max_frame_dt: 0.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewConfig {
    pub width: u32,
    pub height: u32,
    pub clear_color: [f64; 4],
    pub canvas_id: String,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            width: 400,
            height: 400,
            clear_color: [0.862, 0.980, 0.972, 1.0],
            canvas_id: "renderCanvas".to_string(),
        }
    }
}

/// Flat RGB colour per entity category
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub ground: Vec3,
    pub platform: Vec3,
    pub player: Vec3,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            ground: Vec3::new(0.450, 0.815, 0.443),
            platform: Vec3::new(0.450, 0.815, 0.443),
            player: Vec3::new(1.0, 0.776, 0.4),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssetConfig {
    pub shader_dir: String,
    pub vertex_shader: String,
    pub fragment_shader: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            shader_dir: "./assets/shaders/".to_string(),
            vertex_shader: "default.vert".to_string(),
            fragment_shader: "default.frag".to_string(),
        }
    }
}

impl AssetConfig {
    /// Native builds may relocate the shader directory with `SIMPLE_JUMP_ASSETS`
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_env() -> Self {
        let mut assets = Self::default();
        if let Ok(dir) = std::env::var("SIMPLE_JUMP_ASSETS") {
            assets.shader_dir = if dir.ends_with('/') { dir } else { format!("{dir}/") };
        }
        assets
    }
}

#[derive(Debug, Clone, Default)]
pub struct GameConfig {
    pub physics: PhysicsConfig,
    pub view: ViewConfig,
    pub palette: Palette,
    pub assets: AssetConfig,
}
