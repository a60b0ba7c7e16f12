// VIEW: Shaders, GPU setup and drawing
pub mod shader;
pub mod render;
pub mod gpu_init;

pub use shader::{build_program, AssetSource, ShaderError, ShaderProgram, ShaderStage};
pub use render::{render_scene, Renderer, WgpuRenderer};
pub use gpu_init::GpuContext;
