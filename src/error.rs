use thiserror::Error;

use crate::view::shader::ShaderError;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("no drawing surface named `{0}`")]
    SurfaceUnavailable(String),

    #[error("GPU init failed: {0}")]
    Gpu(String),

    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error(transparent)]
    Shader(#[from] ShaderError),

    #[error("failed to load `{path}`: {reason}")]
    Asset { path: String, reason: String },
}

#[cfg(target_arch = "wasm32")]
impl From<GameError> for wasm_bindgen::JsValue {
    fn from(err: GameError) -> Self {
        js_sys::Error::new(&err.to_string()).into()
    }
}
