//! Shader program builder: fetch a vertex and a fragment source, compile each
//! stage on its own, then check that the two stages fit together and fit the
//! quad pipeline.
//!
//! Compilation is WGSL parsing plus validation through `naga`, the same
//! front-end wgpu runs when a module is created. Validation uses no optional
//! capabilities because the device is requested without optional features.
//! Linking checks the interface the pipeline provides: one `vec2<f32>` vertex
//! attribute at [`QUAD_POSITION_LOCATION`] and one uniform block of at most
//! [`UNIFORM_BLOCK_SIZE`] bytes at `@group(0) @binding(0)`.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

use naga::valid::{Capabilities, ValidationFlags, Validator};
use thiserror::Error;

use crate::error::GameError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Link,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vert",
            ShaderStage::Fragment => "frag",
            ShaderStage::Link => "link",
        })
    }
}

#[derive(Debug, Clone, Error)]
#[error("{stage}: {log}")]
pub struct ShaderError {
    pub stage: ShaderStage,
    pub log: String,
}

/// Vertex attribute slot of the unit quad's position
pub const QUAD_POSITION_LOCATION: u32 = 0;
pub const UNIFORM_GROUP: u32 = 0;
pub const UNIFORM_BINDING: u32 = 0;
/// `mat4x4<f32>` mvp + `vec4<f32>` colour
pub const UNIFORM_BLOCK_SIZE: u32 = 80;

/// A compiled and linked pair of WGSL modules
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    pub vertex_source: String,
    pub fragment_source: String,
    pub vertex_entry: String,
    pub fragment_entry: String,
}

/// Where shader text comes from: HTTP in the browser, the filesystem natively
pub trait AssetSource {
    fn fetch_text(&self, path: &str) -> impl Future<Output = Result<String, GameError>>;
}

/// Fetch, compile and link `base + vert_file` / `base + frag_file`.
///
/// Any compile or link failure is logged and returned; there is no fallback program.
pub async fn build_program<A: AssetSource>(
    assets: &A,
    base: &str,
    vert_file: &str,
    frag_file: &str,
) -> Result<ShaderProgram, GameError> {
    let vertex_source = assets.fetch_text(&format!("{base}{vert_file}")).await?;
    let fragment_source = assets.fetch_text(&format!("{base}{frag_file}")).await?;

    let program = compile_program(vertex_source, fragment_source).map_err(|e| {
        tracing::error!("{e}");
        e
    })?;
    tracing::info!(vert = vert_file, frag = frag_file, "shader program ready");
    Ok(program)
}

/// Compile both stages independently and link them
pub fn compile_program(vertex_source: String, fragment_source: String) -> Result<ShaderProgram, ShaderError> {
    let vertex = compile_stage(&vertex_source, ShaderStage::Vertex)?;
    let fragment = compile_stage(&fragment_source, ShaderStage::Fragment)?;

    let vertex_entry = entry_point(&vertex, naga::ShaderStage::Vertex)
        .ok_or_else(|| link_error("vertex source has no @vertex entry point"))?;
    let fragment_entry = entry_point(&fragment, naga::ShaderStage::Fragment)
        .ok_or_else(|| link_error("fragment source has no @fragment entry point"))?;

    check_vertex_inputs(&vertex, vertex_entry)?;
    check_bindings(&vertex, "vertex")?;
    check_bindings(&fragment, "fragment")?;

    let written = stage_locations(&vertex, vertex_entry, Interface::Outputs);
    let read = stage_locations(&fragment, fragment_entry, Interface::Inputs);
    if let Some(missing) = read.keys().find(|l| !written.contains_key(l)) {
        return Err(link_error(&format!(
            "fragment input @location({missing}) is not written by `{}`",
            vertex_entry.name
        )));
    }

    Ok(ShaderProgram {
        vertex_entry: vertex_entry.name.clone(),
        fragment_entry: fragment_entry.name.clone(),
        vertex_source,
        fragment_source,
    })
}

fn compile_stage(source: &str, stage: ShaderStage) -> Result<naga::Module, ShaderError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError {
        stage,
        log: e.emit_to_string(source),
    })?;

    Validator::new(ValidationFlags::all(), Capabilities::empty())
        .validate(&module)
        .map_err(|e| ShaderError {
            stage,
            log: error_chain(&e),
        })?;

    Ok(module)
}

/// "outer: cause: root cause"
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut log = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        log.push_str(": ");
        log.push_str(&cause.to_string());
        source = cause.source();
    }
    log
}

fn link_error(log: &str) -> ShaderError {
    ShaderError {
        stage: ShaderStage::Link,
        log: log.to_string(),
    }
}

fn entry_point(module: &naga::Module, stage: naga::ShaderStage) -> Option<&naga::EntryPoint> {
    module.entry_points.iter().find(|ep| ep.stage == stage)
}

/// The quad buffer feeds exactly one `vec2<f32>` attribute
fn check_vertex_inputs(module: &naga::Module, ep: &naga::EntryPoint) -> Result<(), ShaderError> {
    for (location, ty) in stage_locations(module, ep, Interface::Inputs) {
        if location != QUAD_POSITION_LOCATION {
            return Err(link_error(&format!(
                "vertex input @location({location}) has no vertex buffer attribute"
            )));
        }
        let is_vec2_f32 = matches!(
            module.types[ty].inner,
            naga::TypeInner::Vector { size: naga::VectorSize::Bi, scalar: naga::Scalar::F32 }
        );
        if !is_vec2_f32 {
            return Err(link_error(&format!(
                "vertex input @location({location}) must be vec2<f32>"
            )));
        }
    }
    Ok(())
}

/// Only the per-draw uniform block is bound
fn check_bindings(module: &naga::Module, stage: &str) -> Result<(), ShaderError> {
    for (_, var) in module.global_variables.iter() {
        let Some(binding) = &var.binding else {
            continue;
        };
        if (binding.group, binding.binding) != (UNIFORM_GROUP, UNIFORM_BINDING) {
            let provided = format!("@group({UNIFORM_GROUP}) @binding({UNIFORM_BINDING})");
            return Err(link_error(&format!(
                "{stage} binds @group({}) @binding({}), the pipeline only provides {provided}",
                binding.group, binding.binding
            )));
        }
        if var.space != naga::AddressSpace::Uniform {
            return Err(link_error(&format!(
                "{stage} @group({}) @binding({}) must be a uniform",
                binding.group, binding.binding
            )));
        }
        let size = module.types[var.ty].inner.size(module.to_ctx());
        if size > UNIFORM_BLOCK_SIZE {
            return Err(link_error(&format!(
                "{stage} uniform block is {size} bytes, the pipeline binds {UNIFORM_BLOCK_SIZE}"
            )));
        }
    }
    Ok(())
}

enum Interface {
    Inputs,
    Outputs,
}

/// User-defined `@location`s and their types on one side of an entry point, flattening structs
fn stage_locations(
    module: &naga::Module,
    ep: &naga::EntryPoint,
    side: Interface,
) -> BTreeMap<u32, naga::Handle<naga::Type>> {
    let mut locations = BTreeMap::new();
    match side {
        Interface::Inputs => {
            for arg in &ep.function.arguments {
                collect_locations(module, arg.ty, arg.binding.as_ref(), &mut locations);
            }
        }
        Interface::Outputs => {
            if let Some(result) = &ep.function.result {
                collect_locations(module, result.ty, result.binding.as_ref(), &mut locations);
            }
        }
    }
    locations
}

fn collect_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    out: &mut BTreeMap<u32, naga::Handle<naga::Type>>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => {
            out.insert(*location, ty);
        }
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(module, member.ty, member.binding.as_ref(), out);
                }
            }
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use fs_assets::FsAssets;

#[cfg(not(target_arch = "wasm32"))]
mod fs_assets {
    use super::*;

    /// Reads assets relative to the working directory
    #[derive(Debug, Default, Clone, Copy)]
    pub struct FsAssets;

    impl AssetSource for FsAssets {
        async fn fetch_text(&self, path: &str) -> Result<String, GameError> {
            std::fs::read_to_string(path).map_err(|e| GameError::Asset {
                path: path.to_string(),
                reason: e.to_string(),
            })
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use http_assets::HttpAssets;

#[cfg(target_arch = "wasm32")]
mod http_assets {
    use super::*;
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::JsFuture;
    use web_sys::Response;

    /// Fetches assets relative to the page URL
    #[derive(Debug, Default, Clone, Copy)]
    pub struct HttpAssets;

    fn asset_error(path: &str, reason: impl fmt::Debug) -> GameError {
        GameError::Asset {
            path: path.to_string(),
            reason: format!("{reason:?}"),
        }
    }

    impl AssetSource for HttpAssets {
        async fn fetch_text(&self, path: &str) -> Result<String, GameError> {
            let window = web_sys::window().ok_or_else(|| asset_error(path, "no global `window`"))?;
            let response = JsFuture::from(window.fetch_with_str(path))
                .await
                .map_err(|e| asset_error(path, e))?;
            let response: Response = response.dyn_into().map_err(|e| asset_error(path, e))?;
            if !response.ok() {
                return Err(asset_error(path, format!("HTTP {}", response.status())));
            }
            let text = JsFuture::from(response.text().map_err(|e| asset_error(path, e))?)
                .await
                .map_err(|e| asset_error(path, e))?;
            text.as_string().ok_or_else(|| asset_error(path, "response body is not text"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const DEFAULT_VERT: &str = include_str!("../../assets/shaders/default.vert");
    const DEFAULT_FRAG: &str = include_str!("../../assets/shaders/default.frag");

    struct MemoryAssets(HashMap<String, String>);

    impl MemoryAssets {
        fn new(files: &[(&str, &str)]) -> Self {
            Self(files.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
        }
    }

    impl AssetSource for MemoryAssets {
        async fn fetch_text(&self, path: &str) -> Result<String, GameError> {
            self.0.get(path).cloned().ok_or_else(|| GameError::Asset {
                path: path.to_string(),
                reason: "not found".to_string(),
            })
        }
    }

    fn build(vert: &str, frag: &str) -> Result<ShaderProgram, GameError> {
        let assets = MemoryAssets::new(&[("shaders/a.vert", vert), ("shaders/a.frag", frag)]);
        pollster::block_on(build_program(&assets, "shaders/", "a.vert", "a.frag"))
    }

    fn shader_error(result: Result<ShaderProgram, GameError>) -> ShaderError {
        match result {
            Err(GameError::Shader(e)) => e,
            other => panic!("expected a shader error, got {other:?}"),
        }
    }

    const VARYING_VERT: &str = r#"
struct Out {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@location(0) p: vec2<f32>) -> Out {
    var o: Out;
    o.pos = vec4<f32>(p, 0.0, 1.0);
    o.uv = p;
    return o;
}
"#;

    const VARYING_FRAG: &str = r#"
@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(uv, 0.0, 1.0);
}
"#;

    const TWO_VARYING_FRAG: &str = r#"
@fragment
fn fs_main(@location(0) uv: vec2<f32>, @location(1) tint: vec3<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(tint * uv.x, 1.0);
}
"#;

    #[test]
    fn test_default_shaders_build() {
        let program = build(DEFAULT_VERT, DEFAULT_FRAG).unwrap();
        assert_eq!(program.vertex_entry, "vs_main");
        assert_eq!(program.fragment_entry, "fs_main");
        assert_eq!(program.vertex_source, DEFAULT_VERT);
    }

    #[test]
    fn test_matching_varyings_link() {
        assert!(build(VARYING_VERT, VARYING_FRAG).is_ok());
    }

    #[test]
    fn test_vertex_syntax_error_reports_vert() {
        let err = shader_error(build("@vertex fn vs_main( -> {", DEFAULT_FRAG));
        assert_eq!(err.stage, ShaderStage::Vertex);
        assert!(err.to_string().starts_with("vert: "));
    }

    #[test]
    fn test_fragment_type_error_reports_frag() {
        let bad = "@fragment fn fs_main() -> @location(0) vec4<f32> { return 1.0; }";
        let err = shader_error(build(DEFAULT_VERT, bad));
        assert_eq!(err.stage, ShaderStage::Fragment);
        assert!(err.to_string().starts_with("frag: "));
    }

    #[test]
    fn test_missing_entry_point_reports_link() {
        // a valid module, but it only has a fragment entry point
        let err = shader_error(build(DEFAULT_FRAG, DEFAULT_FRAG));
        assert_eq!(err.stage, ShaderStage::Link);
        assert!(err.to_string().contains("link"));
    }

    #[test]
    fn test_unwritten_varying_reports_link() {
        let err = shader_error(build(VARYING_VERT, TWO_VARYING_FRAG));
        assert_eq!(err.stage, ShaderStage::Link);
        assert!(err.log.contains("@location(1)"));
    }

    #[test]
    fn test_vertex_input_without_buffer_reports_link() {
        let vert = r#"
@vertex
fn vs_main(@location(0) p: vec2<f32>, @location(1) uv: vec2<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(p + uv, 0.0, 1.0);
}
"#;
        let err = shader_error(build(vert, DEFAULT_FRAG));
        assert_eq!(err.stage, ShaderStage::Link);
        assert!(err.to_string().starts_with("link: "));
        assert!(err.log.contains("@location(1)"));
    }

    #[test]
    fn test_position_must_be_vec2() {
        let vert = r#"
@vertex
fn vs_main(@location(0) p: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(p, 1.0);
}
"#;
        let err = shader_error(build(vert, DEFAULT_FRAG));
        assert_eq!(err.stage, ShaderStage::Link);
        assert!(err.log.contains("vec2<f32>"));
    }

    #[test]
    fn test_unknown_binding_reports_link() {
        let frag = r#"
@group(0) @binding(1) var<uniform> tint: vec4<f32>;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return tint;
}
"#;
        let err = shader_error(build(DEFAULT_VERT, frag));
        assert_eq!(err.stage, ShaderStage::Link);
        assert!(err.log.contains("@binding(1)"));
    }

    #[test]
    fn test_oversized_uniform_reports_link() {
        let frag = r#"
struct Big {
    mvp: mat4x4<f32>,
    color: vec4<f32>,
    extra: vec4<f32>,
};
@group(0) @binding(0) var<uniform> big: Big;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return big.extra;
}
"#;
        let err = shader_error(build(DEFAULT_VERT, frag));
        assert_eq!(err.stage, ShaderStage::Link);
        assert!(err.log.contains("96 bytes"));
    }

    #[test]
    fn test_f64_is_rejected_without_device_support() {
        let vert = r#"
@vertex
fn vs_main(@location(0) p: vec2<f32>) -> @builtin(position) vec4<f32> {
    let d: f64 = 1.0lf;
    return vec4<f32>(p, f32(d), 1.0);
}
"#;
        let err = shader_error(build(vert, DEFAULT_FRAG));
        assert_eq!(err.stage, ShaderStage::Vertex);
    }

    #[test]
    fn test_missing_file_is_an_asset_error() {
        let assets = MemoryAssets::new(&[("shaders/a.vert", DEFAULT_VERT)]);
        let result = pollster::block_on(build_program(&assets, "shaders/", "a.vert", "a.frag"));
        assert!(matches!(result, Err(GameError::Asset { ref path, .. }) if path == "shaders/a.frag"));
    }

    #[test]
    fn test_fs_assets_reads_shader_dir() {
        let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/shaders/");
        let program = pollster::block_on(build_program(&FsAssets, dir, "default.vert", "default.frag"));
        assert!(program.is_ok());
    }
}
