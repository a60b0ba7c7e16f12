// MODEL: Level layout and the fixed camera
pub mod entity;
pub mod scene;
pub mod camera;

pub use entity::{Entity, EntityKind};
pub use scene::SceneLayout;
pub use camera::Camera;
