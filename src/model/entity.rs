use glam::{Mat4, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Ground,
    Platform,
    Player,
}

impl EntityKind {
    /// Only the player is moved by the simulation
    pub fn is_static(self) -> bool {
        !matches!(self, EntityKind::Player)
    }
}

/// An axis-aligned box in render space, centred on `position`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entity {
    pub kind: EntityKind,
    pub position: Vec3,
    pub size: Vec3,
}

impl Entity {
    pub fn new(kind: EntityKind, position: Vec3, size: Vec3) -> Self {
        Self { kind, position, size }
    }

    /// translate(position) * scale(size), applied to the unit quad
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position) * Mat4::from_scale(self.size)
    }
}
