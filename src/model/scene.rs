use glam::Vec3;

use super::entity::{Entity, EntityKind};

/// Static level layout plus the player's spawn box, all in render space
#[derive(Debug, Clone, PartialEq)]
pub struct SceneLayout {
    pub ground: Entity,
    pub platforms: Vec<Entity>,
    pub player: Entity,
}

impl SceneLayout {
    pub fn new(ground: Entity, platforms: Vec<Entity>, player: Entity) -> Self {
        Self { ground, platforms, player }
    }

    /// Entities in draw order: ground, player, then every platform
    pub fn draw_order(&self) -> impl Iterator<Item = &Entity> {
        std::iter::once(&self.ground)
            .chain(std::iter::once(&self.player))
            .chain(self.platforms.iter())
    }

    pub fn static_entities(&self) -> impl Iterator<Item = &Entity> {
        std::iter::once(&self.ground).chain(self.platforms.iter())
    }
}

impl Default for SceneLayout {
    fn default() -> Self {
        let ground = Entity::new(
            EntityKind::Ground,
            Vec3::new(200.0, 370.0, 0.0),
            Vec3::new(390.0, 50.0, 1.0),
        );
        let platforms = vec![
            Entity::new(EntityKind::Platform, Vec3::new(100.0, 200.0, 0.0), Vec3::new(100.0, 30.0, 1.0)),
            Entity::new(EntityKind::Platform, Vec3::new(300.0, 100.0, 0.0), Vec3::new(100.0, 30.0, 1.0)),
        ];
        let player = Entity::new(
            EntityKind::Player,
            Vec3::new(200.0, 25.0, 0.0),
            Vec3::new(50.0, 50.0, 1.0),
        );
        Self::new(ground, platforms, player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_order() {
        let layout = SceneLayout::default();
        let kinds: Vec<EntityKind> = layout.draw_order().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EntityKind::Ground, EntityKind::Player, EntityKind::Platform, EntityKind::Platform]
        );
    }

    #[test]
    fn test_static_entities_exclude_player() {
        let layout = SceneLayout::default();
        assert_eq!(layout.static_entities().count(), 3);
        assert!(layout.static_entities().all(|e| e.kind.is_static()));
    }
}
