use glam::{Mat4, Vec2};

use crate::config::PhysicsConfig;
use crate::controller::input::{Horizontal, InputProcessor, InputSource};
use crate::controller::physics::{BodyDef, BodyHandle, BodyKind, FixtureDef, PhysicsWorld, Shape};
use crate::model::{Camera, Entity, SceneLayout};

/// Everything one frame needs: layout, simulation, and the cached projection-view
pub struct GameState<W: PhysicsWorld> {
    pub layout: SceneLayout,
    pub world: W,
    pub player_body: BodyHandle,
    pub static_bodies: Vec<BodyHandle>,
    pub proj_view: Mat4,
    physics: PhysicsConfig,
    input: InputProcessor,
}

impl<W: PhysicsWorld> GameState<W> {
    /// Create one body per entity and cache the camera transform
    pub fn new(
        layout: SceneLayout,
        mut world: W,
        physics: PhysicsConfig,
        input: InputProcessor,
        camera: &Camera,
    ) -> Self {
        let static_bodies = layout
            .static_entities()
            .map(|e| spawn_body(&mut world, e, &physics))
            .collect();

        let player_body = spawn_body(&mut world, &layout.player, &physics);
        world.set_fixed_rotation(player_body, true);

        Self {
            layout,
            world,
            player_body,
            static_bodies,
            proj_view: camera.proj_view(),
            physics,
            input,
        }
    }

    pub fn physics_config(&self) -> &PhysicsConfig {
        &self.physics
    }

    pub fn input_processor(&self) -> &InputProcessor {
        &self.input
    }

    /// Advance the simulation by `dt` seconds and apply this frame's controls
    pub fn step_physics(&mut self, input: &impl InputSource, dt: f32) {
        self.world.step(
            dt,
            self.physics.velocity_iterations,
            self.physics.position_iterations,
        );

        let mut velocity = self.world.linear_velocity(self.player_body);

        if self.input.is_jumping(input) {
            velocity.y = -self.physics.jump_speed;
        }
        match self.input.horizontal_intent(input) {
            Some(Horizontal::Left) => velocity.x = -self.physics.move_speed,
            Some(Horizontal::Right) => velocity.x = self.physics.move_speed,
            None => {}
        }

        self.world.set_linear_velocity(self.player_body, velocity);
        self.world.clear_forces();

        let p = self.world.position(self.player_body) * self.physics.world_scale;
        self.layout.player.position.x = p.x;
        self.layout.player.position.y = p.y;

        tracing::trace!(dt, x = p.x, y = p.y, vx = velocity.x, vy = velocity.y, "physics step");
    }

    pub fn player_velocity(&self) -> Vec2 {
        self.world.linear_velocity(self.player_body)
    }

    /// Static body positions mapped back to render space
    pub fn static_body_positions(&self) -> Vec<Vec2> {
        self.static_bodies
            .iter()
            .map(|&b| self.world.position(b) * self.physics.world_scale)
            .collect()
    }
}

fn spawn_body<W: PhysicsWorld>(
    world: &mut W,
    entity: &Entity,
    physics: &PhysicsConfig,
) -> BodyHandle {
    let kind = if entity.kind.is_static() { BodyKind::Static } else { BodyKind::Dynamic };
    let scale = physics.world_scale;
    let position = entity.position.truncate() / scale;
    let half_extents = entity.size.truncate() / scale / 2.0;

    let body = world.create_body(BodyDef { position, kind });
    world.create_fixture(
        body,
        Shape::Box { half_extents },
        FixtureDef { friction: physics.friction },
    );
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::input::InputState;
    use crate::controller::physics::RapierWorld;
    use glam::Vec3;
    use std::collections::HashSet;

    /// Records every call and lets tests script what the "simulation" does
    #[derive(Default)]
    struct ScriptedWorld {
        bodies: Vec<(BodyDef, Vec2)>,
        fixtures: Vec<(BodyHandle, Shape, FixtureDef)>,
        fixed_rotation: Vec<BodyHandle>,
        steps: Vec<(f32, usize, usize)>,
        step_velocity: Vec2,
        cleared: usize,
    }

    impl PhysicsWorld for ScriptedWorld {
        fn create_body(&mut self, def: BodyDef) -> BodyHandle {
            self.bodies.push((def, Vec2::ZERO));
            BodyHandle(self.bodies.len() - 1)
        }
        fn create_fixture(&mut self, body: BodyHandle, shape: Shape, fixture: FixtureDef) {
            self.fixtures.push((body, shape, fixture));
        }
        fn set_fixed_rotation(&mut self, body: BodyHandle, fixed: bool) {
            if fixed {
                self.fixed_rotation.push(body);
            }
        }
        fn linear_velocity(&self, body: BodyHandle) -> Vec2 {
            self.bodies[body.0].1
        }
        fn set_linear_velocity(&mut self, body: BodyHandle, velocity: Vec2) {
            self.bodies[body.0].1 = velocity;
        }
        fn position(&self, body: BodyHandle) -> Vec2 {
            self.bodies[body.0].0.position
        }
        fn step(&mut self, dt: f32, vi: usize, pi: usize) {
            self.steps.push((dt, vi, pi));
            let v = self.step_velocity;
            for (def, vel) in self.bodies.iter_mut() {
                if def.kind == BodyKind::Dynamic {
                    *vel = v;
                    def.position += v * dt;
                }
            }
        }
        fn clear_forces(&mut self) {
            self.cleared += 1;
        }
    }

    fn keys(names: &[&str]) -> HashSet<String> {
        names.iter().map(|k| k.to_string()).collect()
    }

    fn scripted(step_velocity: Vec2) -> GameState<ScriptedWorld> {
        let world = ScriptedWorld { step_velocity, ..Default::default() };
        GameState::new(
            SceneLayout::default(),
            world,
            PhysicsConfig::default(),
            InputProcessor::default(),
            &Camera::new(400, 400),
        )
    }

    fn rapier() -> GameState<RapierWorld> {
        let physics = PhysicsConfig::default();
        GameState::new(
            SceneLayout::default(),
            RapierWorld::new(physics.gravity),
            physics,
            InputProcessor::default(),
            &Camera::new(400, 400),
        )
    }

    #[test]
    fn test_bodies_created_from_layout() {
        let state = scripted(Vec2::ZERO);
        let w = &state.world;
        assert_eq!(w.bodies.len(), 4);
        assert_eq!(state.static_bodies, vec![BodyHandle(0), BodyHandle(1), BodyHandle(2)]);
        assert_eq!(state.player_body, BodyHandle(3));
        assert_eq!(w.fixed_rotation, vec![BodyHandle(3)]);

        // ground: (200, 370) px, 390x50 px at scale 30
        let (ground, _) = w.bodies[0];
        assert_eq!(ground.kind, BodyKind::Static);
        assert!((ground.position - Vec2::new(200.0 / 30.0, 370.0 / 30.0)).length() < 1e-6);
        let (_, shape, fixture) = w.fixtures[0];
        let Shape::Box { half_extents } = shape;
        assert!((half_extents - Vec2::new(6.5, 50.0 / 60.0)).length() < 1e-6);
        assert_eq!(fixture.friction, 0.9);

        let (player, _) = w.bodies[3];
        assert_eq!(player.kind, BodyKind::Dynamic);
        assert!((player.position - Vec2::new(200.0 / 30.0, 25.0 / 30.0)).length() < 1e-6);
    }

    #[test]
    fn test_step_uses_fixed_iterations_and_clears_forces() {
        let mut state = scripted(Vec2::ZERO);
        state.step_physics(&keys(&[]), 0.016);
        assert_eq!(state.world.steps, vec![(0.016, 6, 2)]);
        assert_eq!(state.world.cleared, 1);
    }

    #[test]
    fn test_no_keys_keeps_simulated_velocity() {
        let mut state = scripted(Vec2::new(1.25, 3.5));
        state.step_physics(&keys(&[]), 0.016);
        assert_eq!(state.player_velocity(), Vec2::new(1.25, 3.5));
    }

    #[test]
    fn test_jump_overrides_vertical_only() {
        let mut state = scripted(Vec2::new(1.25, 3.5));
        state.step_physics(&keys(&["w"]), 0.016);
        assert_eq!(state.player_velocity(), Vec2::new(1.25, -15.0));
    }

    #[test]
    fn test_left_and_right_override_horizontal() {
        let mut state = scripted(Vec2::new(1.25, 3.5));
        state.step_physics(&keys(&["a"]), 0.016);
        assert_eq!(state.player_velocity(), Vec2::new(-5.0, 3.5));

        state.step_physics(&keys(&["ArrowRight"]), 0.016);
        assert_eq!(state.player_velocity(), Vec2::new(5.0, 3.5));

        state.step_physics(&keys(&["a", "d", " "]), 0.016);
        assert_eq!(state.player_velocity(), Vec2::new(5.0, -15.0));
    }

    #[test]
    fn test_render_position_tracks_body() {
        let mut state = scripted(Vec2::new(0.5, 2.0));
        for _ in 0..5 {
            state.step_physics(&keys(&[]), 0.1);
            let body = state.world.position(state.player_body) * 30.0;
            assert_eq!(state.layout.player.position.x, body.x);
            assert_eq!(state.layout.player.position.y, body.y);
        }
    }

    #[test]
    fn test_rapier_jump_sets_exact_velocity() {
        let mut state = rapier();
        state.step_physics(&keys(&[]), 1.0 / 60.0);
        state.step_physics(&keys(&["ArrowUp"]), 1.0 / 60.0);
        assert_eq!(state.player_velocity().y, -15.0);
        state.step_physics(&keys(&["ArrowLeft"]), 1.0 / 60.0);
        assert_eq!(state.player_velocity().x, -5.0);
    }

    #[test]
    fn test_rapier_render_position_invariant() {
        let mut state = rapier();
        let mut input = InputState::new();
        for i in 0..120 {
            input.pressed_keys = if i % 40 < 10 { keys(&["d", "w"]) } else { keys(&[]) };
            state.step_physics(&input, 1.0 / 60.0);
            let body = state.world.position(state.player_body) * state.physics_config().world_scale;
            assert_eq!(state.layout.player.position.x, body.x);
            assert_eq!(state.layout.player.position.y, body.y);
        }
    }

    #[test]
    fn test_static_bodies_never_move() {
        let mut state = rapier();
        let before = state.static_body_positions();
        for i in 0..300 {
            let held = if i % 2 == 0 { keys(&["a", " "]) } else { keys(&["d"]) };
            state.step_physics(&held, 1.0 / 60.0);
        }
        assert_eq!(state.static_body_positions(), before);
    }

    #[test]
    fn test_fall_for_one_second() {
        let mut state = rapier();
        let start = state.layout.player.position;
        for _ in 0..60 {
            state.step_physics(&keys(&[]), 1.0 / 60.0);
        }
        let end = state.layout.player.position;
        assert!(end.y > start.y, "player should fall: {start:?} -> {end:?}");
        assert!((end.x - start.x).abs() < 1e-3);

        let ground = state.static_body_positions()[0];
        assert!((ground - Vec2::new(200.0, 370.0)).length() < 1e-3);
        assert_eq!(state.layout.ground.position, Vec3::new(200.0, 370.0, 0.0));
    }
}
