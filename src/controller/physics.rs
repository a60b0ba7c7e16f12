use glam::Vec2;
use rapier2d::prelude::*;

/// Opaque handle to a body owned by a [`PhysicsWorld`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDef {
    pub position: Vec2,
    pub kind: BodyKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Box { half_extents: Vec2 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixtureDef {
    pub friction: f32,
}

/// The slice of a rigid-body engine the game talks to.
///
/// Handles are minted by `create_body`; passing a handle from another world
/// is a programming error and panics.
pub trait PhysicsWorld {
    fn create_body(&mut self, def: BodyDef) -> BodyHandle;
    fn create_fixture(&mut self, body: BodyHandle, shape: Shape, fixture: FixtureDef);
    fn set_fixed_rotation(&mut self, body: BodyHandle, fixed: bool);
    fn linear_velocity(&self, body: BodyHandle) -> Vec2;
    fn set_linear_velocity(&mut self, body: BodyHandle, velocity: Vec2);
    fn position(&self, body: BodyHandle) -> Vec2;
    fn step(&mut self, dt: f32, velocity_iterations: usize, position_iterations: usize);
    fn clear_forces(&mut self);
}

/// [`PhysicsWorld`] backed by rapier2d
pub struct RapierWorld {
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    handles: Vec<RigidBodyHandle>,
}

impl RapierWorld {
    pub fn new(gravity: Vec2) -> Self {
        Self {
            gravity: vector![gravity.x, gravity.y],
            integration_parameters: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            handles: Vec::new(),
        }
    }

    pub fn body_count(&self) -> usize {
        self.handles.len()
    }

    fn body(&self, body: BodyHandle) -> &RigidBody {
        &self.bodies[self.handles[body.0]]
    }

    fn body_mut(&mut self, body: BodyHandle) -> &mut RigidBody {
        &mut self.bodies[self.handles[body.0]]
    }
}

impl PhysicsWorld for RapierWorld {
    fn create_body(&mut self, def: BodyDef) -> BodyHandle {
        let builder = match def.kind {
            BodyKind::Static => RigidBodyBuilder::fixed(),
            BodyKind::Dynamic => RigidBodyBuilder::dynamic(),
        };
        let rb = builder.translation(vector![def.position.x, def.position.y]).build();
        let handle = BodyHandle(self.handles.len());
        self.handles.push(self.bodies.insert(rb));
        tracing::debug!(?handle, kind = ?def.kind, x = def.position.x, y = def.position.y, "created body");
        handle
    }

    fn create_fixture(&mut self, body: BodyHandle, shape: Shape, fixture: FixtureDef) {
        let builder = match shape {
            Shape::Box { half_extents } => ColliderBuilder::cuboid(half_extents.x, half_extents.y),
        };
        let collider = builder.friction(fixture.friction).build();
        let parent = self.handles[body.0];
        self.colliders.insert_with_parent(collider, parent, &mut self.bodies);
    }

    fn set_fixed_rotation(&mut self, body: BodyHandle, fixed: bool) {
        self.body_mut(body).lock_rotations(fixed, true);
    }

    fn linear_velocity(&self, body: BodyHandle) -> Vec2 {
        let v = self.body(body).linvel();
        Vec2::new(v.x, v.y)
    }

    fn set_linear_velocity(&mut self, body: BodyHandle, velocity: Vec2) {
        self.body_mut(body).set_linvel(vector![velocity.x, velocity.y], true);
    }

    fn position(&self, body: BodyHandle) -> Vec2 {
        let t = self.body(body).translation();
        Vec2::new(t.x, t.y)
    }

    fn step(&mut self, dt: f32, velocity_iterations: usize, position_iterations: usize) {
        // rapier divides by dt; a zero-length frame is simply skipped
        if !(dt > 0.0) {
            return;
        }
        self.integration_parameters.dt = dt;
        self.integration_parameters.num_solver_iterations =
            std::num::NonZeroUsize::new(velocity_iterations).unwrap_or(std::num::NonZeroUsize::MIN);
        self.integration_parameters.num_internal_stabilization_iterations = position_iterations;

        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    fn clear_forces(&mut self) {
        for (_, rb) in self.bodies.iter_mut() {
            rb.reset_forces(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_with_floor() -> (RapierWorld, BodyHandle) {
        let mut world = RapierWorld::new(Vec2::new(0.0, 35.0));
        let floor = world.create_body(BodyDef { position: Vec2::new(5.0, 10.0), kind: BodyKind::Static });
        world.create_fixture(floor, Shape::Box { half_extents: Vec2::new(5.0, 0.5) }, FixtureDef { friction: 0.9 });
        (world, floor)
    }

    #[test]
    fn test_handles_are_sequential() {
        let (mut world, floor) = world_with_floor();
        let b = world.create_body(BodyDef { position: Vec2::ZERO, kind: BodyKind::Dynamic });
        assert_eq!(floor, BodyHandle(0));
        assert_eq!(b, BodyHandle(1));
        assert_eq!(world.body_count(), 2);
    }

    #[test]
    fn test_dynamic_body_falls() {
        let (mut world, _) = world_with_floor();
        let b = world.create_body(BodyDef { position: Vec2::new(5.0, 2.0), kind: BodyKind::Dynamic });
        world.create_fixture(b, Shape::Box { half_extents: Vec2::new(0.5, 0.5) }, FixtureDef { friction: 0.9 });
        for _ in 0..10 {
            world.step(1.0 / 60.0, 6, 2);
        }
        assert!(world.position(b).y > 2.0);
        assert!(world.linear_velocity(b).y > 0.0);
    }

    #[test]
    fn test_dynamic_body_comes_to_rest_on_floor() {
        let (mut world, floor) = world_with_floor();
        let b = world.create_body(BodyDef { position: Vec2::new(5.0, 2.0), kind: BodyKind::Dynamic });
        world.create_fixture(b, Shape::Box { half_extents: Vec2::new(0.5, 0.5) }, FixtureDef { friction: 0.9 });
        world.set_fixed_rotation(b, true);
        for _ in 0..180 {
            world.step(1.0 / 60.0, 6, 2);
        }
        // floor top is at 9.5, box half height 0.5
        assert!((world.position(b).y - 9.0).abs() < 0.05);
        assert_eq!(world.position(floor), Vec2::new(5.0, 10.0));
    }

    #[test]
    fn test_set_velocity_is_read_back_exactly() {
        let (mut world, _) = world_with_floor();
        let b = world.create_body(BodyDef { position: Vec2::ZERO, kind: BodyKind::Dynamic });
        world.set_linear_velocity(b, Vec2::new(-5.0, -15.0));
        assert_eq!(world.linear_velocity(b), Vec2::new(-5.0, -15.0));
    }

    #[test]
    fn test_zero_dt_is_a_no_op() {
        let (mut world, _) = world_with_floor();
        let b = world.create_body(BodyDef { position: Vec2::new(1.0, 1.0), kind: BodyKind::Dynamic });
        world.step(0.0, 6, 2);
        assert_eq!(world.position(b), Vec2::new(1.0, 1.0));
        assert_eq!(world.linear_velocity(b), Vec2::ZERO);
    }
}
