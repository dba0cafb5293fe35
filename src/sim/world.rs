//! Per-roll physics world
//!
//! One `PhysicsWorld` exists per roll. It is built from scratch from the roll
//! seed, stepped at a fixed timestep and dropped when the roll is replaced, so
//! no solver state leaks from one roll into the next.

use glam::{Quat, Vec3};
use rapier3d::na::{Isometry3, Translation3, UnitQuaternion};
use rapier3d::prelude::*;

use super::dice::{DieKind, RollRequest};
use super::registry::{ColliderShape, DieModel, ModelRegistry};
use super::seed::SeedStream;
use crate::consts::*;
use crate::error::AssetError;

/// Collider actually built for a die
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColliderKind {
    Cuboid,
    ConvexHull,
    /// Hull construction failed; approximated by the enclosing sphere
    BoundingSphere,
}

/// Initial conditions drawn from the seed stream for one die
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Launch {
    pub position: Vec3,
    pub velocity: Vec3,
    pub spin: Vec3,
    /// Euler angles (x, y, z) in radians
    pub euler: Vec3,
}

impl Launch {
    /// Consume the eleven draws for one die, in wire order:
    /// position x, position y, velocity x/y/z, spin x/y/z, euler x/y/z
    pub fn draw(seed: &mut SeedStream, index: usize) -> Self {
        let reach_x = ARENA_HALF_X - SPAWN_MARGIN;
        let reach_y = ARENA_HALF_Y - SPAWN_MARGIN;

        let px = seed.signed(reach_x);
        let py = seed.signed(reach_y);

        let vx = seed.signed(LAUNCH_PLANAR_SPEED);
        let vy = seed.signed(LAUNCH_PLANAR_SPEED);
        let vz = seed.range(LAUNCH_MIN_LIFT, LAUNCH_MIN_LIFT + LAUNCH_LIFT_RANGE);

        let wx = seed.signed(LAUNCH_SPIN);
        let wy = seed.signed(LAUNCH_SPIN);
        let wz = seed.signed(LAUNCH_SPIN);

        let ex = seed.range(0.0, std::f32::consts::TAU);
        let ey = seed.range(0.0, std::f32::consts::TAU);
        let ez = seed.range(0.0, std::f32::consts::TAU);

        // Stack layers so a full tray does not spawn interpenetrating
        let layer = (index % SPAWN_LAYERS) as f32;

        Self {
            position: Vec3::new(px, py, SPAWN_HEIGHT + layer * SPAWN_LAYER_GAP),
            velocity: Vec3::new(vx, vy, vz),
            spin: Vec3::new(wx, wy, wz),
            euler: Vec3::new(ex, ey, ez),
        }
    }

    /// Orientation Rz(z)·Ry(y)·Rx(x)
    pub fn orientation(&self) -> UnitQuaternion<Real> {
        UnitQuaternion::from_euler_angles(self.euler.x, self.euler.y, self.euler.z)
    }
}

/// Render-side transform of one die, copied from its body after each step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DieVisual {
    pub kind: DieKind,
    pub position: Vec3,
    pub rotation: Quat,
}

/// A die in the active world
#[derive(Debug, Clone)]
pub struct DieInstance {
    pub kind: DieKind,
    pub body: RigidBodyHandle,
    pub collider: ColliderKind,
    pub launch: Launch,
    pub visual: DieVisual,
}

/// Fixed-timestep world holding the arena and every die of one roll
pub struct PhysicsWorld {
    gravity: Vector<Real>,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
    dice: Vec<DieInstance>,
    steps: u64,
    draws: u64,
}

impl PhysicsWorld {
    /// Build the world for a roll request
    pub fn build(registry: &ModelRegistry, request: &RollRequest) -> Result<Self, AssetError> {
        Self::build_with(registry, request.seed, request.count, request.sides)
    }

    /// Build a fresh world: static arena, then one body per die from the seed
    pub fn build_with(
        registry: &ModelRegistry,
        seed: u32,
        count: u32,
        kind: DieKind,
    ) -> Result<Self, AssetError> {
        let model = registry.get(kind)?;

        let mut params = IntegrationParameters::default();
        params.dt = SIM_DT;

        let mut world = Self {
            gravity: vector![0.0, 0.0, -GRAVITY],
            params,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            dice: Vec::with_capacity(count as usize),
            steps: 0,
            draws: 0,
        };

        world.add_arena();

        let mut stream = SeedStream::new(seed);
        for index in 0..count as usize {
            let launch = Launch::draw(&mut stream, index);
            world.add_die(model, launch);
        }
        world.draws = stream.draws();

        log::debug!(
            "World built: seed={} {}{} ({} draws)",
            seed,
            count,
            kind,
            world.draws
        );
        Ok(world)
    }

    /// Floor, ceiling and four walls around the arena
    fn add_arena(&mut self) {
        let t = WALL_THICKNESS;
        let half_h = ARENA_HEIGHT / 2.0;
        let span_x = ARENA_HALF_X + 2.0 * t;
        let span_y = ARENA_HALF_Y + 2.0 * t;

        let floor = ColliderBuilder::cuboid(span_x, span_y, t)
            .translation(vector![0.0, 0.0, -t])
            .restitution(FLOOR_RESTITUTION)
            .friction(FLOOR_FRICTION)
            .build();
        self.colliders.insert(floor);

        let ceiling = ColliderBuilder::cuboid(span_x, span_y, t)
            .translation(vector![0.0, 0.0, ARENA_HEIGHT + t])
            .restitution(CEILING_RESTITUTION)
            .friction(CEILING_FRICTION)
            .build();
        self.colliders.insert(ceiling);

        for sign in [-1.0_f32, 1.0] {
            let wall_x = ColliderBuilder::cuboid(t, span_y, half_h + t)
                .translation(vector![sign * (ARENA_HALF_X + t), 0.0, half_h])
                .restitution(WALL_RESTITUTION)
                .friction(WALL_FRICTION)
                .build();
            self.colliders.insert(wall_x);

            let wall_y = ColliderBuilder::cuboid(span_x, t, half_h + t)
                .translation(vector![0.0, sign * (ARENA_HALF_Y + t), half_h])
                .restitution(WALL_RESTITUTION)
                .friction(WALL_FRICTION)
                .build();
            self.colliders.insert(wall_y);
        }
    }

    fn add_die(&mut self, model: &DieModel, launch: Launch) {
        let p = launch.position;
        let v = launch.velocity;
        let w = launch.spin;
        let orientation = launch.orientation();

        let body = RigidBodyBuilder::dynamic()
            .position(Isometry3::from_parts(
                Translation3::new(p.x, p.y, p.z),
                orientation,
            ))
            .linvel(vector![v.x, v.y, v.z])
            .angvel(vector![w.x, w.y, w.z])
            .linear_damping(DIE_LINEAR_DAMPING)
            .angular_damping(DIE_ANGULAR_DAMPING)
            .ccd_enabled(true)
            .build();
        let handle = self.bodies.insert(body);

        let (builder, collider) = collider_for(model);
        let collider_shape = builder
            .density(model.density)
            .restitution(model.restitution)
            .friction(model.friction)
            .build();
        self.colliders
            .insert_with_parent(collider_shape, handle, &mut self.bodies);

        self.dice.push(DieInstance {
            kind: model.kind,
            body: handle,
            collider,
            launch,
            visual: DieVisual {
                kind: model.kind,
                position: p,
                rotation: to_quat(&orientation),
            },
        });
    }

    /// Advance every body by one fixed timestep, then copy transforms to visuals
    pub fn step(&mut self) {
        self.pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            None,
            &(),
            &(),
        );
        self.steps += 1;
        self.sync_visuals();
    }

    fn sync_visuals(&mut self) {
        for die in &mut self.dice {
            if let Some(body) = self.bodies.get(die.body) {
                die.visual.position = to_vec3(body.translation());
                die.visual.rotation = to_quat(body.rotation());
            }
        }
    }

    /// True while any die moves faster than `threshold` (linear or angular)
    pub fn any_moving(&self, threshold: f32) -> bool {
        self.speeds()
            .any(|(linear, angular)| linear > threshold || angular > threshold)
    }

    /// (linear, angular) speed of each die
    pub fn speeds(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.dice.iter().filter_map(|die| {
            self.bodies
                .get(die.body)
                .map(|body| (body.linvel().norm(), body.angvel().norm()))
        })
    }

    /// Zero every velocity so the settled pose stays put on screen
    pub fn freeze(&mut self) {
        for die in &self.dice {
            if let Some(body) = self.bodies.get_mut(die.body) {
                body.set_linvel(vector![0.0, 0.0, 0.0], false);
                body.set_angvel(vector![0.0, 0.0, 0.0], false);
            }
        }
        self.sync_visuals();
    }

    pub fn dice(&self) -> &[DieInstance] {
        &self.dice
    }

    pub fn visuals(&self) -> Vec<DieVisual> {
        self.dice.iter().map(|d| d.visual).collect()
    }

    /// Kind and orientation of each die, for face resolution
    pub fn orientations(&self) -> Vec<(DieKind, Quat)> {
        self.dice
            .iter()
            .map(|d| (d.kind, d.visual.rotation))
            .collect()
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Seed draws consumed while building
    pub fn draws(&self) -> u64 {
        self.draws
    }
}

/// Collider for a model, falling back to the bounding sphere when the
/// requested shape cannot be built
pub fn collider_for(model: &DieModel) -> (ColliderBuilder, ColliderKind) {
    match model.shape {
        ColliderShape::Cuboid => {
            let half = model.half_extents();
            if half.min_element() > f32::EPSILON && half.is_finite() {
                return (
                    ColliderBuilder::cuboid(half.x, half.y, half.z),
                    ColliderKind::Cuboid,
                );
            }
        }
        ColliderShape::Hull => {
            let points = model.scaled_vertices();
            if !is_degenerate(&points) {
                let points: Vec<Point<Real>> =
                    points.iter().map(|v| point![v.x, v.y, v.z]).collect();
                if let Some(builder) = ColliderBuilder::convex_hull(&points) {
                    return (builder, ColliderKind::ConvexHull);
                }
            }
        }
    }

    log::warn!(
        "{} collider could not be built, using bounding sphere",
        model.kind
    );
    (
        ColliderBuilder::ball(model.bounding_radius()),
        ColliderKind::BoundingSphere,
    )
}

/// Point sets that cannot enclose a volume: too few, non-finite, or flat
pub fn is_degenerate(points: &[Vec3]) -> bool {
    const EPS: f32 = 1e-6;

    if points.len() < 4 || points.iter().any(|p| !p.is_finite()) {
        return true;
    }

    let a = points[0];
    let Some(b) = farthest(points, |p| p.distance_squared(a)) else {
        return true;
    };
    let ab = b - a;
    let Some(c) = farthest(points, |p| ab.cross(p - a).length_squared()) else {
        return true;
    };
    let normal = ab.cross(c - a);
    if normal.length_squared() < EPS {
        return true;
    }
    let volume = points
        .iter()
        .map(|p| normal.dot(*p - a).abs())
        .fold(0.0_f32, f32::max);
    volume < EPS
}

fn farthest(points: &[Vec3], metric: impl Fn(Vec3) -> f32) -> Option<Vec3> {
    points
        .iter()
        .copied()
        .map(|p| (p, metric(p)))
        .filter(|(_, m)| *m > 1e-9)
        .max_by(|x, y| x.1.total_cmp(&y.1))
        .map(|(p, _)| p)
}

#[inline]
fn to_vec3(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

#[inline]
fn to_quat(q: &UnitQuaternion<Real>) -> Quat {
    Quat::from_xyzw(q.i, q.j, q.k, q.w)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ModelRegistry {
        ModelRegistry::builtin().unwrap()
    }

    #[test]
    fn test_build_consumes_eleven_draws_per_die() {
        let world = PhysicsWorld::build_with(&registry(), 12345, 3, DieKind::D6).unwrap();
        assert_eq!(world.dice().len(), 3);
        assert_eq!(world.draws(), 33);
        assert_eq!(world.steps(), 0);
    }

    #[test]
    fn test_launch_draw_order() {
        let mut expected = SeedStream::new(4242);
        let draws: Vec<f32> = (0..11).map(|_| expected.next()).collect();

        let mut stream = SeedStream::new(4242);
        let launch = Launch::draw(&mut stream, 0);
        let reach_x = ARENA_HALF_X - SPAWN_MARGIN;
        assert!((launch.position.x - (-reach_x + 2.0 * reach_x * draws[0])).abs() < 1e-5);
        let lift = LAUNCH_MIN_LIFT + LAUNCH_LIFT_RANGE * draws[4];
        assert!((launch.velocity.z - lift).abs() < 1e-5);
        let ez = std::f32::consts::TAU * draws[10];
        assert!((launch.euler.z - ez).abs() < 1e-5);
    }

    #[test]
    fn test_spawn_inside_margin() {
        let world = PhysicsWorld::build_with(&registry(), 9, MAX_DICE, DieKind::D20).unwrap();
        for die in world.dice() {
            let p = die.launch.position;
            assert!(p.x.abs() <= ARENA_HALF_X - SPAWN_MARGIN);
            assert!(p.y.abs() <= ARENA_HALF_Y - SPAWN_MARGIN);
            assert!(p.z > 0.0 && p.z < ARENA_HEIGHT);
            assert!(die.launch.velocity.z >= LAUNCH_MIN_LIFT);
        }
    }

    #[test]
    fn test_collider_kinds_for_builtin_dice() {
        let reg = registry();
        for kind in DieKind::ALL {
            let (_, collider) = collider_for(reg.get(kind).unwrap());
            let expected = if kind == DieKind::D6 {
                ColliderKind::Cuboid
            } else {
                ColliderKind::ConvexHull
            };
            assert_eq!(collider, expected, "{kind}");
        }
    }

    #[test]
    fn test_flat_hull_falls_back_to_sphere() {
        let reg = registry();
        let mut model = reg.get(DieKind::D8).unwrap().clone();
        for v in &mut model.vertices {
            v.z = 0.0;
        }
        let (_, collider) = collider_for(&model);
        assert_eq!(collider, ColliderKind::BoundingSphere);
    }

    #[test]
    fn test_is_degenerate() {
        assert!(is_degenerate(&[Vec3::ZERO, Vec3::X, Vec3::Y]));
        assert!(is_degenerate(&[Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::new(1.0, 1.0, 0.0)]));
        assert!(is_degenerate(&[Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::NAN]));
        assert!(!is_degenerate(&[Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z]));
    }

    #[test]
    fn test_step_syncs_visuals() {
        let mut world = PhysicsWorld::build_with(&registry(), 5, 1, DieKind::D6).unwrap();
        let before = world.visuals()[0];
        world.step();
        let after = world.visuals()[0];
        assert_eq!(world.steps(), 1);
        assert_ne!(before.position, after.position);
    }

    #[test]
    fn test_identical_worlds_stay_identical() {
        let reg = registry();
        let mut a = PhysicsWorld::build_with(&reg, 777, 3, DieKind::D20).unwrap();
        let mut b = PhysicsWorld::build_with(&reg, 777, 3, DieKind::D20).unwrap();
        for _ in 0..240 {
            a.step();
            b.step();
        }
        for (x, y) in a.visuals().iter().zip(b.visuals().iter()) {
            assert_eq!(x.position.to_array().map(f32::to_bits), y.position.to_array().map(f32::to_bits));
            assert_eq!(x.rotation.to_array().map(f32::to_bits), y.rotation.to_array().map(f32::to_bits));
        }
    }

    #[test]
    fn test_dice_stay_in_arena() {
        let mut world = PhysicsWorld::build_with(&registry(), 31337, 6, DieKind::D8).unwrap();
        for _ in 0..300 {
            world.step();
        }
        for v in world.visuals() {
            assert!(v.position.x.abs() < ARENA_HALF_X + 0.5);
            assert!(v.position.y.abs() < ARENA_HALF_Y + 0.5);
            assert!(v.position.z > -0.5 && v.position.z < ARENA_HEIGHT + 0.5);
        }
    }

    #[test]
    fn test_freeze_stops_motion() {
        let mut world = PhysicsWorld::build_with(&registry(), 3, 2, DieKind::D6).unwrap();
        world.step();
        assert!(world.any_moving(0.01));
        world.freeze();
        assert!(!world.any_moving(0.0001));
    }
}
