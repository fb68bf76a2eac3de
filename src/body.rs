//! Bodies and fixtures: the teacher's flat-field `RigidBody` struct
//! generalized to own a fixture list (so a body can carry more than one
//! shape), a `Sweep` for TOI sub-stepping, and broad-phase proxy handles
//! per fixture child.

use crate::math::{Rot, Sweep, Transform, Vec2};
use crate::shapes::{MassData, Shape};

pub type BodyId = u32;
pub type FixtureId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyType {
    Static,
    Kinematic,
    Dynamic,
}

/// Construction parameters for a new body, mirroring the teacher's
/// `BodyDef`-by-field-literal convention (`Def { gravity: ..,
/// ..Default::default() }`) rather than a builder.
#[derive(Debug, Clone)]
pub struct BodyDef {
    pub body_type: BodyType,
    pub position: Vec2,
    pub angle: f32,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub gravity_scale: f32,
    pub fixed_rotation: bool,
    pub bullet: bool,
    pub allow_sleep: bool,
    pub awake: bool,
}

impl Default for BodyDef {
    fn default() -> Self {
        BodyDef {
            body_type: BodyType::Static,
            position: Vec2::ZERO,
            angle: 0.0,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            gravity_scale: 1.0,
            fixed_rotation: false,
            bullet: false,
            allow_sleep: true,
            awake: true,
        }
    }
}

/// Errors raised by `create_fixture` for malformed shape data — the one
/// place the spec asks for a structured rejection instead of a silent
/// `None`/no-op.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FixtureError {
    #[error("polygon vertex radius {radius} is out of range [{min}, {max}]")]
    VertexRadiusOutOfRange { radius: f32, min: f32, max: f32 },
    #[error("polygon has {count} vertices, exceeding the limit of {max}")]
    TooManyVertices { count: usize, max: usize },
    #[error("cannot create a fixture while the world is mid-step")]
    WorldLocked,
}

#[derive(Debug, Clone)]
pub struct FixtureDef {
    pub shape: Shape,
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
    pub is_sensor: bool,
    pub filter: Filter,
}

impl Default for FixtureDef {
    fn default() -> Self {
        FixtureDef {
            shape: Shape::circle(Vec2::ZERO, 0.5),
            density: 1.0,
            friction: 0.3,
            restitution: 0.0,
            is_sensor: false,
            filter: Filter::default(),
        }
    }
}

/// Collision filtering, directly mirroring the teacher's `layer`/`mask`
/// fields on `RigidBody` but scoped to the fixture, the way Box2D-style
/// engines attach filters to fixtures rather than whole bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filter {
    pub category_bits: u16,
    pub mask_bits: u16,
    pub group_index: i16,
}

impl Default for Filter {
    fn default() -> Self {
        Filter { category_bits: 0x0001, mask_bits: 0xFFFF, group_index: 0 }
    }
}

impl Filter {
    pub fn should_collide(a: &Filter, b: &Filter) -> bool {
        if a.group_index == b.group_index && a.group_index != 0 {
            return a.group_index > 0;
        }
        (a.mask_bits & b.category_bits) != 0 && (b.mask_bits & a.category_bits) != 0
    }
}

pub struct Fixture {
    pub id: FixtureId,
    pub body: BodyId,
    pub shape: Shape,
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
    pub is_sensor: bool,
    pub filter: Filter,
    /// One broad-phase proxy per shape child (chains have several).
    pub proxies: Vec<ProxyHandle>,
}

#[derive(Debug, Clone, Copy)]
pub struct ProxyHandle {
    pub tree_id: u32,
    pub child_index: usize,
}

pub struct Body {
    pub id: BodyId,
    pub body_type: BodyType,
    pub transform: Transform,
    pub sweep: Sweep,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
    pub force: Vec2,
    pub torque: f32,
    pub mass: f32,
    pub inv_mass: f32,
    pub inertia: f32,
    pub inv_inertia: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub gravity_scale: f32,
    pub fixed_rotation: bool,
    pub bullet: bool,
    pub allow_sleep: bool,
    pub awake: bool,
    pub sleep_time: f32,
    pub fixtures: Vec<FixtureId>,
    /// Set by `World::step` island building; not persisted across steps.
    pub island_index: Option<u32>,
}

impl Body {
    pub fn new(id: BodyId, def: &BodyDef) -> Self {
        let q = Rot::from_angle(def.angle);
        let transform = Transform::new(def.position, q);
        let mut sweep = Sweep::default();
        sweep.c0 = def.position;
        sweep.c1 = def.position;
        sweep.a0 = def.angle;
        sweep.a1 = def.angle;

        Body {
            id,
            body_type: def.body_type,
            transform,
            sweep,
            linear_velocity: def.linear_velocity,
            angular_velocity: def.angular_velocity,
            force: Vec2::ZERO,
            torque: 0.0,
            mass: 0.0,
            inv_mass: 0.0,
            inertia: 0.0,
            inv_inertia: 0.0,
            linear_damping: def.linear_damping,
            angular_damping: def.angular_damping,
            gravity_scale: def.gravity_scale,
            fixed_rotation: def.fixed_rotation,
            bullet: def.bullet,
            allow_sleep: def.allow_sleep,
            awake: def.awake || def.body_type != BodyType::Static,
            sleep_time: 0.0,
            fixtures: Vec::new(),
            island_index: None,
        }
    }

    pub fn is_static(&self) -> bool {
        self.body_type == BodyType::Static
    }

    /// Recomputes mass/center/inertia from the attached fixtures' mass
    /// data, shifting the sweep's center of mass the way Box2D's
    /// `b2Body::ResetMassData` re-anchors velocity about the new centroid.
    pub fn reset_mass_data(&mut self, fixtures: &[&Fixture]) {
        self.mass = 0.0;
        self.inv_mass = 0.0;
        self.inertia = 0.0;
        self.inv_inertia = 0.0;

        if self.body_type != BodyType::Dynamic {
            self.sweep.c0 = self.transform.p;
            self.sweep.c1 = self.transform.p;
            return;
        }

        let mut local_center = Vec2::ZERO;
        for fixture in fixtures {
            if fixture.density == 0.0 {
                continue;
            }
            let data = aggregate_mass_data(&fixture.shape, fixture.density);
            self.mass += data.mass;
            local_center += data.center * data.mass;
            self.inertia += data.inertia;
        }

        if self.mass > 0.0 {
            self.inv_mass = 1.0 / self.mass;
            local_center = local_center * self.inv_mass;
        } else {
            // Dynamic bodies still need a nonzero mass to integrate sensibly.
            self.mass = 1.0;
            self.inv_mass = 1.0;
        }

        if self.inertia > 0.0 && !self.fixed_rotation {
            // Parallel-axis shift from origin to the body's local center.
            self.inertia -= self.mass * local_center.dot(local_center);
            debug_assert!(self.inertia > 0.0);
            self.inv_inertia = 1.0 / self.inertia;
        } else {
            self.inertia = 0.0;
            self.inv_inertia = 0.0;
        }

        let old_center = self.sweep.c1;
        self.sweep.local_center = local_center;
        self.sweep.c1 = self.transform.transform_point(local_center);
        self.sweep.c0 = self.sweep.c1;

        self.linear_velocity += Vec2::scalar_cross(self.angular_velocity, self.sweep.c1 - old_center);
    }

    pub fn synchronize_transform(&mut self) {
        self.transform.q = Rot::from_angle(self.sweep.a1);
        self.transform.p = self.sweep.c1 - self.transform.q.mul_vec(self.sweep.local_center);
    }

    pub fn apply_force(&mut self, force: Vec2, point: Vec2, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.awake {
            self.set_awake(true);
        }
        if self.awake {
            self.force += force;
            self.torque += (point - self.sweep.c1).cross(force);
        }
    }

    pub fn apply_linear_impulse(&mut self, impulse: Vec2, point: Vec2, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.awake {
            self.set_awake(true);
        }
        if self.awake {
            self.linear_velocity += impulse * self.inv_mass;
            self.angular_velocity += self.inv_inertia * (point - self.sweep.c1).cross(impulse);
        }
    }

    pub fn set_awake(&mut self, awake: bool) {
        if self.body_type == BodyType::Static {
            return;
        }
        if awake {
            self.sleep_time = 0.0;
            self.awake = true;
        } else {
            self.awake = false;
            self.sleep_time = 0.0;
            self.linear_velocity = Vec2::ZERO;
            self.angular_velocity = 0.0;
            self.force = Vec2::ZERO;
            self.torque = 0.0;
        }
    }
}

fn aggregate_mass_data(shape: &Shape, density: f32) -> MassData {
    let mut total = MassData::default();
    for child in 0..shape.child_count().max(1) {
        let data = if matches!(shape, Shape::Chain { .. }) {
            shape.chain_edge(child).compute_mass_data(density)
        } else {
            shape.compute_mass_data(density)
        };
        total.mass += data.mass;
        total.center += data.center * data.mass;
        total.inertia += data.inertia;
    }
    if total.mass > 0.0 {
        total.center = total.center * (1.0 / total.mass);
    }
    total
}

fn validate_fixture_def(def: &FixtureDef) -> Result<(), FixtureError> {
    const MIN_RADIUS: f32 = 0.0;
    const MAX_RADIUS: f32 = 10.0;
    match &def.shape {
        Shape::Polygon { vertices, radius, .. } => {
            if vertices.len() > crate::shapes::MAX_POLYGON_VERTICES {
                return Err(FixtureError::TooManyVertices { count: vertices.len(), max: crate::shapes::MAX_POLYGON_VERTICES });
            }
            if *radius < MIN_RADIUS || *radius > MAX_RADIUS {
                return Err(FixtureError::VertexRadiusOutOfRange { radius: *radius, min: MIN_RADIUS, max: MAX_RADIUS });
            }
        }
        Shape::Circle { radius, .. } | Shape::Edge { radius, .. } | Shape::Chain { radius, .. } => {
            if *radius < MIN_RADIUS || *radius > MAX_RADIUS {
                return Err(FixtureError::VertexRadiusOutOfRange { radius: *radius, min: MIN_RADIUS, max: MAX_RADIUS });
            }
        }
    }
    Ok(())
}

/// Called by `World::create_fixture` before the fixture is allocated.
pub fn check_fixture_def(def: &FixtureDef) -> Result<(), FixtureError> {
    validate_fixture_def(def)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn static_body_has_zero_inverse_mass() {
        let def = BodyDef { body_type: BodyType::Static, ..Default::default() };
        let mut body = Body::new(0, &def);
        let fixture = Fixture {
            id: 0,
            body: 0,
            shape: Shape::boxed(1.0, 1.0),
            density: 1.0,
            friction: 0.3,
            restitution: 0.0,
            is_sensor: false,
            filter: Filter::default(),
            proxies: Vec::new(),
        };
        body.reset_mass_data(&[&fixture]);
        assert_eq!(body.inv_mass, 0.0);
        assert_eq!(body.inv_inertia, 0.0);
    }

    #[test]
    fn dynamic_body_sums_fixture_mass() {
        let def = BodyDef { body_type: BodyType::Dynamic, position: Vec2::new(2.0, 3.0), ..Default::default() };
        let mut body = Body::new(0, &def);
        let fixture = Fixture {
            id: 0,
            body: 0,
            shape: Shape::circle(Vec2::ZERO, 1.0),
            density: 2.0,
            friction: 0.3,
            restitution: 0.0,
            is_sensor: false,
            filter: Filter::default(),
            proxies: Vec::new(),
        };
        body.reset_mass_data(&[&fixture]);
        let expected_mass = 2.0 * std::f32::consts::PI * 1.0;
        assert_relative_eq!(body.mass, expected_mass, epsilon = 1e-4);
        assert!(body.inv_mass > 0.0);
    }

    #[test]
    fn off_center_fixture_still_yields_positive_inverse_inertia() {
        // A single fixture offset from the body's local origin used to drive
        // `inertia` negative here once `Shape::compute_mass_data` omitted its
        // own parallel-axis term, tripping the `inertia > 0.0` guard below
        // and silently leaving the body unable to rotate at all.
        let def = BodyDef { body_type: BodyType::Dynamic, ..Default::default() };
        let mut body = Body::new(0, &def);
        let fixture = Fixture {
            id: 0,
            body: 0,
            shape: Shape::circle(Vec2::new(2.0, 0.0), 1.0),
            density: 1.0,
            friction: 0.3,
            restitution: 0.0,
            is_sensor: false,
            filter: Filter::default(),
            proxies: Vec::new(),
        };
        body.reset_mass_data(&[&fixture]);
        assert!(body.inertia > 0.0);
        assert!(body.inv_inertia > 0.0);
    }

    #[test]
    fn rejects_polygon_with_radius_out_of_range() {
        let def = FixtureDef {
            shape: Shape::rounded_polygon(
                vec![Vec2::new(-1.0, -1.0), Vec2::new(1.0, -1.0), Vec2::new(0.0, 1.0)],
                50.0,
            )
            .unwrap(),
            ..Default::default()
        };
        assert!(check_fixture_def(&def).is_err());
    }

    #[test]
    fn filter_respects_negative_group_override() {
        let a = Filter { group_index: -5, ..Default::default() };
        let b = Filter { group_index: -5, ..Default::default() };
        assert!(!Filter::should_collide(&a, &b));
    }
}
