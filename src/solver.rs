//! Velocity and position contact solving: accumulated-impulse sequential
//! impulses with warm starting, a 2x2 block solve for two-point manifolds,
//! and Baumgarte position correction.
//!
//! Grounded on the teacher's `resolve.rs` (`resolve_single_accumulated`,
//! `position_correction`) generalized from a flat `(f32, f32)` contact
//! struct with one normal-only point to the full `Contact`/`ManifoldPoint`
//! model with up to two points and per-point feature-keyed impulses, plus
//! the 2x2 block solve `box2d-lite-rs`'s arbiter never needed (it only
//! ever tracks independent per-point impulses) but spec §4.8 requires for
//! correlated two-point manifolds.

use std::collections::HashMap;

use crate::body::{Body, BodyId, BodyType};
use crate::contact::Contact;
use crate::manifold::{self, WorldPoint};
use crate::math::{Mat22, Vec2};

pub const LINEAR_SLOP: f32 = 0.005;
pub const MAX_LINEAR_CORRECTION: f32 = 0.2;
/// Baumgarte factor for the ordinary (non-TOI) position-correction pass.
pub const BAUMGARTE: f32 = 0.2;
/// A stiffer factor used when resolving TOI events, so tunneling doesn't
/// reopen on the next sub-step (spec §4.9's "TOI position solve runs at a
/// different correction rate than the main position solve").
pub const TOI_BAUMGARTE: f32 = 0.75;

pub(crate) struct VelocityConstraint {
    body_a: BodyId,
    body_b: BodyId,
    normal: Vec2,
    friction: f32,
    restitution: f32,
    points: Vec<VelocityConstraintPoint>,
}

struct VelocityConstraintPoint {
    ra: Vec2,
    rb: Vec2,
    normal_mass: f32,
    tangent_mass: f32,
    velocity_bias: f32,
    normal_impulse: f32,
    tangent_impulse: f32,
}

/// Precomputes effective masses, the fixed tangent direction, and the
/// restitution bias once per step — mirroring the teacher's
/// `initialize_contacts`, which must run once before warm starting and any
/// velocity iterations.
pub fn initialize_velocity_constraints(contacts: &mut [&mut Contact], bodies: &HashMap<BodyId, Body>, restitution_threshold: f32) -> Vec<VelocityConstraint> {
    let mut constraints = Vec::with_capacity(contacts.len());

    for contact in contacts.iter_mut() {
        let (Some(a), Some(b)) = (bodies.get(&contact.body_a), bodies.get(&contact.body_b)) else { continue };
        if contact.manifold.points.is_empty() {
            continue;
        }

        let radius_a = 0.0;
        let radius_b = 0.0;
        let (normal, world_points) = manifold::world_manifold(&contact.manifold, a.transform, radius_a, b.transform, radius_b);
        if world_points.is_empty() {
            continue;
        }

        let tangent = normal.perp();
        let mut points = Vec::with_capacity(world_points.len());

        for (i, wp) in world_points.iter().enumerate().take(contact.points.len()) {
            let ra = wp.point - a.sweep.c1;
            let rb = wp.point - b.sweep.c1;

            let rn_a = ra.cross(normal);
            let rn_b = rb.cross(normal);
            let k_normal = inv_mass(a) + inv_mass(b) + inv_inertia(a) * rn_a * rn_a + inv_inertia(b) * rn_b * rn_b;
            let normal_mass = if k_normal > 0.0 { 1.0 / k_normal } else { 0.0 };

            let rt_a = ra.cross(tangent);
            let rt_b = rb.cross(tangent);
            let k_tangent = inv_mass(a) + inv_mass(b) + inv_inertia(a) * rt_a * rt_a + inv_inertia(b) * rt_b * rt_b;
            let tangent_mass = if k_tangent > 0.0 { 1.0 / k_tangent } else { 0.0 };

            let rel_vel = relative_velocity(a, b, ra, rb);
            let vn = rel_vel.dot(normal);
            let e = if -vn < restitution_threshold { 0.0 } else { contact.restitution };
            let velocity_bias = e * (-vn).max(0.0);

            points.push(VelocityConstraintPoint {
                ra,
                rb,
                normal_mass,
                tangent_mass,
                velocity_bias,
                normal_impulse: contact.points[i].normal_impulse,
                tangent_impulse: contact.points[i].tangent_impulse,
            });
        }

        constraints.push(VelocityConstraint {
            body_a: contact.body_a,
            body_b: contact.body_b,
            normal,
            friction: contact.friction,
            restitution: contact.restitution,
            points,
        });
    }

    constraints
}

fn inv_mass(b: &Body) -> f32 {
    if b.body_type == BodyType::Dynamic { b.inv_mass } else { 0.0 }
}

fn inv_inertia(b: &Body) -> f32 {
    if b.body_type == BodyType::Dynamic { b.inv_inertia } else { 0.0 }
}

fn relative_velocity(a: &Body, b: &Body, ra: Vec2, rb: Vec2) -> Vec2 {
    (b.linear_velocity + Vec2::scalar_cross(b.angular_velocity, rb)) - (a.linear_velocity + Vec2::scalar_cross(a.angular_velocity, ra))
}

/// Applies each constraint's currently-accumulated impulse before any
/// velocity iterations run, giving the solver a head start — the teacher's
/// `warm_start_contacts`, generalized to per-point tangent directions.
pub fn warm_start(constraints: &[VelocityConstraint], bodies: &mut HashMap<BodyId, Body>) {
    for c in constraints {
        let tangent = c.normal.perp();
        for p in &c.points {
            let impulse = c.normal * p.normal_impulse + tangent * p.tangent_impulse;
            apply_impulse_pair(bodies, c.body_a, c.body_b, p.ra, p.rb, impulse);
        }
    }
}

fn apply_impulse_pair(bodies: &mut HashMap<BodyId, Body>, id_a: BodyId, id_b: BodyId, ra: Vec2, rb: Vec2, impulse: Vec2) {
    if let Some(a) = bodies.get_mut(&id_a) {
        if a.body_type == BodyType::Dynamic {
            a.linear_velocity -= impulse * a.inv_mass;
            a.angular_velocity -= a.inv_inertia * ra.cross(impulse);
        }
    }
    if let Some(b) = bodies.get_mut(&id_b) {
        if b.body_type == BodyType::Dynamic {
            b.linear_velocity += impulse * b.inv_mass;
            b.angular_velocity += b.inv_inertia * rb.cross(impulse);
        }
    }
}

/// One Gauss-Seidel velocity iteration over every constraint: friction
/// first per the teacher's ordering note (recompute relative velocity
/// after the normal impulse changes it), normal impulse accumulated and
/// clamped non-negative, and — when a manifold has two points — a 2x2
/// block solve so the points don't fight each other the way two
/// sequential single-point solves would.
pub fn solve_velocity_constraints(constraints: &mut [VelocityConstraint], bodies: &mut HashMap<BodyId, Body>) {
    for c in constraints.iter_mut() {
        let tangent = c.normal.perp();

        for p in c.points.iter_mut() {
            let (Some(a), Some(b)) = (bodies.get(&c.body_a), bodies.get(&c.body_b)) else { continue };
            let rel_vel = relative_velocity(a, b, p.ra, p.rb);
            let vt = rel_vel.dot(tangent);
            let mut lambda = -p.tangent_mass * vt;

            let max_friction = c.friction * p.normal_impulse;
            let old = p.tangent_impulse;
            p.tangent_impulse = (old + lambda).clamp(-max_friction, max_friction);
            lambda = p.tangent_impulse - old;

            let impulse = tangent * lambda;
            apply_impulse_pair(bodies, c.body_a, c.body_b, p.ra, p.rb, impulse);
        }

        if c.points.len() == 1 {
            let p = &mut c.points[0];
            let (Some(a), Some(b)) = (bodies.get(&c.body_a), bodies.get(&c.body_b)) else { continue };
            let rel_vel = relative_velocity(a, b, p.ra, p.rb);
            let vn = rel_vel.dot(c.normal);
            let mut lambda = -p.normal_mass * (vn - p.velocity_bias);
            let old = p.normal_impulse;
            p.normal_impulse = (old + lambda).max(0.0);
            lambda = p.normal_impulse - old;
            let impulse = c.normal * lambda;
            apply_impulse_pair(bodies, c.body_a, c.body_b, p.ra, p.rb, impulse);
        } else if c.points.len() == 2 {
            solve_two_point_block(c, bodies);
        }
    }
}

/// Solves both normal impulses simultaneously via the 2x2 effective mass
/// matrix between the two points, the standard Box2D block solver used
/// when a single sequential pass would let one point's correction disturb
/// the other (e.g. a box resting flat with both corners in contact).
fn solve_two_point_block(c: &mut VelocityConstraint, bodies: &mut HashMap<BodyId, Body>) {
    let (Some(a), Some(b)) = (bodies.get(&c.body_a), bodies.get(&c.body_b)) else { return };

    let inv_ma = inv_mass(a);
    let inv_mb = inv_mass(b);
    let inv_ia = inv_inertia(a);
    let inv_ib = inv_inertia(b);

    let ra1 = c.points[0].ra;
    let rb1 = c.points[0].rb;
    let ra2 = c.points[1].ra;
    let rb2 = c.points[1].rb;
    let normal = c.normal;

    let rn1a = ra1.cross(normal);
    let rn1b = rb1.cross(normal);
    let rn2a = ra2.cross(normal);
    let rn2b = rb2.cross(normal);

    let k11 = inv_ma + inv_mb + inv_ia * rn1a * rn1a + inv_ib * rn1b * rn1b;
    let k22 = inv_ma + inv_mb + inv_ia * rn2a * rn2a + inv_ib * rn2b * rn2b;
    let k12 = inv_ma + inv_mb + inv_ia * rn1a * rn2a + inv_ib * rn1b * rn2b;

    // Ill-conditioned when k12 is close to k11/k22 (nearly parallel
    // contact normals at both points): fall back to independent solves.
    if k11 * k11 < 1000.0 * (k11 * k22 - k12 * k12).max(0.0) {
        let k = Mat22::from_cols(k11, k12, k12, k22);

        let v1 = relative_velocity(a, b, ra1, rb1).dot(normal) - c.points[0].velocity_bias;
        let v2 = relative_velocity(a, b, ra2, rb2).dot(normal) - c.points[1].velocity_bias;

        let a_old = Vec2::new(c.points[0].normal_impulse, c.points[1].normal_impulse);
        let b_vec = Vec2::new(v1, v2) + k.mul_vec(a_old) * -1.0;

        let mut x = k.solve(-b_vec);
        x = x.max(Vec2::ZERO);

        let d = x - a_old;
        c.points[0].normal_impulse = x.x;
        c.points[1].normal_impulse = x.y;

        let p1 = normal * d.x;
        let p2 = normal * d.y;
        apply_impulse_pair(bodies, c.body_a, c.body_b, ra1, rb1, p1);
        apply_impulse_pair(bodies, c.body_a, c.body_b, ra2, rb2, p2);
    } else {
        for i in 0..2 {
            let (Some(a), Some(b)) = (bodies.get(&c.body_a), bodies.get(&c.body_b)) else { continue };
            let p = &mut c.points[i];
            let rel_vel = relative_velocity(a, b, p.ra, p.rb);
            let vn = rel_vel.dot(normal);
            let mut lambda = -p.normal_mass * (vn - p.velocity_bias);
            let old = p.normal_impulse;
            p.normal_impulse = (old + lambda).max(0.0);
            lambda = p.normal_impulse - old;
            let impulse = normal * lambda;
            apply_impulse_pair(bodies, c.body_a, c.body_b, p.ra, p.rb, impulse);
        }
    }
}

/// Writes each constraint's final accumulated impulses back into the
/// `Contact` so next frame's warm start can find them.
pub fn store_impulses(constraints: &[VelocityConstraint], contacts: &mut [&mut Contact]) {
    for (constraint, contact) in constraints.iter().zip(contacts.iter_mut()) {
        for (i, p) in constraint.points.iter().enumerate().take(contact.points.len()) {
            contact.points[i].normal_impulse = p.normal_impulse;
            contact.points[i].tangent_impulse = p.tangent_impulse;
        }
    }
}

/// Non-linear Gauss-Seidel position correction: re-derives separation from
/// current sweeps (not the cached manifold) each iteration, nudging bodies
/// apart by `baumgarte` of the penetration past `LINEAR_SLOP`. `baumgarte`
/// is a parameter (rather than always `BAUMGARTE`) so TOI resolution can
/// push harder per spec §4.9.
pub fn solve_position_constraints(contacts: &[&Contact], bodies: &mut HashMap<BodyId, Body>, shapes: &HashMap<crate::body::FixtureId, crate::shapes::Shape>, baumgarte: f32) -> f32 {
    let mut max_error = 0.0f32;

    for contact in contacts {
        let (Some(shape_a), Some(shape_b)) = (shapes.get(&contact.fixture_a), shapes.get(&contact.fixture_b)) else { continue };
        let (a_transform, b_transform) = {
            let (Some(a), Some(b)) = (bodies.get(&contact.body_a), bodies.get(&contact.body_b)) else { continue };
            (a.transform, b.transform)
        };

        let shape_a = child_shape(shape_a, contact.child_a);
        let shape_b = child_shape(shape_b, contact.child_b);
        let manifold = manifold::collide(&shape_a, a_transform, &shape_b, b_transform);
        let (normal, world_points) = manifold::world_manifold(&manifold, a_transform, 0.0, b_transform, 0.0);
        if world_points.is_empty() {
            continue;
        }

        for wp in &world_points {
            max_error = max_error.min(wp.separation);
        }

        let (inv_ma, inv_ia) = {
            let a = bodies.get(&contact.body_a).unwrap();
            (inv_mass(a), inv_inertia(a))
        };
        let (inv_mb, inv_ib) = {
            let b = bodies.get(&contact.body_b).unwrap();
            (inv_mass(b), inv_inertia(b))
        };
        if inv_ma + inv_mb == 0.0 {
            continue;
        }

        for wp in &world_points {
            let c = (wp.separation + LINEAR_SLOP).min(0.0);
            if c >= 0.0 {
                continue;
            }
            let correction = (baumgarte * c).clamp(-MAX_LINEAR_CORRECTION, 0.0);

            let (a_c, b_c) = {
                let a = bodies.get(&contact.body_a).unwrap();
                let b = bodies.get(&contact.body_b).unwrap();
                (a.sweep.c1, b.sweep.c1)
            };
            let ra = wp.point - a_c;
            let rb = wp.point - b_c;

            let rn_a = ra.cross(normal);
            let rn_b = rb.cross(normal);
            let k = inv_ma + inv_mb + inv_ia * rn_a * rn_a + inv_ib * rn_b * rn_b;
            if k <= 0.0 {
                continue;
            }
            let impulse = -correction / k;
            let p = normal * impulse;

            if let Some(a) = bodies.get_mut(&contact.body_a) {
                if a.body_type == BodyType::Dynamic {
                    a.sweep.c1 -= p * inv_ma;
                    a.sweep.a1 -= inv_ia * ra.cross(p);
                    a.synchronize_transform();
                }
            }
            if let Some(b) = bodies.get_mut(&contact.body_b) {
                if b.body_type == BodyType::Dynamic {
                    b.sweep.c1 += p * inv_mb;
                    b.sweep.a1 += inv_ib * rb.cross(p);
                    b.synchronize_transform();
                }
            }
        }
    }

    max_error
}

fn child_shape(shape: &crate::shapes::Shape, child: usize) -> crate::shapes::Shape {
    match shape {
        crate::shapes::Shape::Chain { .. } => shape.chain_edge(child),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{BodyDef, BodyType as BT};
    use crate::manifold::{Manifold, ManifoldKind, ManifoldPoint, ContactFeature};

    fn resting_bodies() -> HashMap<BodyId, Body> {
        let mut bodies = HashMap::new();
        let ground = Body::new(0, &BodyDef { body_type: BT::Static, ..Default::default() });
        let mut falling = Body::new(1, &BodyDef { body_type: BT::Dynamic, position: Vec2::new(0.0, 0.95), ..Default::default() });
        falling.mass = 1.0;
        falling.inv_mass = 1.0;
        falling.inertia = 1.0;
        falling.inv_inertia = 1.0;
        falling.linear_velocity = Vec2::new(0.0, -5.0);
        bodies.insert(0, ground);
        bodies.insert(1, falling);
        bodies
    }

    #[test]
    fn normal_impulse_removes_approach_velocity() {
        let mut bodies = resting_bodies();
        let mut contact = Contact {
            fixture_a: 0,
            fixture_b: 1,
            body_a: 0,
            body_b: 1,
            child_a: 0,
            child_b: 0,
            friction: 0.3,
            restitution: 0.0,
            manifold: Manifold {
                kind: ManifoldKind::FaceA,
                local_normal: Vec2::new(0.0, 1.0),
                local_point: Vec2::ZERO,
                points: smallvec::smallvec![ManifoldPoint { local_point: Vec2::new(0.0, -0.05), separation: -0.05, feature: ContactFeature::default() }],
            },
            points: Default::default(),
            touching: true,
            enabled: true,
            is_sensor: false,
            island_index: None,
        };

        let mut refs = vec![&mut contact];
        let mut constraints = initialize_velocity_constraints(&mut refs, &bodies, 1.0);
        warm_start(&constraints, &mut bodies);
        for _ in 0..8 {
            solve_velocity_constraints(&mut constraints, &mut bodies);
        }

        assert!(bodies[&1].linear_velocity.y > -5.0);
    }
}
