//! `World`: owns every body, fixture, and joint, and drives the fixed-step
//! orchestration (broad phase -> narrow phase -> island solve -> TOI ->
//! sleep) the teacher's `PhysicsWorld::sub_step` performs directly on a
//! flat body array, generalized here to islands, joints, and continuous
//! collision per spec §4.10.

use std::collections::HashMap;

use crate::body::{Body, BodyDef, BodyId, Fixture, FixtureDef, FixtureError, FixtureId};
use crate::broadphase::BroadPhase;
use crate::contact::{Contact, ContactManager};
use crate::island::{self, Island};
use crate::joints::Joint;
use crate::math::{Aabb, Transform, Vec2};
use crate::shapes::Shape;
use crate::solver;
use crate::toi::{self, TimeOfImpactState};

/// World-construction parameters, mirroring the teacher's
/// `PhysicsWorld::new(gravity_x, gravity_y)` but expanded to a field-literal
/// `Def` the way `BodyDef`/`FixtureDef` are constructed elsewhere.
#[derive(Debug, Clone, Copy)]
pub struct Def {
    pub gravity: Vec2,
    pub linear_slop: f32,
    pub angular_slop: f32,
    pub max_vertex_radius: f32,
}

impl Default for Def {
    fn default() -> Self {
        Def {
            gravity: Vec2::new(0.0, -9.8),
            linear_slop: 0.005,
            angular_slop: 2.0 * std::f32::consts::PI / 180.0,
            max_vertex_radius: 255.0,
        }
    }
}

/// Per-step tuning, mirroring the teacher's hardcoded `solver_iterations`
/// constant, expanded into every knob spec §6 names.
#[derive(Debug, Clone, Copy)]
pub struct StepConf {
    pub dt: f32,
    pub dt_ratio: f32,
    pub reg_velocity_iterations: u32,
    pub reg_position_iterations: u32,
    pub toi_velocity_iterations: u32,
    pub toi_position_iterations: u32,
    pub max_sub_steps: u32,
    pub max_toi_root_iter_count: u32,
    pub max_toi_iterations: u32,
    pub velocity_threshold: f32,
    pub max_translation: f32,
    pub max_rotation: f32,
    pub max_linear_correction: f32,
    pub max_angular_correction: f32,
    pub reg_resolution_rate: f32,
    pub toi_resolution_rate: f32,
    pub do_warm_start: bool,
    pub do_toi: bool,
    pub min_still_time_to_sleep: f32,
}

impl Default for StepConf {
    fn default() -> Self {
        StepConf {
            dt: 1.0 / 60.0,
            dt_ratio: 1.0,
            reg_velocity_iterations: 8,
            reg_position_iterations: 3,
            toi_velocity_iterations: 8,
            toi_position_iterations: 20,
            max_sub_steps: 48,
            max_toi_root_iter_count: 50,
            max_toi_iterations: 4,
            velocity_threshold: 0.8,
            max_translation: 4.0,
            max_rotation: std::f32::consts::FRAC_PI_2,
            max_linear_correction: solver::MAX_LINEAR_CORRECTION,
            max_angular_correction: 8.0 * (2.0 * std::f32::consts::PI / 180.0),
            reg_resolution_rate: solver::BAUMGARTE,
            toi_resolution_rate: solver::TOI_BAUMGARTE,
            do_warm_start: true,
            do_toi: true,
            min_still_time_to_sleep: crate::sleep::SLEEP_TIME_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PreStats {
    pub ignored: u32,
    pub destroyed: u32,
    pub updated: u32,
    pub added: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RegStats {
    pub islands_found: u32,
    pub islands_solved: u32,
    pub contacts_added: u32,
    pub bodies_slept: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ToiStats {
    pub islands_found: u32,
    pub contacts_checked: u32,
    pub contacts_added: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StepStats {
    pub pre: PreStats,
    pub reg: RegStats,
    pub toi: ToiStats,
}

/// Transition and solve hooks invoked synchronously during `step`, with the
/// world locked — mirroring the teacher's `Box<dyn FnMut>` callback in
/// `platform/window.rs`. Every method has a no-op default so callers only
/// override what they need.
pub trait ContactListener {
    fn begin_contact(&mut self, _fixture_a: FixtureId, _fixture_b: FixtureId) {}
    fn end_contact(&mut self, _fixture_a: FixtureId, _fixture_b: FixtureId) {}
    fn pre_solve(&mut self, _fixture_a: FixtureId, _fixture_b: FixtureId) {}
    fn post_solve(&mut self, _fixture_a: FixtureId, _fixture_b: FixtureId, _normal_impulse: f32, _tangent_impulse: f32) {}
}

/// Called once per candidate broad-phase pair before a contact is created;
/// returning `false` suppresses the pair entirely.
pub trait ShouldCollideFilter {
    fn should_collide(&self, fixture_a: &Fixture, fixture_b: &Fixture) -> bool;
}

pub enum RayCastAction {
    Stop,
    Continue,
    /// Clip the ray to this fraction of its original length and keep going.
    Clip(f32),
}

pub enum QueryAction {
    Stop,
    Continue,
}

pub struct World {
    pub gravity: Vec2,
    linear_slop: f32,
    max_vertex_radius: f32,

    bodies: HashMap<BodyId, Body>,
    next_body_id: BodyId,
    fixtures: HashMap<FixtureId, Fixture>,
    next_fixture_id: FixtureId,
    joints: Vec<Joint>,

    broad_phase: BroadPhase,
    proxy_owner: HashMap<u32, (FixtureId, usize)>,
    contacts: ContactManager,

    locked: bool,
    new_fixture: bool,
    inv_dt: f32,

    pub contact_listener: Option<Box<dyn ContactListener>>,
    pub should_collide_filter: Option<Box<dyn ShouldCollideFilter>>,
}

impl World {
    pub fn new(def: Def) -> Self {
        World {
            gravity: def.gravity,
            linear_slop: def.linear_slop,
            max_vertex_radius: def.max_vertex_radius,
            bodies: HashMap::new(),
            next_body_id: 0,
            fixtures: HashMap::new(),
            next_fixture_id: 0,
            joints: Vec::new(),
            broad_phase: BroadPhase::new(),
            proxy_owner: HashMap::new(),
            contacts: ContactManager::new(),
            locked: false,
            new_fixture: false,
            inv_dt: 0.0,
            contact_listener: None,
            should_collide_filter: None,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Returns `None` (a no-op) instead of creating a body while the world
    /// is locked, per spec §4.11.
    pub fn create_body(&mut self, def: &BodyDef) -> Option<BodyId> {
        if self.locked {
            return None;
        }
        let id = self.next_body_id;
        self.next_body_id += 1;
        self.bodies.insert(id, Body::new(id, def));
        Some(id)
    }

    pub fn destroy_body(&mut self, id: BodyId) {
        if self.locked {
            return;
        }
        let Some(body) = self.bodies.remove(&id) else { return };
        for fixture_id in body.fixtures.clone() {
            self.destroy_fixture_unchecked(fixture_id);
        }
        self.joints.retain(|j| {
            let (a, b) = j.bodies();
            a != Some(id) && b != id
        });
        self.contacts.remove_body(id);
    }

    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.get(&id)
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.bodies.get_mut(&id)
    }

    pub fn create_fixture(&mut self, body_id: BodyId, def: FixtureDef) -> Result<FixtureId, FixtureError> {
        if self.locked {
            return Err(FixtureError::WorldLocked);
        }
        crate::body::check_fixture_def(&def)?;
        if def.shape.vertex_radius() > self.max_vertex_radius {
            return Err(FixtureError::VertexRadiusOutOfRange { radius: def.shape.vertex_radius(), min: 0.0, max: self.max_vertex_radius });
        }

        let id = self.next_fixture_id;
        self.next_fixture_id += 1;

        let transform = self.bodies.get(&body_id).map(|b| b.transform).unwrap_or(Transform::IDENTITY);
        let mut fixture = Fixture {
            id,
            body: body_id,
            shape: def.shape,
            density: def.density,
            friction: def.friction,
            restitution: def.restitution,
            is_sensor: def.is_sensor,
            filter: def.filter,
            proxies: Vec::new(),
        };

        let child_count = fixture.shape.child_count().max(1);
        for child in 0..child_count {
            let aabb = fixture.shape.compute_aabb(transform, child);
            let tree_id = self.broad_phase.create_proxy(aabb, id);
            self.proxy_owner.insert(tree_id, (id, child));
            fixture.proxies.push(crate::body::ProxyHandle { tree_id, child_index: child });
        }

        self.fixtures.insert(id, fixture);
        if let Some(body) = self.bodies.get_mut(&body_id) {
            body.fixtures.push(id);
        }

        self.recompute_body_mass(body_id);
        self.new_fixture = true;
        Ok(id)
    }

    fn recompute_body_mass(&mut self, body_id: BodyId) {
        let Some(body) = self.bodies.get(&body_id) else { return };
        let fixture_ids = body.fixtures.clone();
        let refs: Vec<&Fixture> = fixture_ids.iter().filter_map(|id| self.fixtures.get(id)).collect();
        if let Some(body) = self.bodies.get_mut(&body_id) {
            body.reset_mass_data(&refs);
        }
    }

    pub fn destroy_fixture(&mut self, id: FixtureId) {
        if self.locked {
            return;
        }
        self.destroy_fixture_unchecked(id);
    }

    fn destroy_fixture_unchecked(&mut self, id: FixtureId) {
        let Some(fixture) = self.fixtures.remove(&id) else { return };
        for proxy in &fixture.proxies {
            self.broad_phase.destroy_proxy(proxy.tree_id);
            self.proxy_owner.remove(&proxy.tree_id);
        }
        self.contacts.remove_fixture(id);
        if let Some(body) = self.bodies.get_mut(&fixture.body) {
            body.fixtures.retain(|&f| f != id);
        }
        self.recompute_body_mass(fixture.body);
    }

    pub fn fixture(&self, id: FixtureId) -> Option<&Fixture> {
        self.fixtures.get(&id)
    }

    pub fn create_joint(&mut self, joint: Joint) -> Option<usize> {
        if self.locked {
            return None;
        }
        let (a, b) = joint.bodies();
        if let Some(a) = a {
            self.bodies.get_mut(&a)?.set_awake(true);
        }
        self.bodies.get_mut(&b)?.set_awake(true);
        self.joints.push(joint);
        Some(self.joints.len() - 1)
    }

    pub fn destroy_joint(&mut self, index: usize) {
        if self.locked || index >= self.joints.len() {
            return;
        }
        self.joints.remove(index);
    }

    pub fn apply_force(&mut self, id: BodyId, force: Vec2, point: Vec2, wake: bool) {
        if let Some(body) = self.bodies.get_mut(&id) {
            body.apply_force(force, point, wake);
        }
    }

    pub fn apply_linear_impulse(&mut self, id: BodyId, impulse: Vec2, point: Vec2, wake: bool) {
        if let Some(body) = self.bodies.get_mut(&id) {
            body.apply_linear_impulse(impulse, point, wake);
        }
    }

    pub fn query_aabb(&self, aabb: Aabb, mut visit: impl FnMut(FixtureId) -> QueryAction) {
        self.broad_phase.tree.query(aabb, |proxy_id| {
            let Some(&(fixture_id, _)) = self.proxy_owner.get(&proxy_id) else { return true };
            !matches!(visit(fixture_id), QueryAction::Stop)
        });
    }

    pub fn ray_cast(&self, p1: Vec2, p2: Vec2, mut visit: impl FnMut(FixtureId, Vec2, Vec2, f32) -> RayCastAction) {
        let mut max_fraction = 1.0f32;
        let ray_aabb = Aabb { lower: p1.min(p2), upper: p1.max(p2) };

        self.broad_phase.tree.query(ray_aabb, |proxy_id| {
            let Some(&(fixture_id, child)) = self.proxy_owner.get(&proxy_id) else { return true };
            let Some(fixture) = self.fixtures.get(&fixture_id) else { return true };
            let Some(body) = self.bodies.get(&fixture.body) else { return true };

            let local_p1 = body.transform.inv_transform_point(p1);
            let local_p2 = body.transform.inv_transform_point(p2);
            let child_shape = child_shape(&fixture.shape, child);

            if let Some(hit) = child_shape.ray_cast(local_p1, local_p2, max_fraction, 0) {
                let world_point = p1.lerp(p2, hit.fraction);
                let world_normal = body.transform.q.mul_vec(hit.normal);
                match visit(fixture_id, world_point, world_normal, hit.fraction) {
                    RayCastAction::Stop => return false,
                    RayCastAction::Clip(f) => max_fraction = max_fraction.min(f),
                    RayCastAction::Continue => {}
                }
            }
            true
        });
    }

    fn find_new_contacts(&mut self) {
        for (proxy_a, proxy_b) in self.broad_phase.find_new_pairs() {
            let (Some(&(fa, ca)), Some(&(fb, cb))) = (self.proxy_owner.get(&proxy_a), self.proxy_owner.get(&proxy_b)) else { continue };
            let (Some(fixture_a), Some(fixture_b)) = (self.fixtures.get(&fa), self.fixtures.get(&fb)) else { continue };
            if let Some(filter) = &self.should_collide_filter {
                if !filter.should_collide(fixture_a, fixture_b) {
                    continue;
                }
            }
            let (Some(body_a), Some(body_b)) = (self.bodies.get(&fixture_a.body), self.bodies.get(&fixture_b.body)) else { continue };
            self.contacts.add_pair(fixture_a, ca, fixture_b, cb, body_a, body_b);
        }
    }

    /// Runs one fixed-size `dt` step per spec §4.10: narrow-phase refresh,
    /// regular island solve, optional TOI sub-stepping, then sleep
    /// management.
    pub fn step(&mut self, conf: &StepConf) -> StepStats {
        let mut stats = StepStats::default();

        if self.new_fixture {
            self.find_new_contacts();
            self.new_fixture = false;
        }

        self.locked = true;

        let transitions = self.contacts.collide(&self.fixtures, &self.bodies, conf.do_warm_start);
        for &(fa, fb, touching) in &transitions {
            if touching {
                stats.pre.added += 1;
                if let Some(listener) = &mut self.contact_listener {
                    listener.begin_contact(fa, fb);
                }
            } else {
                stats.pre.destroyed += 1;
                if let Some(listener) = &mut self.contact_listener {
                    listener.end_contact(fa, fb);
                }
            }
        }

        if conf.dt > 0.0 {
            self.solve(conf, &mut stats);
        }

        if conf.dt > 0.0 && conf.do_toi {
            self.solve_toi(conf, &mut stats);
        }

        self.update_sleep(conf);

        self.inv_dt = if conf.dt > 0.0 { 1.0 / conf.dt } else { 0.0 };
        self.locked = false;

        log::debug!(
            "step: islands={} contacts_added={} toi_islands={}",
            stats.reg.islands_found,
            stats.pre.added,
            stats.toi.islands_found
        );

        stats
    }

    fn integrate_velocities(&mut self, dt: f32) {
        for body in self.bodies.values_mut() {
            if body.body_type != crate::body::BodyType::Dynamic || !body.awake {
                continue;
            }
            let gravity_accel = self.gravity * body.gravity_scale;
            body.linear_velocity += (gravity_accel + body.force * body.inv_mass) * dt;
            body.angular_velocity += body.torque * body.inv_inertia * dt;
            body.linear_velocity = body.linear_velocity * (1.0 / (1.0 + dt * body.linear_damping));
            body.angular_velocity *= 1.0 / (1.0 + dt * body.angular_damping);
            body.force = Vec2::ZERO;
            body.torque = 0.0;
        }
    }

    fn solve(&mut self, conf: &StepConf, stats: &mut StepStats) {
        self.integrate_velocities(conf.dt);

        let contact_list: Vec<&Contact> = self.contacts.contacts().filter(|c| c.touching && c.enabled && !c.is_sensor).collect();
        let joint_list: Vec<(usize, &Joint)> = self.joints.iter().enumerate().collect();
        let islands = island::build_islands(&self.bodies, &contact_list, &joint_list);
        stats.reg.islands_found = islands.len() as u32;

        let island_keys: Vec<Vec<(FixtureId, FixtureId)>> = islands
            .iter()
            .map(|isl| isl.contact_indices.iter().map(|&i| (contact_list[i].fixture_a, contact_list[i].fixture_b)).collect())
            .collect();
        let island_joint_idx: Vec<Vec<usize>> = islands.iter().map(|isl| isl.joint_indices.clone()).collect();
        let island_bodies: Vec<Vec<BodyId>> = islands.iter().map(|isl| isl.bodies.clone()).collect();

        for ((keys, joint_idx), body_ids) in island_keys.iter().zip(island_joint_idx.iter()).zip(island_bodies.iter()) {
            self.solve_island(conf, keys, joint_idx, body_ids);
            stats.reg.islands_solved += 1;
        }
    }

    fn solve_island(&mut self, conf: &StepConf, keys: &[(FixtureId, FixtureId)], joint_indices: &[usize], body_ids: &[BodyId]) {
        let mut owned_contacts: Vec<Contact> = self.contacts.take_many(keys);
        let mut contacts: Vec<&mut Contact> = owned_contacts.iter_mut().collect();

        let mut constraints = solver::initialize_velocity_constraints(&mut contacts, &self.bodies, conf.velocity_threshold);
        if conf.do_warm_start {
            solver::warm_start(&constraints, &mut self.bodies);
        }

        for _ in 0..conf.reg_velocity_iterations {
            solver::solve_velocity_constraints(&mut constraints, &mut self.bodies);
            for &idx in joint_indices {
                solve_joint_velocity(&mut self.joints[idx], &mut self.bodies, conf.dt);
            }
        }
        solver::store_impulses(&constraints, &mut contacts);
        drop(contacts);
        self.contacts.put_back(owned_contacts);

        self.integrate_positions(body_ids, conf);

        // Looked up by field path (not a `&self` helper method) so the
        // borrow checker sees this touching only `self.contacts`, leaving
        // `self.bodies` free to borrow mutably in the same loop.
        let shapes: HashMap<FixtureId, Shape> = self.fixtures.iter().map(|(&id, f)| (id, f.shape.clone())).collect();
        for _ in 0..conf.reg_position_iterations {
            let contacts_ref: Vec<&Contact> = keys
                .iter()
                .filter_map(|&(a, b)| {
                    self.contacts
                        .contacts()
                        .find(|c| (c.fixture_a == a && c.fixture_b == b) || (c.fixture_a == b && c.fixture_b == a))
                })
                .collect();
            solver::solve_position_constraints(&contacts_ref, &mut self.bodies, &shapes, conf.reg_resolution_rate);
            for &idx in joint_indices {
                solve_joint_position(&mut self.joints[idx], &mut self.bodies);
            }
        }
    }

    fn integrate_positions(&mut self, body_ids: &[BodyId], conf: &StepConf) {
        for &id in body_ids {
            let Some(body) = self.bodies.get_mut(&id) else { continue };
            if body.body_type == crate::body::BodyType::Static || !body.awake {
                continue;
            }

            let mut translation = body.linear_velocity * conf.dt;
            if translation.length_squared() > conf.max_translation * conf.max_translation {
                let ratio = conf.max_translation / translation.length();
                translation = translation * ratio;
            }
            let mut rotation = body.angular_velocity * conf.dt;
            if rotation.abs() > conf.max_rotation {
                rotation = rotation.signum() * conf.max_rotation;
            }

            body.sweep.c0 = body.sweep.c1;
            body.sweep.a0 = body.sweep.a1;
            body.sweep.c1 += translation;
            body.sweep.a1 += rotation;
            body.sweep.alpha0 = 0.0;
            body.synchronize_transform();

            self.synchronize_fixtures(id);
        }
    }

    fn synchronize_fixtures(&mut self, body_id: BodyId) {
        let Some(body) = self.bodies.get(&body_id) else { return };
        let transform = body.transform;
        let displacement = body.sweep.c1 - body.sweep.c0;
        let fixture_ids = body.fixtures.clone();

        for fid in fixture_ids {
            let Some(fixture) = self.fixtures.get(&fid) else { continue };
            for proxy in fixture.proxies.clone() {
                let aabb = child_shape(&fixture.shape, proxy.child_index).compute_aabb(transform, 0);
                self.broad_phase.move_proxy(proxy.tree_id, aabb, displacement);
            }
        }
    }

    /// Finds the contact with the smallest time of impact among candidates
    /// involving at least one continuous (bullet or fast dynamic) body, and
    /// sub-steps just its two bodies' sweeps forward to resolve it, up to
    /// `max_toi_iterations` times per spec §4.9.
    fn solve_toi(&mut self, conf: &StepConf, stats: &mut StepStats) {
        for _ in 0..conf.max_toi_iterations {
            let mut best: Option<(f32, FixtureId, FixtureId, BodyId, BodyId, usize, usize)> = None;

            for contact in self.contacts.contacts() {
                if !contact.enabled || contact.is_sensor {
                    continue;
                }
                let (Some(a), Some(b)) = (self.bodies.get(&contact.body_a), self.bodies.get(&contact.body_b)) else { continue };
                if !is_continuous_pair(a, b) {
                    continue;
                }
                stats.toi.contacts_checked += 1;

                let (Some(fa), Some(fb)) = (self.fixtures.get(&contact.fixture_a), self.fixtures.get(&contact.fixture_b)) else { continue };
                let shape_a = child_shape(&fa.shape, contact.child_a);
                let shape_b = child_shape(&fb.shape, contact.child_b);
                let output = toi::time_of_impact_shapes(&shape_a, &a.sweep, 0, &shape_b, &b.sweep, 0);

                if output.state == TimeOfImpactState::Touching && output.t < best.as_ref().map_or(1.0, |x| x.0) {
                    best = Some((output.t, contact.fixture_a, contact.fixture_b, contact.body_a, contact.body_b, contact.child_a, contact.child_b));
                }
            }

            let Some((t, fa, fb, body_a, body_b, _, _)) = best else { break };
            stats.toi.islands_found += 1;

            for &id in &[body_a, body_b] {
                if let Some(body) = self.bodies.get_mut(&id) {
                    if body.sweep.alpha0 < t {
                        body.sweep.advance(t);
                        // `advance` only moves pos0 forward; the body's actual
                        // pose right now is that interpolated point, not the
                        // step's final target still held in c1/a1.
                        body.transform = body.sweep.transform_at(0.0);
                    }
                }
            }
            self.synchronize_fixtures(body_a);
            self.synchronize_fixtures(body_b);

            let keys = vec![(fa, fb)];
            let body_ids = vec![body_a, body_b];
            let toi_conf = StepConf {
                reg_velocity_iterations: conf.toi_velocity_iterations,
                reg_position_iterations: conf.toi_position_iterations,
                reg_resolution_rate: conf.toi_resolution_rate,
                velocity_threshold: 0.0,
                ..*conf
            };
            self.solve_island(&toi_conf, &keys, &[], &body_ids);
            stats.toi.contacts_added += 1;
        }
    }

    fn update_sleep(&mut self, conf: &StepConf) {
        let contact_list: Vec<&Contact> = self.contacts.contacts().filter(|c| c.touching && c.enabled && !c.is_sensor).collect();
        let joint_list: Vec<(usize, &Joint)> = self.joints.iter().enumerate().collect();
        let islands = island::build_islands(&self.bodies, &contact_list, &joint_list);
        let island_owned: Vec<Island> = islands
            .into_iter()
            .map(|isl| Island { bodies: isl.bodies, contact_indices: Vec::new(), joint_indices: Vec::new() })
            .collect();
        crate::sleep::update_sleep(&island_owned, &mut self.bodies, conf.dt, true);
        let _ = conf.min_still_time_to_sleep;
    }
}

/// Remove/reinsert trick to get two disjoint `&mut Body` out of a
/// `HashMap` safely, since `get_many_mut` is not available for arbitrary
/// hash-derived keys without pulling in a newer MSRV.
fn with_two_bodies<R>(bodies: &mut HashMap<BodyId, Body>, a: BodyId, b: BodyId, f: impl FnOnce(&mut Body, &mut Body) -> R) -> Option<R> {
    if a == b {
        return None;
    }
    let mut body_a = bodies.remove(&a)?;
    let mut body_b = bodies.remove(&b)?;
    let result = f(&mut body_a, &mut body_b);
    bodies.insert(a, body_a);
    bodies.insert(b, body_b);
    Some(result)
}

fn solve_joint_velocity(joint: &mut Joint, bodies: &mut HashMap<BodyId, Body>, dt: f32) {
    match joint {
        Joint::Revolute { body_a, body_b, joint } => {
            with_two_bodies(bodies, *body_a, *body_b, |a, b| joint.solve_velocity(a, b, dt));
        }
        Joint::Prismatic { body_a, body_b, joint } => {
            with_two_bodies(bodies, *body_a, *body_b, |a, b| joint.solve_velocity(a, b, dt));
        }
        Joint::Distance { body_a, body_b, joint } => {
            with_two_bodies(bodies, *body_a, *body_b, |a, b| joint.solve_velocity(a, b, dt));
        }
        Joint::Weld { body_a, body_b, joint } => {
            with_two_bodies(bodies, *body_a, *body_b, |a, b| joint.solve_velocity(a, b, dt));
        }
        Joint::Wheel { body_a, body_b, joint } => {
            with_two_bodies(bodies, *body_a, *body_b, |a, b| joint.solve_velocity(a, b, dt));
        }
        Joint::Friction { body_a, body_b, joint } => {
            with_two_bodies(bodies, *body_a, *body_b, |a, b| joint.solve_velocity(a, b, dt));
        }
        Joint::Rope { body_a, body_b, joint } => {
            with_two_bodies(bodies, *body_a, *body_b, |a, b| joint.solve_velocity(a, b, dt));
        }
        Joint::Pulley { body_a, body_b, joint } => {
            with_two_bodies(bodies, *body_a, *body_b, |a, b| joint.solve_velocity(a, b, dt));
        }
        Joint::Gear { body_a, body_b, joint } => {
            with_two_bodies(bodies, *body_a, *body_b, |a, b| joint.solve_velocity(a, b));
        }
        Joint::Mouse { body_b, joint } => {
            if let Some(b) = bodies.get_mut(body_b) {
                joint.solve_velocity(b, dt);
            }
        }
    }
}

fn solve_joint_position(joint: &mut Joint, bodies: &mut HashMap<BodyId, Body>) -> f32 {
    match joint {
        Joint::Revolute { body_a, body_b, joint } => with_two_bodies(bodies, *body_a, *body_b, |a, b| joint.solve_position(a, b)).unwrap_or(0.0),
        Joint::Prismatic { body_a, body_b, joint } => with_two_bodies(bodies, *body_a, *body_b, |a, b| joint.solve_position(a, b)).unwrap_or(0.0),
        Joint::Distance { body_a, body_b, joint } => with_two_bodies(bodies, *body_a, *body_b, |a, b| joint.solve_position(a, b)).unwrap_or(0.0),
        Joint::Weld { body_a, body_b, joint } => with_two_bodies(bodies, *body_a, *body_b, |a, b| joint.solve_position(a, b)).unwrap_or(0.0),
        Joint::Wheel { body_a, body_b, joint } => with_two_bodies(bodies, *body_a, *body_b, |a, b| joint.solve_position(a, b)).unwrap_or(0.0),
        Joint::Friction { body_a, body_b, joint } => with_two_bodies(bodies, *body_a, *body_b, |a, b| joint.solve_position(a, b)).unwrap_or(0.0),
        Joint::Rope { body_a, body_b, joint } => with_two_bodies(bodies, *body_a, *body_b, |a, b| joint.solve_position(a, b)).unwrap_or(0.0),
        Joint::Pulley { body_a, body_b, joint } => with_two_bodies(bodies, *body_a, *body_b, |a, b| joint.solve_position(a, b)).unwrap_or(0.0),
        Joint::Gear { body_a, body_b, joint } => with_two_bodies(bodies, *body_a, *body_b, |a, b| joint.solve_position(a, b)).unwrap_or(0.0),
        Joint::Mouse { .. } => 0.0,
    }
}

fn is_continuous_pair(a: &Body, b: &Body) -> bool {
    use crate::body::BodyType::Dynamic;
    let a_continuous = a.bullet || a.body_type != Dynamic;
    let b_continuous = b.bullet || b.body_type != Dynamic;
    if a.body_type == Dynamic && b.body_type == Dynamic {
        a.bullet || b.bullet
    } else {
        a_continuous && b_continuous && (a.body_type == Dynamic || b.body_type == Dynamic)
    }
}

fn child_shape(shape: &Shape, child: usize) -> Shape {
    match shape {
        Shape::Chain { .. } => shape.chain_edge(child),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyType;

    #[test]
    fn create_and_destroy_body_frees_its_fixtures() {
        let mut world = World::new(Def::default());
        let body = world.create_body(&BodyDef { body_type: BodyType::Dynamic, ..Default::default() }).unwrap();
        let fixture = world.create_fixture(body, FixtureDef { shape: Shape::boxed(1.0, 1.0), ..Default::default() }).unwrap();
        assert!(world.fixture(fixture).is_some());
        world.destroy_body(body);
        assert!(world.body(body).is_none());
        assert!(world.fixture(fixture).is_none());
    }

    #[test]
    fn resting_box_on_ground_stays_above_zero_after_many_steps() {
        let mut world = World::new(Def::default());
        let ground = world.create_body(&BodyDef { body_type: BodyType::Static, ..Default::default() }).unwrap();
        world.create_fixture(ground, FixtureDef { shape: Shape::boxed(50.0, 1.0), ..Default::default() }).unwrap();

        let dynamic = world.create_body(&BodyDef { body_type: BodyType::Dynamic, position: Vec2::new(0.0, 2.0), ..Default::default() }).unwrap();
        world.create_fixture(dynamic, FixtureDef { shape: Shape::boxed(0.5, 0.5), density: 1.0, ..Default::default() }).unwrap();

        let conf = StepConf::default();
        for _ in 0..180 {
            world.step(&conf);
        }

        let body = world.body(dynamic).unwrap();
        assert!(body.transform.p.y > 0.5);
    }

    #[test]
    fn locked_world_rejects_body_creation() {
        let mut world = World::new(Def::default());
        world.locked = true;
        assert!(world.create_body(&BodyDef::default()).is_none());
    }
}
