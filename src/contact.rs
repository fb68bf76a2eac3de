//! Contacts and the contact manager: pairing, manifold refresh, and
//! accumulated-impulse carry-over across frames.
//!
//! Grounded on the teacher's `resolve.rs` (`initialize_contacts` computes
//! the same per-contact bias/tangent this module's `Contact` stores) and
//! on `box2d-lite-rs`'s `Arbiter`/`FeaturePair` pattern for matching old
//! and new manifold points by feature id so warm-start impulses survive a
//! re-collision.

use std::collections::HashMap;

use crate::body::{Body, BodyId, Fixture, FixtureId};
use crate::manifold::{self, ContactFeature, Manifold, MAX_MANIFOLD_POINTS};
use crate::math::Transform;

/// Per-point solver state that persists across frames when the same
/// contact feature reappears (warm starting).
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstraintPoint {
    pub normal_impulse: f32,
    pub tangent_impulse: f32,
    pub feature: ContactFeature,
}

pub struct Contact {
    pub fixture_a: FixtureId,
    pub fixture_b: FixtureId,
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub child_a: usize,
    pub child_b: usize,
    pub friction: f32,
    pub restitution: f32,
    pub manifold: Manifold,
    pub points: [ConstraintPoint; MAX_MANIFOLD_POINTS],
    pub touching: bool,
    pub enabled: bool,
    pub is_sensor: bool,
    /// Set by island building; which island this contact belongs to this step.
    pub island_index: Option<u32>,
}

impl Contact {
    fn new(fixture_a: &Fixture, child_a: usize, fixture_b: &Fixture, child_b: usize) -> Self {
        Contact {
            fixture_a: fixture_a.id,
            fixture_b: fixture_b.id,
            body_a: fixture_a.body,
            body_b: fixture_b.body,
            child_a,
            child_b,
            friction: (fixture_a.friction * fixture_b.friction).sqrt(),
            restitution: fixture_a.restitution.max(fixture_b.restitution),
            manifold: Manifold { kind: manifold::ManifoldKind::Circles, local_normal: Default::default(), local_point: Default::default(), points: Default::default() },
            points: [ConstraintPoint::default(); MAX_MANIFOLD_POINTS],
            touching: false,
            enabled: true,
            is_sensor: fixture_a.is_sensor || fixture_b.is_sensor,
            island_index: None,
        }
    }

    /// Recomputes the manifold from current transforms and carries over
    /// accumulated impulses for features that survive, matching the
    /// teacher's warm-start-by-feature-id approach.
    pub fn update(&mut self, shape_a: &crate::shapes::Shape, xf_a: Transform, shape_b: &crate::shapes::Shape, xf_b: Transform, warm_start: bool) -> bool {
        let was_touching = self.touching;
        let new_manifold = manifold::collide(shape_a, xf_a, shape_b, xf_b);
        self.touching = !new_manifold.points.is_empty();

        let mut new_points = [ConstraintPoint::default(); MAX_MANIFOLD_POINTS];
        for (i, mp) in new_manifold.points.iter().enumerate().take(MAX_MANIFOLD_POINTS) {
            let mut point = ConstraintPoint { normal_impulse: 0.0, tangent_impulse: 0.0, feature: mp.feature };
            if warm_start {
                if let Some(old) = self.points.iter().find(|p| p.feature == mp.feature) {
                    point.normal_impulse = old.normal_impulse;
                    point.tangent_impulse = old.tangent_impulse;
                }
            }
            new_points[i] = point;
        }

        self.points = new_points;
        self.manifold = new_manifold;
        was_touching != self.touching
    }
}

fn pair_key(a: FixtureId, b: FixtureId) -> (FixtureId, FixtureId) {
    if a < b { (a, b) } else { (b, a) }
}

/// Owns the fixture-pair-to-`Contact` map and reacts to broad-phase pair
/// churn (`add_pair`) plus per-step manifold refresh (`collide`), mirroring
/// the teacher's `World::step` narrow-phase pass generalized out of
/// `world.rs` into its own manager (spec §4.6).
#[derive(Default)]
pub struct ContactManager {
    contacts: HashMap<(FixtureId, FixtureId), Contact>,
}

impl ContactManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn contacts(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.values()
    }

    pub fn contacts_mut(&mut self) -> impl Iterator<Item = &mut Contact> {
        self.contacts.values_mut()
    }

    /// Looks a contact up by its fixture pair, order-independent. Used by
    /// the world's island solve to fetch a specific contact for mutation
    /// after island membership was computed from a separate, immutably
    /// borrowed snapshot.
    pub fn get_mut(&mut self, fixture_a: FixtureId, fixture_b: FixtureId) -> Option<&mut Contact> {
        self.contacts.get_mut(&pair_key(fixture_a, fixture_b))
    }

    /// Removes and returns the contacts for the given fixture pairs so the
    /// caller can hold disjoint `&mut Contact` borrows into an owned `Vec`
    /// (the borrow checker can't prove `get_mut` calls on distinct keys in
    /// a loop are disjoint). Pair with `put_back` to restore them.
    pub fn take_many(&mut self, keys: &[(FixtureId, FixtureId)]) -> Vec<Contact> {
        keys.iter().filter_map(|&(a, b)| self.contacts.remove(&pair_key(a, b))).collect()
    }

    /// Restores contacts previously removed by `take_many`.
    pub fn put_back(&mut self, contacts: Vec<Contact>) {
        for c in contacts {
            self.contacts.insert(pair_key(c.fixture_a, c.fixture_b), c);
        }
    }

    pub fn remove_fixture(&mut self, fixture: FixtureId) {
        self.contacts.retain(|key, _| key.0 != fixture && key.1 != fixture);
    }

    pub fn remove_body(&mut self, body: BodyId) {
        self.contacts.retain(|_, c| c.body_a != body && c.body_b != body);
    }

    /// Called with every candidate fixture-child pair the broad phase
    /// reports as newly overlapping; creates a `Contact` unless one
    /// already exists, the bodies are the same body, neither body can
    /// move, or the filter forbids it.
    pub fn add_pair(&mut self, fixture_a: &Fixture, child_a: usize, fixture_b: &Fixture, child_b: usize, body_a: &Body, body_b: &Body) {
        if fixture_a.body == fixture_b.body {
            return;
        }
        if body_a.is_static() && body_b.is_static() {
            return;
        }
        if !crate::body::Filter::should_collide(&fixture_a.filter, &fixture_b.filter) {
            return;
        }

        let (fa, fb, ca, cb) = if fixture_a.id < fixture_b.id {
            (fixture_a, fixture_b, child_a, child_b)
        } else {
            (fixture_b, fixture_a, child_b, child_a)
        };

        self.contacts.entry(pair_key(fa.id, fb.id)).or_insert_with(|| Contact::new(fa, ca, fb, cb));
    }

    /// Re-collides every contact pair whose bodies are awake (or where one
    /// side is non-dynamic but was recently touched), dropping any pair
    /// whose proxies no longer overlap is the broad-phase's job — this
    /// step only refreshes manifolds, per spec §4.6's split between
    /// `FindNewContacts` (broad phase driven) and `Collide` (narrow phase).
    pub fn collide(&mut self, fixtures: &HashMap<FixtureId, Fixture>, bodies: &HashMap<BodyId, Body>, warm_start: bool) -> Vec<(FixtureId, FixtureId, bool)> {
        let mut began_or_ended = Vec::new();
        for contact in self.contacts.values_mut() {
            if contact.is_sensor {
                continue;
            }
            let (Some(fa), Some(fb)) = (fixtures.get(&contact.fixture_a), fixtures.get(&contact.fixture_b)) else { continue };
            let (Some(ba), Some(bb)) = (bodies.get(&contact.body_a), bodies.get(&contact.body_b)) else { continue };

            if !ba.awake && !bb.awake {
                continue;
            }

            let shape_a = shape_child(&fa.shape, contact.child_a);
            let shape_b = shape_child(&fb.shape, contact.child_b);
            let changed = contact.update(&shape_a, ba.transform, &shape_b, bb.transform, warm_start);
            if changed {
                began_or_ended.push((contact.fixture_a, contact.fixture_b, contact.touching));
            }
        }
        began_or_ended
    }

    pub fn prune_non_overlapping(&mut self, still_overlapping: impl Fn(FixtureId, FixtureId) -> bool) {
        self.contacts.retain(|&(a, b), _| still_overlapping(a, b));
    }
}

fn shape_child(shape: &crate::shapes::Shape, child: usize) -> crate::shapes::Shape {
    match shape {
        crate::shapes::Shape::Chain { .. } => shape.chain_edge(child),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{BodyDef, BodyType, Filter};
    use crate::math::Vec2;
    use crate::shapes::Shape;

    fn make_fixture(id: FixtureId, body: BodyId, shape: Shape) -> Fixture {
        Fixture { id, body, shape, density: 1.0, friction: 0.3, restitution: 0.0, is_sensor: false, filter: Filter::default(), proxies: Vec::new() }
    }

    #[test]
    fn add_pair_skips_same_body() {
        let mut cm = ContactManager::new();
        let body = Body::new(0, &BodyDef::default());
        let fa = make_fixture(0, 0, Shape::boxed(1.0, 1.0));
        let fb = make_fixture(1, 0, Shape::boxed(1.0, 1.0));
        cm.add_pair(&fa, 0, &fb, 0, &body, &body);
        assert!(cm.is_empty());
    }

    #[test]
    fn add_pair_skips_two_static_bodies() {
        let mut cm = ContactManager::new();
        let a = Body::new(0, &BodyDef { body_type: BodyType::Static, ..Default::default() });
        let b = Body::new(1, &BodyDef { body_type: BodyType::Static, position: Vec2::new(1.0, 0.0), ..Default::default() });
        let fa = make_fixture(0, 0, Shape::boxed(1.0, 1.0));
        let fb = make_fixture(1, 1, Shape::boxed(1.0, 1.0));
        cm.add_pair(&fa, 0, &fb, 0, &a, &b);
        assert!(cm.is_empty());
    }

    #[test]
    fn add_pair_creates_one_contact() {
        let mut cm = ContactManager::new();
        let a = Body::new(0, &BodyDef { body_type: BodyType::Dynamic, ..Default::default() });
        let b = Body::new(1, &BodyDef { body_type: BodyType::Static, position: Vec2::new(1.0, 0.0), ..Default::default() });
        let fa = make_fixture(0, 0, Shape::boxed(1.0, 1.0));
        let fb = make_fixture(1, 1, Shape::boxed(1.0, 1.0));
        cm.add_pair(&fa, 0, &fb, 0, &a, &b);
        assert_eq!(cm.len(), 1);
        cm.add_pair(&fa, 0, &fb, 0, &a, &b);
        assert_eq!(cm.len(), 1);
    }
}
