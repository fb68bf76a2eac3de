//! Island building: groups awake dynamic bodies connected by touching
//! contacts or joints into independent islands so the solver (and sleep
//! management) can be scoped per-island instead of over the whole world.
//!
//! Grounded on the teacher's two-pass `update_sleep` in `sleep.rs`
//! (timer pass, then wake-propagation pass across contacts) but restructured
//! as an explicit DFS over a body/contact/joint graph, per spec §4.7 —
//! the teacher never builds islands; it runs sleep checks over the flat
//! body array, which only works because it has no joints to propagate
//! wakefulness through.

use std::collections::HashMap;

use crate::body::{Body, BodyId, BodyType};
use crate::contact::Contact;
use crate::joints::Joint;

pub struct Island {
    pub bodies: Vec<BodyId>,
    pub contact_indices: Vec<usize>,
    pub joint_indices: Vec<usize>,
}

/// Builds islands via DFS: static bodies are never traversed through (they
/// don't transmit motion between islands), exactly like Box2D's
/// `b2World::Solve` seeding bodies only from non-static, awake, enabled
/// dynamic/kinematic bodies.
pub fn build_islands(bodies: &HashMap<BodyId, Body>, contacts: &[&Contact], joints: &[(usize, &Joint)]) -> Vec<Island> {
    let mut adjacency: HashMap<BodyId, Vec<(BodyId, Edge)>> = HashMap::new();

    for (i, contact) in contacts.iter().enumerate() {
        if !contact.touching || contact.is_sensor || !contact.enabled {
            continue;
        }
        adjacency.entry(contact.body_a).or_default().push((contact.body_b, Edge::Contact(i)));
        adjacency.entry(contact.body_b).or_default().push((contact.body_a, Edge::Contact(i)));
    }

    for &(i, joint) in joints {
        let (a, b) = joint.bodies();
        if let Some(a) = a {
            adjacency.entry(a).or_default().push((b, Edge::Joint(i)));
            adjacency.entry(b).or_default().push((a, Edge::Joint(i)));
        }
    }

    let mut visited: HashMap<BodyId, bool> = HashMap::new();
    let mut islands = Vec::new();

    for (&id, body) in bodies.iter() {
        if body.body_type == BodyType::Static || !body.awake || *visited.get(&id).unwrap_or(&false) {
            continue;
        }

        let mut island_bodies = Vec::new();
        let mut island_contacts = Vec::new();
        let mut island_joints = Vec::new();
        let mut stack = vec![id];
        visited.insert(id, true);

        while let Some(current) = stack.pop() {
            island_bodies.push(current);
            let Some(current_body) = bodies.get(&current) else { continue };
            // Static bodies terminate the walk: they connect islands through
            // contact but never join one themselves.
            if current_body.body_type == BodyType::Static {
                continue;
            }

            if let Some(edges) = adjacency.get(&current) {
                for &(neighbor, edge) in edges {
                    match edge {
                        Edge::Contact(idx) => {
                            if !island_contacts.contains(&idx) {
                                island_contacts.push(idx);
                            }
                        }
                        Edge::Joint(idx) => {
                            if !island_joints.contains(&idx) {
                                island_joints.push(idx);
                            }
                        }
                    }
                    let already = *visited.get(&neighbor).unwrap_or(&false);
                    if !already {
                        visited.insert(neighbor, true);
                        stack.push(neighbor);
                    }
                }
            }
        }

        islands.push(Island { bodies: island_bodies, contact_indices: island_contacts, joint_indices: island_joints });
    }

    islands
}

#[derive(Clone, Copy)]
enum Edge {
    Contact(usize),
    Joint(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyDef;
    use crate::math::{Transform, Vec2};
    use crate::manifold::{Manifold, ManifoldKind};

    fn body(id: BodyId, body_type: BodyType) -> Body {
        Body::new(id, &BodyDef { body_type, ..Default::default() })
    }

    fn touching_contact(a: BodyId, b: BodyId) -> Contact {
        Contact {
            fixture_a: a,
            fixture_b: b,
            body_a: a,
            body_b: b,
            child_a: 0,
            child_b: 0,
            friction: 0.3,
            restitution: 0.0,
            manifold: Manifold { kind: ManifoldKind::Circles, local_normal: Vec2::ZERO, local_point: Vec2::ZERO, points: Default::default() },
            points: Default::default(),
            touching: true,
            enabled: true,
            is_sensor: false,
            island_index: None,
        }
    }

    #[test]
    fn two_touching_dynamic_bodies_form_one_island() {
        let mut bodies = HashMap::new();
        bodies.insert(0, body(0, BodyType::Dynamic));
        bodies.insert(1, body(1, BodyType::Dynamic));
        let contact = touching_contact(0, 1);
        let contacts = vec![&contact];
        let islands = build_islands(&bodies, &contacts, &[]);
        assert_eq!(islands.len(), 1);
        assert_eq!(islands[0].bodies.len(), 2);
    }

    #[test]
    fn static_body_does_not_merge_two_islands() {
        let mut bodies = HashMap::new();
        bodies.insert(0, body(0, BodyType::Dynamic));
        bodies.insert(1, body(1, BodyType::Static));
        bodies.insert(2, body(2, BodyType::Dynamic));
        let c1 = touching_contact(0, 1);
        let c2 = touching_contact(1, 2);
        let contacts = vec![&c1, &c2];
        let islands = build_islands(&bodies, &contacts, &[]);
        assert_eq!(islands.len(), 2);
    }

    #[test]
    fn sleeping_body_is_excluded() {
        let mut bodies = HashMap::new();
        let mut b = body(0, BodyType::Dynamic);
        b.awake = false;
        bodies.insert(0, b);
        let islands = build_islands(&bodies, &[], &[]);
        assert!(islands.is_empty());
    }
}
