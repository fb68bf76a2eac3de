//! Per-island sleep management: an island sleeps only when every dynamic
//! body in it has been slow for long enough, and waking one body in an
//! island wakes the whole island.
//!
//! Generalizes the teacher's `update_sleep` (global velocity-threshold
//! timer plus a wake-propagation pass over `contacts`) from per-body to
//! per-island, per spec §4.10 step 6 — with joints, a body resting against
//! a slow-but-not-sleeping neighbor across a joint must stay awake too,
//! which a flat per-body timer can't express.

use std::collections::HashMap;

use crate::body::{Body, BodyId, BodyType};
use crate::island::Island;

// Matches the teacher's constants: the velocity threshold must exceed
// gravity*dt, since resting bodies briefly reach gravity-level speed each
// frame before the contact solver zeroes it out again.
pub const SLEEP_LINEAR_THRESHOLD: f32 = 0.01;
pub const SLEEP_ANGULAR_THRESHOLD: f32 = 0.05;
pub const SLEEP_TIME_THRESHOLD: f32 = 0.5;

/// Advances each island's sleep timer and puts it to sleep in one shot
/// when every body has been under threshold for `SLEEP_TIME_THRESHOLD`
/// seconds; a single fast body keeps the whole island awake.
pub fn update_sleep(islands: &[Island], bodies: &mut HashMap<BodyId, Body>, dt: f32, allow_sleep: bool) {
    for island in islands {
        if !allow_sleep {
            for &id in &island.bodies {
                if let Some(b) = bodies.get_mut(&id) {
                    b.sleep_time = 0.0;
                }
            }
            continue;
        }

        let mut min_sleep_time = f32::MAX;
        for &id in &island.bodies {
            let Some(body) = bodies.get_mut(&id) else { continue };
            if body.body_type != BodyType::Dynamic {
                continue;
            }
            if !body.allow_sleep
                || body.linear_velocity.length_squared() > SLEEP_LINEAR_THRESHOLD * SLEEP_LINEAR_THRESHOLD
                || body.angular_velocity.abs() > SLEEP_ANGULAR_THRESHOLD
            {
                body.sleep_time = 0.0;
                min_sleep_time = 0.0;
            } else {
                body.sleep_time += dt;
                min_sleep_time = min_sleep_time.min(body.sleep_time);
            }
        }

        if min_sleep_time >= SLEEP_TIME_THRESHOLD {
            for &id in &island.bodies {
                if let Some(body) = bodies.get_mut(&id) {
                    body.set_awake(false);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyDef;
    use crate::math::Vec2;

    #[test]
    fn island_sleeps_after_threshold_when_all_bodies_slow() {
        let mut bodies = HashMap::new();
        bodies.insert(0, Body::new(0, &BodyDef { body_type: BodyType::Dynamic, ..Default::default() }));
        let island = Island { bodies: vec![0], contact_indices: Vec::new(), joint_indices: Vec::new() };

        let mut elapsed = 0.0;
        while elapsed < SLEEP_TIME_THRESHOLD + 0.1 {
            update_sleep(std::slice::from_ref(&island), &mut bodies, 1.0 / 60.0, true);
            elapsed += 1.0 / 60.0;
        }

        assert!(!bodies[&0].awake);
    }

    #[test]
    fn one_fast_body_keeps_island_awake() {
        let mut bodies = HashMap::new();
        bodies.insert(0, Body::new(0, &BodyDef { body_type: BodyType::Dynamic, ..Default::default() }));
        let mut fast = Body::new(1, &BodyDef { body_type: BodyType::Dynamic, position: Vec2::new(1.0, 0.0), ..Default::default() });
        fast.linear_velocity = Vec2::new(10.0, 0.0);
        bodies.insert(1, fast);

        let island = Island { bodies: vec![0, 1], contact_indices: Vec::new(), joint_indices: Vec::new() };
        for _ in 0..120 {
            update_sleep(std::slice::from_ref(&island), &mut bodies, 1.0 / 60.0, true);
        }
        assert!(bodies[&0].awake);
        assert!(bodies[&1].awake);
    }

    #[test]
    fn allow_sleep_false_resets_timer() {
        let mut bodies = HashMap::new();
        let mut b = Body::new(0, &BodyDef { body_type: BodyType::Dynamic, ..Default::default() });
        b.sleep_time = 10.0;
        bodies.insert(0, b);
        let island = Island { bodies: vec![0], contact_indices: Vec::new(), joint_indices: Vec::new() };
        update_sleep(std::slice::from_ref(&island), &mut bodies, 1.0 / 60.0, false);
        assert_eq!(bodies[&0].sleep_time, 0.0);
    }
}
