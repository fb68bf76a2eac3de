//! Cross-module scenarios exercising the public `World` API end to end:
//! resting contacts, penetration recovery, restitution, revolute joints,
//! and the no-tunneling guarantee TOI sub-stepping is supposed to provide.

use rigid2d::body::{BodyDef, BodyType, FixtureDef};
use rigid2d::joints::{Joint, RevoluteJoint};
use rigid2d::math::Vec2;
use rigid2d::shapes::Shape;
use rigid2d::world::{Def, StepConf, World};

fn settle(world: &mut World, conf: &StepConf, steps: u32) {
    for _ in 0..steps {
        world.step(conf);
    }
}

#[test]
fn box_settles_to_rest_on_ground_without_sinking_through() {
    let mut world = World::new(Def::default());
    let ground = world.create_body(&BodyDef { body_type: BodyType::Static, ..Default::default() }).unwrap();
    world.create_fixture(ground, FixtureDef { shape: Shape::boxed(25.0, 0.5), ..Default::default() }).unwrap();

    let dynamic = world
        .create_body(&BodyDef { body_type: BodyType::Dynamic, position: Vec2::new(0.0, 5.0), ..Default::default() })
        .unwrap();
    world.create_fixture(dynamic, FixtureDef { shape: Shape::boxed(0.5, 0.5), density: 1.0, friction: 0.3, ..Default::default() }).unwrap();

    let conf = StepConf::default();
    settle(&mut world, &conf, 300);

    let body = world.body(dynamic).unwrap();
    // Resting height is ground top (0.5) + half the box (0.5), allowing
    // for the small penetration slop the solver tolerates by design.
    assert!(body.transform.p.y > 0.9 && body.transform.p.y < 1.1, "y = {}", body.transform.p.y);
    assert!(body.linear_velocity.length() < 0.2);
}

#[test]
fn overlapping_boxes_are_pushed_apart_by_position_solve() {
    let mut world = World::new(Def { gravity: Vec2::ZERO, ..Default::default() });
    let a = world.create_body(&BodyDef { body_type: BodyType::Dynamic, position: Vec2::new(-0.2, 0.0), ..Default::default() }).unwrap();
    world.create_fixture(a, FixtureDef { shape: Shape::boxed(0.5, 0.5), density: 1.0, ..Default::default() }).unwrap();
    let b = world.create_body(&BodyDef { body_type: BodyType::Dynamic, position: Vec2::new(0.2, 0.0), ..Default::default() }).unwrap();
    world.create_fixture(b, FixtureDef { shape: Shape::boxed(0.5, 0.5), density: 1.0, ..Default::default() }).unwrap();

    let conf = StepConf::default();
    settle(&mut world, &conf, 60);

    let dist = (world.body(b).unwrap().transform.p - world.body(a).unwrap().transform.p).length();
    assert!(dist > 0.9, "boxes should have separated, dist = {dist}");
}

#[test]
fn bouncy_ball_recovers_height_after_hitting_the_floor() {
    let mut world = World::new(Def::default());
    let ground = world.create_body(&BodyDef { body_type: BodyType::Static, ..Default::default() }).unwrap();
    world.create_fixture(ground, FixtureDef { shape: Shape::boxed(25.0, 0.5), ..Default::default() }).unwrap();

    let ball = world
        .create_body(&BodyDef { body_type: BodyType::Dynamic, position: Vec2::new(0.0, 3.0), ..Default::default() })
        .unwrap();
    world.create_fixture(ball, FixtureDef { shape: Shape::circle(Vec2::ZERO, 0.3), density: 1.0, restitution: 0.85, friction: 0.0, ..Default::default() }).unwrap();

    let conf = StepConf::default();
    let mut max_height_after_bounce = 0.0f32;
    let mut bounced = false;
    for i in 0..300 {
        world.step(&conf);
        let y = world.body(ball).unwrap().transform.p.y;
        let vy = world.body(ball).unwrap().linear_velocity.y;
        if i > 30 && vy > 1.0 {
            bounced = true;
        }
        if bounced {
            max_height_after_bounce = max_height_after_bounce.max(y);
        }
    }
    assert!(bounced, "ball never bounced off the floor");
    assert!(max_height_after_bounce > 1.2, "post-bounce height too low: {max_height_after_bounce}");
}

#[test]
fn fast_bullet_does_not_tunnel_through_a_thin_static_wall() {
    let mut world = World::new(Def { gravity: Vec2::ZERO, ..Default::default() });
    let wall = world.create_body(&BodyDef { body_type: BodyType::Static, ..Default::default() }).unwrap();
    world.create_fixture(wall, FixtureDef { shape: Shape::boxed(0.02, 3.0), ..Default::default() }).unwrap();

    let bullet = world
        .create_body(&BodyDef {
            body_type: BodyType::Dynamic,
            position: Vec2::new(-5.0, 0.0),
            linear_velocity: Vec2::new(600.0, 0.0),
            bullet: true,
            ..Default::default()
        })
        .unwrap();
    world.create_fixture(bullet, FixtureDef { shape: Shape::circle(Vec2::ZERO, 0.05), density: 1.0, ..Default::default() }).unwrap();

    let conf = StepConf::default();
    settle(&mut world, &conf, 30);

    let x = world.body(bullet).unwrap().transform.p.x;
    assert!(x < 0.5, "bullet tunneled through the wall, ended up at x = {x}");
}

#[test]
fn revolute_joint_keeps_pendulum_anchored_to_its_pivot() {
    let mut world = World::new(Def::default());
    let anchor = world.create_body(&BodyDef { body_type: BodyType::Static, ..Default::default() }).unwrap();

    let bob = world
        .create_body(&BodyDef { body_type: BodyType::Dynamic, position: Vec2::new(2.0, 0.0), ..Default::default() })
        .unwrap();
    world.create_fixture(bob, FixtureDef { shape: Shape::circle(Vec2::ZERO, 0.2), density: 1.0, ..Default::default() }).unwrap();

    let joint = RevoluteJoint::new(Vec2::ZERO, Vec2::new(-2.0, 0.0), 0.0);
    world.create_joint(Joint::Revolute { body_a: anchor, body_b: bob, joint }).unwrap();

    let conf = StepConf::default();
    settle(&mut world, &conf, 300);

    let anchor_pos = world.body(anchor).unwrap().transform.p;
    let bob_world_anchor = world.body(bob).unwrap().transform.transform_point(Vec2::new(-2.0, 0.0));
    let drift = (bob_world_anchor - anchor_pos).length();
    assert!(drift < 0.05, "pendulum anchor drifted by {drift}");
}

#[test]
fn destroying_a_body_removes_its_joints() {
    let mut world = World::new(Def::default());
    let a = world.create_body(&BodyDef { body_type: BodyType::Dynamic, ..Default::default() }).unwrap();
    world.create_fixture(a, FixtureDef { shape: Shape::boxed(0.5, 0.5), ..Default::default() }).unwrap();
    let b = world
        .create_body(&BodyDef { body_type: BodyType::Dynamic, position: Vec2::new(1.0, 0.0), ..Default::default() })
        .unwrap();
    world.create_fixture(b, FixtureDef { shape: Shape::boxed(0.5, 0.5), ..Default::default() }).unwrap();

    let joint = RevoluteJoint::new(Vec2::ZERO, Vec2::ZERO, 0.0);
    world.create_joint(Joint::Revolute { body_a: a, body_b: b, joint }).unwrap();

    world.destroy_body(a);

    let conf = StepConf::default();
    // Should not panic looking up a dangling body id through the joint.
    world.step(&conf);
}
