//! `rigid2d`: a deterministic 2D rigid-body physics core — dynamic AABB
//! broad phase, GJK/SAT narrow phase, sequential-impulse contact and joint
//! solving, and conservative-advancement continuous collision.
//!
//! Modules are laid out the way the teacher's `physics` module lists its
//! own pieces (`types`, `integrate`, `broadphase`, `narrowphase`, `resolve`,
//! `constraints`, `sleep`, `world`), generalized to this crate's fixture/
//! body/joint/island model. [`World`] is the entry point: create bodies and
//! fixtures on it, add joints, and call [`World::step`] once per frame.

pub mod body;
pub mod broadphase;
pub mod contact;
pub mod distance;
pub mod island;
pub mod joints;
pub mod manifold;
pub mod math;
pub mod shapes;
pub mod sleep;
pub mod solver;
pub mod toi;
pub mod world;

pub use body::{Body, BodyDef, BodyId, BodyType, Filter, Fixture, FixtureDef, FixtureError, FixtureId, ProxyHandle};
pub use contact::{Contact, ContactManager};
pub use joints::Joint;
pub use math::{Aabb, Mat22, Rot, Sweep, Transform, Vec2};
pub use shapes::Shape;
pub use toi::{TimeOfImpactOutput, TimeOfImpactState};
pub use world::{ContactListener, Def, PreStats, QueryAction, RayCastAction, RegStats, ShouldCollideFilter, StepConf, StepStats, ToiStats, World};
