//! Shapes: circle, edge, polygon, chain.
//!
//! Grounded on the teacher's `physics::types::Shape` enum (tagged variants
//! dispatched by `match`, no `dyn Shape` trait object) but generalized to
//! the fuller capability set `spec.md` §4.2 requires: vertex radius, a
//! GJK-ready `DistanceProxy`, and edge one-sided neighbors for chains.

use crate::math::{Aabb, Transform, Vec2};

pub const MAX_POLYGON_VERTICES: usize = 8;

/// A convex polygon's vertex/normal pairs plus a uniform vertex radius.
/// Both circle and edge shapes are expressed in terms of the same
/// `DistanceProxy` representation so GJK never special-cases shape kind.
#[derive(Debug, Clone)]
pub struct DistanceProxy {
    pub vertices: Vec<Vec2>,
    pub radius: f32,
}

impl DistanceProxy {
    /// The support point: the proxy vertex farthest along `direction`.
    pub fn support(&self, direction: Vec2) -> usize {
        let mut best_index = 0;
        let mut best_value = self.vertices[0].dot(direction);
        for (i, v) in self.vertices.iter().enumerate().skip(1) {
            let value = v.dot(direction);
            if value > best_value {
                best_value = value;
                best_index = i;
            }
        }
        best_index
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MassData {
    pub mass: f32,
    pub center: Vec2,
    /// Rotational inertia about the shape's own centroid (not the origin).
    pub inertia: f32,
}

/// One-sided neighbor vertices for a chain-derived edge, used to suppress
/// contacts approaching the "back" side of a chain near a shared vertex.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeNeighbors {
    pub v0: Option<Vec2>,
    pub v3: Option<Vec2>,
}

#[derive(Debug, Clone)]
pub enum Shape {
    Circle { center: Vec2, radius: f32 },
    Edge { v1: Vec2, v2: Vec2, radius: f32, neighbors: EdgeNeighbors },
    Polygon { vertices: Vec<Vec2>, normals: Vec<Vec2>, centroid: Vec2, radius: f32 },
    /// An ordered vertex loop/strip; each child is one edge with neighbor
    /// vertices drawn from the adjacent chain vertices where they exist.
    Chain { vertices: Vec<Vec2>, loop_: bool, radius: f32 },
}

impl Shape {
    pub fn circle(center: Vec2, radius: f32) -> Self {
        Shape::Circle { center, radius }
    }

    pub fn edge(v1: Vec2, v2: Vec2) -> Self {
        Shape::Edge { v1, v2, radius: 0.0, neighbors: EdgeNeighbors::default() }
    }

    pub fn edge_one_sided(v0: Vec2, v1: Vec2, v2: Vec2, v3: Vec2) -> Self {
        Shape::Edge {
            v1,
            v2,
            radius: 0.0,
            neighbors: EdgeNeighbors { v0: Some(v0), v3: Some(v3) },
        }
    }

    /// Builds a convex polygon from counter-clockwise vertices (`spec.md`
    /// §4.2: concavity and clockwise winding are undefined behavior by
    /// contract, so we only validate the vertex count here).
    pub fn polygon(vertices: Vec<Vec2>) -> Option<Self> {
        if vertices.len() < 3 || vertices.len() > MAX_POLYGON_VERTICES {
            return None;
        }
        let n = vertices.len();
        let mut normals = Vec::with_capacity(n);
        for i in 0..n {
            let edge = vertices[(i + 1) % n] - vertices[i];
            if edge.length_squared() < crate::math::EPSILON * crate::math::EPSILON {
                return None;
            }
            let (normal, _) = edge.perp().normalized();
            normals.push(normal);
        }
        let centroid = polygon_centroid(&vertices);
        Some(Shape::Polygon { vertices, normals, centroid, radius: 0.0 })
    }

    pub fn rounded_polygon(vertices: Vec<Vec2>, radius: f32) -> Option<Self> {
        match Shape::polygon(vertices)? {
            Shape::Polygon { vertices, normals, centroid, .. } => {
                Some(Shape::Polygon { vertices, normals, centroid, radius })
            }
            _ => unreachable!(),
        }
    }

    pub fn boxed(half_width: f32, half_height: f32) -> Self {
        Shape::polygon(vec![
            Vec2::new(-half_width, -half_height),
            Vec2::new(half_width, -half_height),
            Vec2::new(half_width, half_height),
            Vec2::new(-half_width, half_height),
        ])
        .expect("axis-aligned box is always a valid polygon")
    }

    pub fn chain(vertices: Vec<Vec2>, loop_: bool) -> Self {
        Shape::Chain { vertices, loop_, radius: 0.0 }
    }

    pub fn vertex_radius(&self) -> f32 {
        match self {
            Shape::Circle { radius, .. } => *radius,
            Shape::Edge { radius, .. } => *radius,
            Shape::Polygon { radius, .. } => *radius,
            Shape::Chain { radius, .. } => *radius,
        }
    }

    /// Number of independently-collidable children. Chains expose one
    /// child per edge; everything else has exactly one child.
    pub fn child_count(&self) -> usize {
        match self {
            Shape::Chain { vertices, loop_, .. } => {
                if vertices.len() < 2 {
                    0
                } else if *loop_ {
                    vertices.len()
                } else {
                    vertices.len() - 1
                }
            }
            _ => 1,
        }
    }

    /// Materializes child `index` of a chain as a standalone one-sided edge.
    pub fn chain_edge(&self, index: usize) -> Shape {
        match self {
            Shape::Chain { vertices, loop_, radius } => {
                let n = vertices.len();
                let i1 = index;
                let i2 = (index + 1) % n;
                let v1 = vertices[i1];
                let v2 = vertices[i2];
                let v0 = if *loop_ || i1 > 0 {
                    Some(vertices[(i1 + n - 1) % n])
                } else {
                    None
                };
                let v3 = if *loop_ || i2 + 1 < n {
                    Some(vertices[(i2 + 1) % n])
                } else {
                    None
                };
                Shape::Edge { v1, v2, radius: *radius, neighbors: EdgeNeighbors { v0, v3 } }
            }
            other => other.clone(),
        }
    }

    pub fn compute_aabb(&self, xf: Transform, child: usize) -> Aabb {
        match self {
            Shape::Circle { center, radius } => {
                let p = xf.transform_point(*center);
                let r = Vec2::new(*radius, *radius);
                Aabb::new(p - r, p + r)
            }
            Shape::Edge { v1, v2, radius, .. } => {
                let p1 = xf.transform_point(*v1);
                let p2 = xf.transform_point(*v2);
                let r = Vec2::new(*radius, *radius);
                Aabb::new(p1.min(p2) - r, p1.max(p2) + r)
            }
            Shape::Polygon { vertices, radius, .. } => {
                let mut lower = xf.transform_point(vertices[0]);
                let mut upper = lower;
                for &v in &vertices[1..] {
                    let p = xf.transform_point(v);
                    lower = lower.min(p);
                    upper = upper.max(p);
                }
                let r = Vec2::new(*radius, *radius);
                Aabb::new(lower - r, upper + r)
            }
            Shape::Chain { .. } => self.chain_edge(child).compute_aabb(xf, 0),
        }
    }

    pub fn compute_mass_data(&self, density: f32) -> MassData {
        match self {
            Shape::Circle { center, radius } => {
                let mass = density * std::f32::consts::PI * radius * radius;
                // About the shape's own local origin, not the circle's center
                // (spec §4.2: `I = ρπr⁴/2 + m·|c|²`) — every caller (`body.rs`'s
                // `reset_mass_data`) assumes each fixture's inertia is already
                // relative to the body-local frame, then does its own single
                // parallel-axis shift to the combined center of mass.
                let inertia = mass * 0.5 * radius * radius + mass * center.dot(*center);
                MassData { mass, center: *center, inertia }
            }
            Shape::Edge { .. } | Shape::Chain { .. } => {
                // Zero mass by contract when vertex radius is zero (spec §4.2).
                MassData { mass: 0.0, center: Vec2::ZERO, inertia: 0.0 }
            }
            Shape::Polygon { vertices, .. } => polygon_mass_data(vertices, density),
        }
    }

    pub fn distance_proxy(&self, child: usize) -> DistanceProxy {
        match self {
            Shape::Circle { center, radius } => {
                DistanceProxy { vertices: vec![*center], radius: *radius }
            }
            Shape::Edge { v1, v2, radius, .. } => {
                DistanceProxy { vertices: vec![*v1, *v2], radius: *radius }
            }
            Shape::Polygon { vertices, radius, .. } => {
                DistanceProxy { vertices: vertices.clone(), radius: *radius }
            }
            Shape::Chain { .. } => self.chain_edge(child).distance_proxy(0),
        }
    }

    /// Ray-casts a single child in the shape's local frame; `p1`/`p2` and
    /// the returned fraction are expressed along the input ray.
    pub fn ray_cast(&self, p1: Vec2, p2: Vec2, max_fraction: f32, child: usize) -> Option<RayCastHit> {
        match self {
            Shape::Circle { center, radius } => ray_cast_circle(*center, *radius, p1, p2, max_fraction),
            Shape::Edge { v1, v2, .. } => ray_cast_segment(*v1, *v2, p1, p2, max_fraction),
            Shape::Polygon { vertices, normals, .. } => {
                ray_cast_polygon(vertices, normals, p1, p2, max_fraction)
            }
            Shape::Chain { .. } => self.chain_edge(child).ray_cast(p1, p2, max_fraction, 0),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RayCastHit {
    pub fraction: f32,
    pub normal: Vec2,
}

fn ray_cast_circle(center: Vec2, radius: f32, p1: Vec2, p2: Vec2, max_fraction: f32) -> Option<RayCastHit> {
    let s = p1 - center;
    let d = p2 - p1;
    let b = s.length_squared() - radius * radius;
    let rr = d.length_squared();
    if rr < crate::math::EPSILON {
        return None;
    }
    let c = s.dot(d);
    let sigma = c * c - rr * b;
    if sigma < 0.0 || rr < crate::math::EPSILON {
        return None;
    }
    let t = -(c + sigma.sqrt());
    if t < 0.0 || t > max_fraction * rr {
        return None;
    }
    let fraction = t / rr;
    let hit = s + d * fraction;
    let (normal, _) = hit.normalized();
    Some(RayCastHit { fraction, normal })
}

fn ray_cast_segment(v1: Vec2, v2: Vec2, p1: Vec2, p2: Vec2, max_fraction: f32) -> Option<RayCastHit> {
    let e = v2 - v1;
    let (normal_candidate, len) = e.perp().normalized();
    if len < crate::math::EPSILON {
        return None;
    }
    let d = p2 - p1;
    let denom = d.dot(normal_candidate);
    if denom.abs() < crate::math::EPSILON {
        return None;
    }
    let t = (v1 - p1).dot(normal_candidate) / denom;
    if t < 0.0 || t > max_fraction {
        return None;
    }
    let point = p1 + d * t;
    let s = (point - v1).dot(e) / e.length_squared();
    if !(0.0..=1.0).contains(&s) {
        return None;
    }
    let normal = if denom > 0.0 { -normal_candidate } else { normal_candidate };
    Some(RayCastHit { fraction: t, normal })
}

fn ray_cast_polygon(vertices: &[Vec2], normals: &[Vec2], p1: Vec2, p2: Vec2, max_fraction: f32) -> Option<RayCastHit> {
    let mut lower = 0.0f32;
    let mut upper = max_fraction;
    let mut index = None;
    let d = p2 - p1;

    for i in 0..vertices.len() {
        let numerator = normals[i].dot(vertices[i] - p1);
        let denominator = normals[i].dot(d);
        if denominator.abs() < crate::math::EPSILON {
            if numerator < 0.0 {
                return None;
            }
        } else if denominator < 0.0 && numerator < lower * denominator {
            lower = numerator / denominator;
            index = Some(i);
        } else if denominator > 0.0 && numerator < upper * denominator {
            upper = numerator / denominator;
        }
        if upper < lower {
            return None;
        }
    }

    index.map(|i| RayCastHit { fraction: lower, normal: normals[i] })
}

fn polygon_centroid(vertices: &[Vec2]) -> Vec2 {
    let n = vertices.len();
    let origin = vertices[0];
    let mut center = Vec2::ZERO;
    let mut area = 0.0f32;
    for i in 1..n - 1 {
        let e1 = vertices[i] - origin;
        let e2 = vertices[i + 1] - origin;
        let a = 0.5 * e1.cross(e2);
        area += a;
        center += (e1 + e2) * (a / 3.0);
    }
    if area.abs() < crate::math::EPSILON {
        return origin;
    }
    center * (1.0 / area) + origin
}

/// Signed-triangle-fan integral for area, centroid, and polar moment, per
/// spec §4.2 ("polygon mass uses signed-triangle integrals from the
/// centroid ... parallel-axis term if the centroid is off-origin").
fn polygon_mass_data(vertices: &[Vec2], density: f32) -> MassData {
    let n = vertices.len();
    let origin = vertices[0];

    let mut area = 0.0f32;
    let mut center = Vec2::ZERO;
    let mut inertia = 0.0f32;

    const INV3: f32 = 1.0 / 3.0;

    for i in 1..n - 1 {
        let e1 = vertices[i] - origin;
        let e2 = vertices[i + 1] - origin;

        let d = e1.cross(e2);
        let triangle_area = 0.5 * d;
        area += triangle_area;

        center += (e1 + e2) * (triangle_area * INV3);

        let intx2 = e1.x * e1.x + e1.x * e2.x + e2.x * e2.x;
        let inty2 = e1.y * e1.y + e1.y * e2.y + e2.y * e2.y;
        inertia += (0.25 * INV3 * d) * (intx2 + inty2);
    }

    let mass = density * area;
    let center = if area.abs() > crate::math::EPSILON { center * (1.0 / area) } else { Vec2::ZERO };
    let absolute_center = center + origin;

    // `inertia` so far is about the fan's reference vertex (`origin`), not
    // the shape's own local-frame origin. Shift it to the centroid via the
    // parallel-axis theorem, then back out to the local origin using the
    // centroid's *absolute* position — the same two-step shift Box2D's
    // `b2PolygonShape::ComputeMass` does, needed because `center` up to
    // this point is only the centroid relative to `origin` (spec §4.2).
    let mut i = density * inertia;
    i -= mass * center.dot(center);
    i += mass * absolute_center.dot(absolute_center);

    MassData { mass, center: absolute_center, inertia: i }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rejects_polygon_with_too_many_vertices() {
        let verts: Vec<Vec2> = (0..9)
            .map(|i| {
                let a = i as f32 / 9.0 * std::f32::consts::TAU;
                Vec2::new(a.cos(), a.sin())
            })
            .collect();
        assert!(Shape::polygon(verts).is_none());
    }

    #[test]
    fn rectangle_mass_matches_closed_form() {
        let hx = 2.0;
        let hy = 3.0;
        let density = 1.5;
        let shape = Shape::boxed(hx, hy);
        let data = shape.compute_mass_data(density);
        assert_relative_eq!(data.mass, 4.0 * density * hx * hy, epsilon = 1e-4);
        let expected_i = density * (8.0 * hx.powi(3) * hy + 8.0 * hx * hy.powi(3)) / 12.0;
        assert_relative_eq!(data.inertia, expected_i, epsilon = 1e-3);
        assert_relative_eq!(data.center.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(data.center.y, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn circle_mass_matches_closed_form() {
        let radius = 2.0;
        let density = 3.0;
        let center = Vec2::new(1.0, -1.0);
        let shape = Shape::circle(center, radius);
        let data = shape.compute_mass_data(density);
        let expected_mass = density * std::f32::consts::PI * radius * radius;
        assert_relative_eq!(data.mass, expected_mass, epsilon = 1e-4);
        // Inertia about the shape's local origin, not the circle's own
        // center: ρπr⁴/2 plus the parallel-axis offset m·|c|² (spec §4.2).
        let expected_i = density * std::f32::consts::PI * radius.powi(4) / 2.0 + expected_mass * center.dot(center);
        assert_relative_eq!(data.inertia, expected_i, epsilon = 1e-3);
    }

    #[test]
    fn off_center_circle_inertia_is_positive_and_matches_parallel_axis() {
        // A fixture offset far from the body-local origin must still report
        // a positive, well-formed inertia about that origin, or a body built
        // from just this one fixture would wrongly end up rotationally
        // inert (inv_inertia = 0) once `Body::reset_mass_data` applies its
        // own parallel-axis shift on top.
        let radius = 1.0;
        let density = 1.0;
        let center = Vec2::new(2.0, 0.0);
        let shape = Shape::circle(center, radius);
        let data = shape.compute_mass_data(density);
        assert!(data.inertia > 0.0);
        let about_own_center = density * std::f32::consts::PI * radius.powi(4) / 2.0;
        assert_relative_eq!(data.inertia, about_own_center + data.mass * center.dot(center), epsilon = 1e-3);
    }

    #[test]
    fn edge_has_zero_mass_with_zero_radius() {
        let shape = Shape::edge(Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0));
        let data = shape.compute_mass_data(1.0);
        assert_eq!(data.mass, 0.0);
    }

    #[test]
    fn chain_child_count_open_vs_loop() {
        let verts = vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0)];
        let open = Shape::chain(verts.clone(), false);
        let looped = Shape::chain(verts, true);
        assert_eq!(open.child_count(), 2);
        assert_eq!(looped.child_count(), 3);
    }
}
