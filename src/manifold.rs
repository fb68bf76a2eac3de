//! Narrow-phase manifold generation: per-shape-pair collision routines that
//! produce a small, persistently-keyed set of contact points.
//!
//! Grounded on the teacher's `narrowphase.rs` (`find_max_separation`,
//! `find_incident_edge`, `clip_segment_to_line`, `circle_vs_circle_manifold`,
//! `polygon_vs_polygon_manifold`) but rewritten against real `Vec2`/
//! `Transform` types instead of `(f32, f32)` tuples and local
//! `world_to_local` math, and with a feature id any two shape kinds can
//! produce (edges are just 2-vertex polygons for SAT purposes).

use smallvec::{smallvec, SmallVec};

use crate::math::{Transform, Vec2};
use crate::shapes::Shape;

pub const MAX_MANIFOLD_POINTS: usize = 2;

/// Identifies which vertex/edge pairing produced a manifold point, stable
/// across frames so the solver can warm-start accumulated impulses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContactFeature {
    pub index_a: u8,
    pub index_b: u8,
    pub type_a: u8,
    pub type_b: u8,
}

impl ContactFeature {
    pub fn key(self) -> u32 {
        (self.index_a as u32)
            | ((self.index_b as u32) << 8)
            | ((self.type_a as u32) << 16)
            | ((self.type_b as u32) << 24)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ManifoldPoint {
    /// Contact point in the reference shape's local frame.
    pub local_point: Vec2,
    pub separation: f32,
    pub feature: ContactFeature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifoldKind {
    Circles,
    FaceA,
    FaceB,
}

#[derive(Debug, Clone)]
pub struct Manifold {
    pub kind: ManifoldKind,
    pub local_normal: Vec2,
    pub local_point: Vec2,
    pub points: SmallVec<[ManifoldPoint; MAX_MANIFOLD_POINTS]>,
}

impl Manifold {
    fn empty(kind: ManifoldKind) -> Self {
        Manifold { kind, local_normal: Vec2::ZERO, local_point: Vec2::ZERO, points: SmallVec::new() }
    }
}

/// World-space contact point plus separation and the outward normal
/// (pointing from shape A toward shape B), produced by `world_manifold`.
#[derive(Debug, Clone, Copy)]
pub struct WorldPoint {
    pub point: Vec2,
    pub separation: f32,
}

pub fn world_manifold(manifold: &Manifold, xf_a: Transform, radius_a: f32, xf_b: Transform, radius_b: f32) -> (Vec2, SmallVec<[WorldPoint; MAX_MANIFOLD_POINTS]>) {
    if manifold.points.is_empty() {
        return (Vec2::ZERO, SmallVec::new());
    }

    let (normal, points): (Vec2, SmallVec<[WorldPoint; MAX_MANIFOLD_POINTS]>) = match manifold.kind {
        ManifoldKind::Circles => {
            let point_a = xf_a.transform_point(manifold.local_point);
            let point_b = xf_b.transform_point(manifold.points[0].local_point);
            let (normal, dist) = (point_b - point_a).normalized();
            let normal = if dist > crate::math::EPSILON { normal } else { Vec2::new(1.0, 0.0) };
            let cp = point_a + normal * radius_a;
            let separation = dist - radius_a - radius_b;
            (normal, smallvec![WorldPoint { point: cp, separation }])
        }
        ManifoldKind::FaceA => {
            let normal = xf_a.q.mul_vec(manifold.local_normal);
            let plane_point = xf_a.transform_point(manifold.local_point);
            let points = manifold
                .points
                .iter()
                .map(|mp| {
                    let clip = xf_b.transform_point(mp.local_point);
                    let separation = (clip - plane_point).dot(normal) - radius_a - radius_b;
                    WorldPoint { point: clip - normal * radius_b, separation }
                })
                .collect();
            (normal, points)
        }
        ManifoldKind::FaceB => {
            let normal = xf_b.q.mul_vec(manifold.local_normal);
            let plane_point = xf_b.transform_point(manifold.local_point);
            let points = manifold
                .points
                .iter()
                .map(|mp| {
                    let clip = xf_a.transform_point(mp.local_point);
                    let separation = (clip - plane_point).dot(normal) - radius_a - radius_b;
                    WorldPoint { point: clip - normal * radius_a, separation }
                })
                .collect();
            // FaceB normals point from B into A; flip so callers always see A->B.
            (-normal, points)
        }
    };

    (normal, points)
}

/// Dispatches to the right shape-pair routine. Shape kinds are normalized
/// so the polygon-vs-polygon path also handles edges (a 2-vertex polygon
/// with no interior) and single-child chain segments.
pub fn collide(shape_a: &Shape, xf_a: Transform, shape_b: &Shape, xf_b: Transform) -> Manifold {
    match (shape_a, shape_b) {
        (Shape::Circle { .. }, Shape::Circle { .. }) => collide_circles(shape_a, xf_a, shape_b, xf_b),
        (Shape::Polygon { .. } | Shape::Edge { .. }, Shape::Circle { .. }) => {
            collide_polygon_circle(shape_a, xf_a, shape_b, xf_b)
        }
        (Shape::Circle { .. }, Shape::Polygon { .. } | Shape::Edge { .. }) => {
            let mut m = collide_polygon_circle(shape_b, xf_b, shape_a, xf_a);
            m.local_normal = -m.local_normal;
            m.kind = ManifoldKind::FaceB;
            m
        }
        _ => collide_polygons(shape_a, xf_a, shape_b, xf_b),
    }
}

fn collide_circles(shape_a: &Shape, xf_a: Transform, shape_b: &Shape, xf_b: Transform) -> Manifold {
    let (center_a, radius_a) = match shape_a {
        Shape::Circle { center, radius } => (*center, *radius),
        _ => unreachable!(),
    };
    let (center_b, radius_b) = match shape_b {
        Shape::Circle { center, radius } => (*center, *radius),
        _ => unreachable!(),
    };

    let p_a = xf_a.transform_point(center_a);
    let p_b = xf_b.transform_point(center_b);
    let d = p_b - p_a;
    let dist_sq = d.length_squared();
    let sum_r = radius_a + radius_b;
    if dist_sq > sum_r * sum_r {
        return Manifold::empty(ManifoldKind::Circles);
    }

    Manifold {
        kind: ManifoldKind::Circles,
        local_normal: Vec2::ZERO,
        local_point: center_a,
        points: smallvec![ManifoldPoint {
            local_point: center_b,
            separation: d.length() - sum_r,
            feature: ContactFeature::default(),
        }],
    }
}

/// A polygon (or edge, treated as a degenerate 2-vertex polygon) against a
/// circle. Finds the polygon face closest to the circle center, then
/// classifies the center as facing the face, or one of its two vertices.
fn collide_polygon_circle(poly: &Shape, xf_poly: Transform, circle: &Shape, xf_circle: Transform) -> Manifold {
    let (center, radius_b) = match circle {
        Shape::Circle { center, radius } => (*center, *radius),
        _ => unreachable!(),
    };
    let (vertices, normals) = polygon_faces(poly);
    let radius_a = poly.vertex_radius();

    let c = xf_poly.inv_transform_point(xf_circle.transform_point(center));

    let n = vertices.len();
    let mut separation = f32::MIN;
    let mut normal_index = 0;
    for i in 0..n {
        let s = normals[i].dot(c - vertices[i]);
        if s > separation {
            separation = s;
            normal_index = i;
        }
    }

    if separation > radius_a + radius_b {
        return Manifold::empty(ManifoldKind::FaceA);
    }

    let v1 = vertices[normal_index];
    let v2 = vertices[(normal_index + 1) % n];

    if separation < crate::math::EPSILON {
        // Circle center is inside the face region: face normal applies.
        return Manifold {
            kind: ManifoldKind::FaceA,
            local_normal: normals[normal_index],
            local_point: (v1 + v2) * 0.5,
            points: smallvec![ManifoldPoint { local_point: center, separation: separation - radius_a - radius_b, feature: ContactFeature::default() }],
        };
    }

    let u1 = (c - v1).dot(v2 - v1);
    let u2 = (c - v2).dot(v1 - v2);

    if u1 <= 0.0 {
        if (c - v1).length_squared() > (radius_a + radius_b).powi(2) {
            return Manifold::empty(ManifoldKind::FaceA);
        }
        let (normal, _) = (c - v1).normalized();
        return Manifold {
            kind: ManifoldKind::FaceA,
            local_normal: normal,
            local_point: v1,
            points: smallvec![ManifoldPoint { local_point: center, separation: (c - v1).length() - radius_a - radius_b, feature: ContactFeature::default() }],
        };
    } else if u2 <= 0.0 {
        if (c - v2).length_squared() > (radius_a + radius_b).powi(2) {
            return Manifold::empty(ManifoldKind::FaceA);
        }
        let (normal, _) = (c - v2).normalized();
        return Manifold {
            kind: ManifoldKind::FaceA,
            local_normal: normal,
            local_point: v2,
            points: smallvec![ManifoldPoint { local_point: center, separation: (c - v2).length() - radius_a - radius_b, feature: ContactFeature::default() }],
        };
    } else {
        return Manifold {
            kind: ManifoldKind::FaceA,
            local_normal: normals[normal_index],
            local_point: (v1 + v2) * 0.5,
            points: smallvec![ManifoldPoint { local_point: center, separation: separation - radius_a - radius_b, feature: ContactFeature::default() }],
        };
    }
}

fn polygon_faces(shape: &Shape) -> (Vec<Vec2>, Vec<Vec2>) {
    match shape {
        Shape::Polygon { vertices, normals, .. } => (vertices.clone(), normals.clone()),
        Shape::Edge { v1, v2, .. } => {
            let edge = *v2 - *v1;
            let (n, _) = edge.perp().normalized();
            (vec![*v1, *v2], vec![n, -n])
        }
        _ => (Vec::new(), Vec::new()),
    }
}

fn find_max_separation(verts_a: &[Vec2], normals_a: &[Vec2], verts_b: &[Vec2]) -> (f32, usize) {
    let mut best_sep = f32::MIN;
    let mut best_edge = 0;
    for i in 0..verts_a.len() {
        let n = normals_a[i];
        let v1 = verts_a[i];
        let min_dot = verts_b.iter().map(|v| n.dot(*v - v1)).fold(f32::MAX, f32::min);
        if min_dot > best_sep {
            best_sep = min_dot;
            best_edge = i;
        }
    }
    (best_sep, best_edge)
}

fn find_incident_edge(verts_b: &[Vec2], normals_b: &[Vec2], ref_normal: Vec2) -> usize {
    let mut best_dot = f32::MAX;
    let mut best_edge = 0;
    for (i, n) in normals_b.iter().enumerate() {
        let d = n.dot(ref_normal);
        if d < best_dot {
            best_dot = d;
            best_edge = i;
        }
    }
    best_edge
}

fn clip_segment_to_line(points: [(Vec2, ContactFeature); 2], line_point: Vec2, normal: Vec2, clip_edge: u8) -> Option<[(Vec2, ContactFeature); 2]> {
    let d0 = normal.dot(points[0].0 - line_point);
    let d1 = normal.dot(points[1].0 - line_point);

    let mut out = Vec::with_capacity(2);
    if d0 <= 0.0 {
        out.push(points[0]);
    }
    if d1 <= 0.0 {
        out.push(points[1]);
    }
    if d0 * d1 < 0.0 {
        let t = d0 / (d0 - d1);
        let p = points[0].0 + (points[1].0 - points[0].0) * t;
        let mut feature = if d0 > 0.0 { points[0].1 } else { points[1].1 };
        feature.index_a = clip_edge;
        out.push((p, feature));
    }

    if out.len() < 2 {
        None
    } else {
        Some([out[0], out[1]])
    }
}

/// SAT separating-axis search on both polygons followed by Sutherland-
/// Hodgman-style clipping of the incident face against the reference
/// face's side planes, per the teacher's `polygon_vs_polygon_manifold`.
fn collide_polygons(shape_a: &Shape, xf_a: Transform, shape_b: &Shape, xf_b: Transform) -> Manifold {
    let (verts_a_local, normals_a_local) = polygon_faces(shape_a);
    let (verts_b_local, normals_b_local) = polygon_faces(shape_b);
    if verts_a_local.len() < 2 || verts_b_local.len() < 2 {
        return Manifold::empty(ManifoldKind::FaceA);
    }
    let radius_a = shape_a.vertex_radius();
    let radius_b = shape_b.vertex_radius();

    let rel = xf_a.inv_mul(xf_b);
    let verts_b: Vec<Vec2> = verts_b_local.iter().map(|v| rel.transform_point(*v)).collect();
    let normals_b: Vec<Vec2> = normals_b_local.iter().map(|n| rel.q.mul_vec(*n)).collect();

    let (sep_a, edge_a) = find_max_separation(&verts_a_local, &normals_a_local, &verts_b);

    let rel_ba = xf_b.inv_mul(xf_a);
    let verts_a_in_b: Vec<Vec2> = verts_a_local.iter().map(|v| rel_ba.transform_point(*v)).collect();
    let (sep_b, edge_b) = find_max_separation(&verts_b_local, &normals_b_local, &verts_a_in_b);

    if sep_a > radius_a + radius_b || sep_b > radius_a + radius_b {
        return Manifold::empty(ManifoldKind::FaceA);
    }

    let (reference_is_a, ref_verts, ref_normals, ref_edge, inc_verts, inc_normals) = if sep_b > sep_a + 0.1 * crate::math::EPSILON.max(1e-4) {
        (false, &verts_b, &normals_b, edge_b, &verts_a_local, &normals_a_local)
    } else {
        (true, &verts_a_local, &normals_a_local, edge_a, &verts_b, &normals_b)
    };

    let ref_normal = ref_normals[ref_edge];
    let n = ref_verts.len();
    let v1 = ref_verts[ref_edge];
    let v2 = ref_verts[(ref_edge + 1) % n];

    let incident_edge = find_incident_edge(inc_verts, inc_normals, ref_normal);
    let m = inc_verts.len();
    let i1 = incident_edge;
    let i2 = (incident_edge + 1) % m;

    let mut points = [
        (
            inc_verts[i1],
            ContactFeature { index_a: ref_edge as u8, index_b: i1 as u8, type_a: 0, type_b: 1 },
        ),
        (
            inc_verts[i2],
            ContactFeature { index_a: ref_edge as u8, index_b: i2 as u8, type_a: 0, type_b: 1 },
        ),
    ];

    let tangent = (v2 - v1).normalized().0;
    let side1 = -tangent;
    let side2 = tangent;

    let Some(clipped) = clip_segment_to_line(points, v1, side1, incident_edge as u8) else {
        return Manifold::empty(ManifoldKind::FaceA);
    };
    points = clipped;
    let Some(clipped) = clip_segment_to_line(points, v2, side2, incident_edge as u8) else {
        return Manifold::empty(ManifoldKind::FaceA);
    };
    points = clipped;

    let mut out_points: SmallVec<[ManifoldPoint; MAX_MANIFOLD_POINTS]> = SmallVec::new();
    for (p, feature) in points {
        let sep = ref_normal.dot(p - v1);
        if sep <= radius_a + radius_b {
            out_points.push(ManifoldPoint { local_point: p, separation: sep - radius_a - radius_b, feature });
        }
    }

    if out_points.is_empty() {
        return Manifold::empty(ManifoldKind::FaceA);
    }

    // `ref_normal`/`v1`/`v2` live in A's local frame regardless of which
    // polygon is the reference face, since that's the frame the incident-edge
    // search and clipping above share with `inc_verts`. `world_manifold`
    // expects FaceA data in A's frame but FaceB data in B's own local frame
    // (the same convention the circle-vs-polygon path produces), so when B
    // won the reference, rotate/translate the plane data back out of A's
    // frame and into B's via `rel`'s inverse before storing it.
    let (local_normal, local_point) = if reference_is_a {
        (ref_normal, (v1 + v2) * 0.5)
    } else {
        (rel.q.inv_mul_vec(ref_normal), rel.inv_transform_point((v1 + v2) * 0.5))
    };

    Manifold {
        kind: if reference_is_a { ManifoldKind::FaceA } else { ManifoldKind::FaceB },
        local_normal,
        local_point,
        points: out_points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Rot;

    #[test]
    fn circles_overlapping_produce_one_point() {
        let a = Shape::circle(Vec2::ZERO, 1.0);
        let b = Shape::circle(Vec2::ZERO, 1.0);
        let xf_a = Transform::IDENTITY;
        let xf_b = Transform::new(Vec2::new(1.5, 0.0), Rot::IDENTITY);
        let m = collide(&a, xf_a, &b, xf_b);
        assert_eq!(m.points.len(), 1);
        assert!(m.points[0].separation < 0.0);
    }

    #[test]
    fn circles_separated_produce_no_points() {
        let a = Shape::circle(Vec2::ZERO, 1.0);
        let b = Shape::circle(Vec2::ZERO, 1.0);
        let xf_a = Transform::IDENTITY;
        let xf_b = Transform::new(Vec2::new(3.0, 0.0), Rot::IDENTITY);
        let m = collide(&a, xf_a, &b, xf_b);
        assert!(m.points.is_empty());
    }

    #[test]
    fn boxes_resting_edge_to_edge_produce_two_points() {
        let a = Shape::boxed(1.0, 1.0);
        let b = Shape::boxed(1.0, 1.0);
        let xf_a = Transform::IDENTITY;
        let xf_b = Transform::new(Vec2::new(0.0, 1.9), Rot::IDENTITY);
        let m = collide(&a, xf_a, &b, xf_b);
        assert_eq!(m.points.len(), 2);
    }

    #[test]
    fn box_vs_circle_corner_case_has_one_point() {
        let a = Shape::boxed(1.0, 1.0);
        let b = Shape::circle(Vec2::ZERO, 0.5);
        let xf_a = Transform::IDENTITY;
        let xf_b = Transform::new(Vec2::new(1.3, 1.3), Rot::IDENTITY);
        let m = collide(&a, xf_a, &b, xf_b);
        assert_eq!(m.points.len(), 1);
    }

    #[test]
    fn rotated_box_resting_on_flat_ground_keeps_reference_normal_in_grounds_frame() {
        // A is the small, 45-degree-rotated body; B is the large flat ground
        // box, positioned so the SAT search picks B's face as the reference
        // (`reference_is_a == false`). That's the path whose `local_normal`/
        // `local_point` used to stay in A's frame despite being tagged
        // `FaceB`, which `world_manifold` reconstructs using `xf_b`.
        let a = Shape::boxed(0.5, 0.5);
        let xf_a = Transform::new(Vec2::new(3.0, 2.45), Rot::from_angle(std::f32::consts::FRAC_PI_4));
        let b = Shape::boxed(10.0, 2.0);
        let xf_b = Transform::new(Vec2::new(3.0, 0.0), Rot::IDENTITY);

        let m = collide(&a, xf_a, &b, xf_b);
        assert_eq!(m.kind, ManifoldKind::FaceB);
        assert!(!m.points.is_empty());

        // `local_normal` should be B's own top-face normal, (0, 1) in B's
        // local frame -- independent of A's rotation. A frame mix-up would
        // instead leave it as that normal expressed in A's rotated frame.
        use approx::assert_relative_eq;
        assert_relative_eq!(m.local_normal.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(m.local_normal.y, 1.0, epsilon = 1e-4);

        let (normal, _points) = world_manifold(&m, xf_a, a.vertex_radius(), xf_b, b.vertex_radius());
        // A sits above B, so the A-into-B contact normal points straight
        // down; since B is axis-aligned this should be exact, not merely
        // rotated-looking.
        assert_relative_eq!(normal.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(normal.y, -1.0, epsilon = 1e-4);
    }
}
