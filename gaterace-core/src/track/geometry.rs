//! Planar helpers shared by the generator and the passage tracker.
use std::f32::consts::{PI, TAU};

use crate::numbers::usize_to_f32;

pub type Point = [f32; 2];
pub type Rotation = [[f32; 2]; 2];

/// Normalize an angle to `(-π, π]` through `atan2(sin, cos)`.
#[must_use]
pub fn wrap_angle(angle: f32) -> f32 {
    angle.sin().atan2(angle.cos())
}

/// World-to-gate rotation: row 0 is the gate's forward axis, row 1 its lateral axis.
#[must_use]
pub fn rotation_from_heading(heading: f32) -> Rotation {
    let (sin, cos) = heading.sin_cos();
    [[cos, sin], [-sin, cos]]
}

/// Express `point` in the frame anchored at `origin` with the given rotation.
#[must_use]
pub fn to_local(rotation: &Rotation, origin: Point, point: Point) -> Point {
    let dx = point[0] - origin[0];
    let dy = point[1] - origin[1];
    [
        rotation[0][0] * dx + rotation[0][1] * dy,
        rotation[1][0] * dx + rotation[1][1] * dy,
    ]
}

/// Inverse of [`to_local`].
#[must_use]
pub fn to_world(rotation: &Rotation, origin: Point, local: Point) -> Point {
    [
        origin[0] + rotation[0][0] * local[0] + rotation[1][0] * local[1],
        origin[1] + rotation[0][1] * local[0] + rotation[1][1] * local[1],
    ]
}

#[must_use]
pub fn distance(a: Point, b: Point) -> f32 {
    (b[0] - a[0]).hypot(b[1] - a[1])
}

/// Order points counter-clockwise around their centroid, yielding a star-shaped loop.
pub fn ccw_sort(points: &mut [Point]) {
    if points.is_empty() {
        return;
    }
    let count = usize_to_f32(points.len());
    let cx = points.iter().map(|p| p[0]).sum::<f32>() / count;
    let cy = points.iter().map(|p| p[1]).sum::<f32>() / count;
    points.sort_by(|a, b| {
        let angle_a = (a[1] - cy).atan2(a[0] - cx);
        let angle_b = (b[1] - cy).atan2(b[0] - cx);
        angle_a.total_cmp(&angle_b)
    });
}

/// Smallest distance between consecutive points, including the closing edge.
#[must_use]
pub fn min_loop_spacing(points: &[Point]) -> f32 {
    (0..points.len())
        .map(|i| distance(points[i], points[(i + 1) % points.len()]))
        .fold(f32::INFINITY, f32::min)
}

/// Evenly spaced loop on the circle inscribed in the unit square.
#[must_use]
pub fn regular_polygon(count: usize) -> Vec<Point> {
    let step = TAU / usize_to_f32(count.max(1));
    (0..count)
        .map(|i| {
            let angle = step * usize_to_f32(i);
            [0.5 + 0.5 * angle.cos(), 0.5 + 0.5 * angle.sin()]
        })
        .collect()
}

fn positive_angle(angle: f32) -> f32 {
    if angle >= 0.0 { angle } else { angle + TAU }
}

/// Direction of travel through each point of a closed loop.
///
/// The outgoing and incoming edge angles are blended with weight
/// `atan(edgy) / π + 0.5`; when they sit more than π apart the blend is
/// flipped by π so it stays between them.
#[must_use]
pub fn travel_headings(points: &[Point], edgy: f32) -> Vec<f32> {
    let n = points.len();
    let weight = edgy.atan() / PI + 0.5;
    let edge_angles: Vec<f32> = (0..n)
        .map(|i| {
            let from = points[i];
            let to = points[(i + 1) % n];
            positive_angle((to[1] - from[1]).atan2(to[0] - from[0]))
        })
        .collect();
    (0..n)
        .map(|i| {
            let outgoing = edge_angles[i];
            let incoming = edge_angles[(i + n - 1) % n];
            let mut blended = weight * outgoing + (1.0 - weight) * incoming;
            if (incoming - outgoing).abs() > PI {
                blended += PI;
            }
            wrap_angle(blended)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn wrap_angle_handles_wraparound() {
        assert!((wrap_angle(3.0 * PI) - PI).abs() < 1e-4 || (wrap_angle(3.0 * PI) + PI).abs() < 1e-4);
        assert!((wrap_angle(TAU + 0.25) - 0.25).abs() < EPS);
        assert!((wrap_angle(-TAU - 0.25) + 0.25).abs() < EPS);
    }

    #[test]
    fn local_and_world_round_trip_through_rotation() {
        let rotation = rotation_from_heading(0.7);
        let origin = [1.5, -2.0];
        let local = to_local(&rotation, origin, [3.0, 4.0]);
        let back = to_world(&rotation, origin, local);
        assert!((back[0] - 3.0).abs() < 1e-4 && (back[1] - 4.0).abs() < 1e-4);
    }

    #[test]
    fn zero_heading_keeps_axes() {
        let rotation = rotation_from_heading(0.0);
        let local = to_local(&rotation, [0.0, 0.0], [0.5, -0.2]);
        assert!((local[0] - 0.5).abs() < EPS);
        assert!((local[1] + 0.2).abs() < EPS);
    }

    #[test]
    fn ccw_sort_orders_by_angle() {
        let mut points = vec![[0.0, 1.0], [1.0, 0.0], [0.0, -1.0], [-1.0, 0.0]];
        ccw_sort(&mut points);
        assert_eq!(points, vec![[0.0, -1.0], [1.0, 0.0], [0.0, 1.0], [-1.0, 0.0]]);
    }

    #[test]
    fn regular_polygon_spacing_matches_chord() {
        let points = regular_polygon(6);
        let expected = (PI / 6.0).sin();
        assert!((min_loop_spacing(&points) - expected).abs() < 1e-4);
    }

    #[test]
    fn square_loop_headings_follow_corners() {
        let square = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        let headings = travel_headings(&square, 0.0);
        // Corner 1 joins an eastward edge to a northward edge.
        assert!((headings[1] - PI / 4.0).abs() < 1e-4);
        // Corner 0 joins a southward edge to an eastward edge across the 0/2π seam.
        assert!((wrap_angle(headings[0] + PI / 4.0)).abs() < 1e-4);
    }
}
