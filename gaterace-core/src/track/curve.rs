//! Cubic Bezier fitting through a closed gate loop.
use serde::{Deserialize, Serialize};

use super::geometry::{Point, distance};
use crate::numbers::{u32_to_usize, usize_to_f32};

/// Cubic Bezier interpolation.
#[must_use]
pub fn bezier3(p0: Point, p1: Point, p2: Point, p3: Point, t: f32) -> Point {
    let t2 = t * t;
    let t3 = t2 * t;
    let mt = 1.0 - t;
    let mt2 = mt * mt;
    let mt3 = mt2 * mt;
    let blend = |axis: usize| {
        p0[axis] * mt3 + p1[axis] * (3.0 * mt2 * t) + p2[axis] * (3.0 * mt * t2) + p3[axis] * t3
    };
    [blend(0), blend(1)]
}

/// Control polygon of the segment leaving `from` and arriving at `to`.
///
/// Handles extend `rad * |to - from|` along the travel headings at both ends.
#[must_use]
pub fn segment_controls(
    from: Point,
    from_heading: f32,
    to: Point,
    to_heading: f32,
    rad: f32,
) -> [Point; 4] {
    let reach = rad * distance(from, to);
    let (sin_a, cos_a) = from_heading.sin_cos();
    let (sin_b, cos_b) = to_heading.sin_cos();
    [
        from,
        [from[0] + reach * cos_a, from[1] + reach * sin_a],
        [to[0] - reach * cos_b, to[1] - reach * sin_b],
        to,
    ]
}

/// Sample a closed loop: `samples_per_segment` points per edge, each segment
/// starting exactly on its gate and stopping short of the next one.
#[must_use]
pub fn sample_loop(
    points: &[Point],
    travel_headings: &[f32],
    rad: f32,
    samples_per_segment: u32,
) -> Vec<Point> {
    let n = points.len();
    let per_segment = u32_to_usize(samples_per_segment);
    let mut out = Vec::with_capacity(n * per_segment);
    for i in 0..n {
        let j = (i + 1) % n;
        let [p0, p1, p2, p3] =
            segment_controls(points[i], travel_headings[i], points[j], travel_headings[j], rad);
        for k in 0..per_segment {
            let t = usize_to_f32(k) / usize_to_f32(per_segment);
            out.push(bezier3(p0, p1, p2, p3, t));
        }
    }
    out
}

/// Dense, padded curve samples for a batch of slots.
///
/// Row `e` holds `counts[e]` valid points followed by zero padding up to
/// `capacity`. Rows for slots that were not requested stay empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledCurve {
    capacity: usize,
    points: Vec<Point>,
    counts: Vec<u32>,
}

impl SampledCurve {
    pub(crate) fn new(num_slots: usize, capacity: usize) -> Self {
        Self {
            capacity,
            points: vec![[0.0, 0.0]; num_slots * capacity],
            counts: vec![0; num_slots],
        }
    }

    pub(crate) fn write_row(&mut self, slot: usize, samples: &[Point]) {
        let row = &mut self.points[slot * self.capacity..(slot + 1) * self.capacity];
        let used = samples.len().min(self.capacity);
        row[..used].copy_from_slice(&samples[..used]);
        row[used..].fill([0.0, 0.0]);
        self.counts[slot] = crate::numbers::usize_to_u32(used);
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn num_slots(&self) -> usize {
        self.counts.len()
    }

    /// Valid samples for `slot`.
    #[must_use]
    pub fn points(&self, slot: usize) -> &[Point] {
        let start = slot * self.capacity;
        &self.points[start..start + u32_to_usize(self.counts[slot])]
    }

    /// Full padded row for `slot`.
    #[must_use]
    pub fn padded_points(&self, slot: usize) -> &[Point] {
        &self.points[slot * self.capacity..(slot + 1) * self.capacity]
    }

    #[must_use]
    pub fn count(&self, slot: usize) -> u32 {
        self.counts[slot]
    }
}
