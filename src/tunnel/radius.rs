//! Radius variation along a tunnel.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Smallest radius of the random control points.
const MIN_PROFILE_RADIUS: f64 = 2.0;

/// Number of random control points between the two ends.
const CONTROL_POINTS: usize = 4;

/// Piecewise-linear radius curve over the waypoint indices of a path.
///
/// The curve starts at the first node radius, ends at the second one and
/// wanders through a few random control points in between.
#[derive(Clone, Debug)]
pub struct RadiusProfile {
    points: Vec<(f64, f64)>,
}

impl RadiusProfile {
    pub fn new(rng: &mut ChaCha8Rng, r1: i32, r2: i32, length: usize) -> Self {
        let length = length as f64;
        let max_radius = r1.max(r2) as f64;

        let mut points = vec![(0.0, r1 as f64), (length, r2 as f64)];
        for _ in 0..CONTROL_POINTS {
            let x = length * rng.gen::<f64>();
            let y = MIN_PROFILE_RADIUS + (max_radius - MIN_PROFILE_RADIUS) * rng.gen::<f64>();
            points.push((x, y));
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0));

        Self { points }
    }

    /// Radius at waypoint `index`, truncated toward zero.
    pub fn interpolate(&self, index: usize) -> i32 {
        let x = index as f64;

        for pair in self.points.windows(2) {
            let (x0, y0) = pair[0];
            let (x1, y1) = pair[1];

            if x >= x0 && x <= x1 {
                if x == x0 {
                    return y0 as i32;
                }
                if x == x1 {
                    return y1 as i32;
                }
                return (y0 + (y1 - y0) * (x - x0) / (x1 - x0)) as i32;
            }
        }

        // Past the last control point: hold the end radius.
        self.points.last().map_or(0, |p| p.1 as i32)
    }

    pub fn interpolate_clamped(&self, index: usize, min: i32, max: i32) -> i32 {
        self.interpolate(index).clamp(min, max.max(min))
    }
}
