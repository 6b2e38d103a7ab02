//! Transit curve generation for ship routes (spec §4.3): single-leg Bezier and Hohmann arcs,
//! stitched into a composite multi-leg polyline with a shared time-parameterized `point`/
//! `tangent` interface.

use std::cell::RefCell;
use std::f64::consts::{PI, TAU};

use orbitmap_core::vector::Vector2;

/// Minimum angular sweep for a Hohmann arc, so near-aligned endpoints still render visibly.
pub const MIN_SWEEP_RAD: f64 = 0.05;

pub const BEZIER_SAMPLES: usize = 128;
pub const HOHMANN_SAMPLES: usize = 96;
pub const COMPOSITE_BEZIER_SAMPLES: usize = 65;
pub const COMPOSITE_HOHMANN_SAMPLES: usize = 97;

const TANGENT_EPS: f64 = 0.003;

/// A renderable, time-parameterized transit path. `t` ranges over `[0, 1]`, a fraction of the
/// path's total time of flight rather than arc length.
pub trait Curve {
    fn point(&self, t: f64) -> Vector2;
    fn tangent(&self, t: f64) -> Vector2;
    fn length(&self) -> f64;
    /// Pin the curve's endpoints to their current live positions without regenerating it
    /// (spec §4.3 Warp): every sampled point is nudged by a blend of the start/end deltas
    /// weighted by its own time fraction.
    fn warp(&mut self, live_start: Vector2, live_end: Vector2);
}

/// Largest index `i` with `arr[i] <= x`, clamped so `i + 1` is always a valid index.
fn bracket(arr: &[f64], x: f64) -> usize {
    debug_assert!(arr.len() >= 2);
    match arr.binary_search_by(|v| v.partial_cmp(&x).unwrap()) {
        Ok(i) => i.min(arr.len() - 2),
        Err(0) => 0,
        Err(i) => (i - 1).min(arr.len() - 2),
    }
}

struct SampleCache {
    points: Vec<Vector2>,
    cum_dist: Vec<f64>,
}

/// The sampled-polyline machinery shared by every curve kind: a base (unwarped) sample set
/// paired with the time-fraction each sample was taken at, plus the additive warp currently
/// applied on top.
struct Polyline {
    base: Vec<Vector2>,
    fracs: Vec<f64>,
    delta_start: Vector2,
    delta_end: Vector2,
    cache: RefCell<Option<SampleCache>>,
}

impl Polyline {
    fn new(base: Vec<Vector2>, fracs: Vec<f64>) -> Self {
        assert_eq!(base.len(), fracs.len());
        assert!(base.len() >= 2);
        Polyline {
            base,
            fracs,
            delta_start: Vector2::ZERO,
            delta_end: Vector2::ZERO,
            cache: RefCell::new(None),
        }
    }

    fn warp(&mut self, live_start: Vector2, live_end: Vector2) {
        let orig_start = self.base[0];
        let orig_end = *self.base.last().unwrap();
        self.delta_start = live_start.sub(orig_start);
        self.delta_end = live_end.sub(orig_end);
        *self.cache.borrow_mut() = None;
    }

    fn with_cache<R>(&self, f: impl FnOnce(&[Vector2], &[f64]) -> R) -> R {
        {
            let mut slot = self.cache.borrow_mut();
            if slot.is_none() {
                let points: Vec<Vector2> = self
                    .base
                    .iter()
                    .zip(&self.fracs)
                    .map(|(p, &frac)| {
                        p.add(self.delta_start.scale(1.0 - frac)).add(self.delta_end.scale(frac))
                    })
                    .collect();
                let mut cum_dist = Vec::with_capacity(points.len());
                cum_dist.push(0.0);
                for window in points.windows(2) {
                    let prev = *cum_dist.last().unwrap();
                    cum_dist.push(prev + window[1].sub(window[0]).norm());
                }
                *slot = Some(SampleCache { points, cum_dist });
            }
        }
        let slot = self.cache.borrow();
        let cache = slot.as_ref().unwrap();
        f(&cache.points, &cache.cum_dist)
    }

    /// `point(t)`: locate `t` among the recorded fracs, linearly interpolate to a target
    /// cumulative distance, then interpolate position by that distance (spec §4.3).
    fn point_at_frac(&self, t: f64) -> Vector2 {
        let t = t.clamp(0.0, 1.0);
        self.with_cache(|points, cum_dist| {
            let idx = bracket(&self.fracs, t);
            let (f0, f1) = (self.fracs[idx], self.fracs[idx + 1]);
            let local = if f1 > f0 { (t - f0) / (f1 - f0) } else { 0.0 };
            let target_dist = cum_dist[idx] + local * (cum_dist[idx + 1] - cum_dist[idx]);

            let didx = bracket(cum_dist, target_dist);
            let (d0, d1) = (cum_dist[didx], cum_dist[didx + 1]);
            let dlocal = if d1 > d0 { (target_dist - d0) / (d1 - d0) } else { 0.0 };
            points[didx].lerp(points[didx + 1], dlocal)
        })
    }

    fn tangent_central_diff(&self, t: f64) -> Vector2 {
        let lo = (t - TANGENT_EPS).max(0.0);
        let hi = (t + TANGENT_EPS).min(1.0);
        if hi <= lo {
            return Vector2::ZERO;
        }
        self.point_at_frac(hi).sub(self.point_at_frac(lo)).unit()
    }

    fn length(&self) -> f64 {
        self.with_cache(|_, cum_dist| *cum_dist.last().unwrap())
    }
}

fn uniform_fracs(n: usize) -> Vec<f64> {
    (0..n).map(|i| i as f64 / (n - 1) as f64).collect()
}

fn cubic_bezier(p0: Vector2, p1: Vector2, p2: Vector2, p3: Vector2, t: f64) -> Vector2 {
    let mt = 1.0 - t;
    p0.scale(mt * mt * mt)
        .add(p1.scale(3.0 * mt * mt * t))
        .add(p2.scale(3.0 * mt * t * t))
        .add(p3.scale(t * t * t))
}

/// A cubic Bezier transit curve between two local-orbit or same-primary endpoints.
pub struct BezierCurve {
    polyline: Polyline,
}

impl BezierCurve {
    pub fn new(p0: Vector2, p1: Vector2, p2: Vector2, p3: Vector2) -> Self {
        Self::with_sample_count(p0, p1, p2, p3, BEZIER_SAMPLES)
    }

    pub fn with_sample_count(p0: Vector2, p1: Vector2, p2: Vector2, p3: Vector2, n: usize) -> Self {
        let n = n.max(2);
        let fracs = uniform_fracs(n);
        let base = fracs.iter().map(|&t| cubic_bezier(p0, p1, p2, p3, t)).collect();
        BezierCurve { polyline: Polyline::new(base, fracs) }
    }

    /// Control points for a tangent-matched Bezier between two points orbiting a shared body,
    /// bending perpendicular to the chord by `bend_fraction` of the chord length, signed by
    /// whether the hop is ascending (outward) or descending (inward) in radius.
    pub fn orbital_tangent_control_points(
        from: Vector2,
        to: Vector2,
        from_tangent: Vector2,
        to_tangent: Vector2,
        ascending: bool,
    ) -> (Vector2, Vector2, Vector2, Vector2) {
        let chord = to.sub(from);
        let chord_len = chord.norm();
        let handle_len = chord_len * 0.35;
        let bend_sign = if ascending { 1.0 } else { -1.0 };
        let bend = chord.perpendicular().unit().scale(chord_len * 0.12 * bend_sign);
        let p1 = from.add(from_tangent.unit().scale(handle_len)).add(bend);
        let p2 = to.sub(to_tangent.unit().scale(handle_len)).add(bend);
        (from, p1, p2, to)
    }
}

impl Curve for BezierCurve {
    fn point(&self, t: f64) -> Vector2 {
        self.polyline.point_at_frac(t)
    }

    fn tangent(&self, t: f64) -> Vector2 {
        self.polyline.tangent_central_diff(t)
    }

    fn length(&self) -> f64 {
        self.polyline.length()
    }

    fn warp(&mut self, live_start: Vector2, live_end: Vector2) {
        self.polyline.warp(live_start, live_end);
    }
}

/// Normalize `b - a` into `(-PI, PI]`, the shorter angular path from `a` to `b`.
fn shortest_angle_diff(a: f64, b: f64) -> f64 {
    let mut d = (b - a) % TAU;
    if d > PI {
        d -= TAU;
    }
    if d <= -PI {
        d += TAU;
    }
    d
}

/// A Hohmann half-ellipse transit curve around a shared primary (the Sun, for interplanetary
/// legs).
pub struct HohmannArcCurve {
    polyline: Polyline,
    sweep: f64,
}

impl HohmannArcCurve {
    pub fn new(from: Vector2, to: Vector2, primary: Vector2) -> Self {
        Self::with_sample_count(from, to, primary, HOHMANN_SAMPLES)
    }

    pub fn with_sample_count(from: Vector2, to: Vector2, primary: Vector2, n: usize) -> Self {
        let n = n.max(2);
        let r1 = from.sub(primary).norm();
        let r2 = to.sub(primary).norm();
        let theta1 = from.sub(primary).angle();
        let theta2 = to.sub(primary).angle();

        let mut sweep = shortest_angle_diff(theta1, theta2);
        if sweep.abs() < MIN_SWEEP_RAD {
            sweep = if sweep < 0.0 { -MIN_SWEEP_RAD } else { MIN_SWEEP_RAD };
        }

        let a = 0.5 * (r1 + r2);
        let e = if r1 + r2 > 0.0 { (r2 - r1).abs() / (r2 + r1) } else { 0.0 };
        let p = a * (1.0 - e * e);
        let (nu_start, nu_end) = if r1 <= r2 { (0.0, PI) } else { (PI, TAU) };

        let fracs = uniform_fracs(n);
        let base = fracs
            .iter()
            .map(|&t| {
                let nu = nu_start + t * (nu_end - nu_start);
                let r = p / (1.0 + e * nu.cos());
                let angle = theta1 + t * sweep;
                primary.add(Vector2::from_polar(angle, r))
            })
            .collect();

        HohmannArcCurve { polyline: Polyline::new(base, fracs), sweep }
    }

    /// The signed angular sweep of this arc, in `(-PI, PI]` with magnitude `>= MIN_SWEEP_RAD`.
    pub fn sweep(&self) -> f64 {
        self.sweep
    }
}

impl Curve for HohmannArcCurve {
    fn point(&self, t: f64) -> Vector2 {
        self.polyline.point_at_frac(t)
    }

    fn tangent(&self, t: f64) -> Vector2 {
        self.polyline.tangent_central_diff(t)
    }

    fn length(&self) -> f64 {
        self.polyline.length()
    }

    fn warp(&mut self, live_start: Vector2, live_end: Vector2) {
        self.polyline.warp(live_start, live_end);
    }
}

/// One leg's contribution to a `CompositeCurve`: its own curve, time of flight, and the sample
/// density to take from it (spec §4.3: 65 points for a Bezier leg, 97 for a Hohmann arc leg).
pub struct CompositeLeg {
    pub curve: Box<dyn Curve + Send>,
    pub tof_s: f64,
    pub sample_count: usize,
}

/// A multi-leg route's concatenated, time-parameterized path.
pub struct CompositeCurve {
    polyline: Polyline,
    leg_bounds: Vec<(f64, f64)>,
}

impl CompositeCurve {
    pub fn new(legs: Vec<CompositeLeg>) -> Self {
        assert!(!legs.is_empty(), "composite curve needs at least one leg");
        let total_tof: f64 = legs.iter().map(|leg| leg.tof_s).sum();
        assert!(total_tof > 0.0, "composite curve needs positive total time of flight");

        let mut base = Vec::new();
        let mut fracs = Vec::new();
        let mut leg_bounds = Vec::with_capacity(legs.len());
        let mut finished = 0.0_f64;

        for (i, leg) in legs.iter().enumerate() {
            let n = leg.sample_count.max(2);
            let start_frac = finished / total_tof;
            for j in 0..n {
                if i > 0 && j == 0 {
                    // Drop the duplicate join point shared with the previous leg's last sample.
                    continue;
                }
                let local_t = j as f64 / (n - 1) as f64;
                let p = leg.curve.point(local_t);
                let frac = (finished + local_t * leg.tof_s) / total_tof;
                base.push(p);
                fracs.push(frac);
            }
            finished += leg.tof_s;
            let end_frac = finished / total_tof;
            leg_bounds.push((start_frac, end_frac));
        }

        CompositeCurve { polyline: Polyline::new(base, fracs), leg_bounds }
    }

    /// Each leg's `[start_frac, end_frac]` span of the overall `[0, 1]` time parameter.
    pub fn leg_bounds(&self) -> &[(f64, f64)] {
        &self.leg_bounds
    }
}

impl Curve for CompositeCurve {
    fn point(&self, t: f64) -> Vector2 {
        self.polyline.point_at_frac(t)
    }

    fn tangent(&self, t: f64) -> Vector2 {
        self.polyline.tangent_central_diff(t)
    }

    fn length(&self) -> f64 {
        self.polyline.length()
    }

    fn warp(&mut self, live_start: Vector2, live_end: Vector2) {
        self.polyline.warp(live_start, live_end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bezier_endpoints_match_control_points() {
        let p0 = Vector2::new(0.0, 0.0);
        let p3 = Vector2::new(10.0, 5.0);
        let curve = BezierCurve::new(p0, Vector2::new(2.0, 4.0), Vector2::new(8.0, 4.0), p3);
        assert!((curve.point(0.0).x - p0.x).abs() < 1e-6);
        assert!((curve.point(0.0).y - p0.y).abs() < 1e-6);
        assert!((curve.point(1.0).x - p3.x).abs() < 1e-6);
        assert!((curve.point(1.0).y - p3.y).abs() < 1e-6);
    }

    #[test]
    fn bezier_length_is_nonzero_and_cum_dist_monotonic() {
        let curve = BezierCurve::new(
            Vector2::new(0.0, 0.0),
            Vector2::new(2.0, 6.0),
            Vector2::new(8.0, 6.0),
            Vector2::new(10.0, 0.0),
        );
        assert!(curve.length() > 0.0);
        let mut prev = curve.point(0.0);
        let mut prev_t = 0.0;
        for i in 1..=20 {
            let t = i as f64 / 20.0;
            let p = curve.point(t);
            // Distance walked should never make the path retreat to exactly its start.
            assert!(p.sub(prev).norm() >= 0.0);
            prev = p;
            prev_t = t;
        }
        let _ = prev_t;
    }

    #[test]
    fn hohmann_sweep_is_bounded_between_min_and_pi() {
        let sun = Vector2::ZERO;
        let from = Vector2::from_polar(0.0, 100.0);
        let to = Vector2::from_polar(0.01, 200.0);
        let curve = HohmannArcCurve::new(from, to, sun);
        assert!(curve.sweep().abs() >= MIN_SWEEP_RAD);
        assert!(curve.sweep().abs() <= PI);
    }

    #[test]
    fn hohmann_endpoints_touch_their_rings() {
        let sun = Vector2::ZERO;
        let from = Vector2::from_polar(0.0, 100.0);
        let to = Vector2::from_polar(PI * 0.5, 300.0);
        let curve = HohmannArcCurve::new(from, to, sun);
        assert!((curve.point(0.0).sub(sun).norm() - 100.0).abs() < 1e-6);
        assert!((curve.point(1.0).sub(sun).norm() - 300.0).abs() < 1e-6);
    }

    #[test]
    fn warp_pins_endpoints_to_live_positions() {
        let mut curve = BezierCurve::new(
            Vector2::new(0.0, 0.0),
            Vector2::new(2.0, 6.0),
            Vector2::new(8.0, 6.0),
            Vector2::new(10.0, 0.0),
        );
        let live_start = Vector2::new(1.0, 1.0);
        let live_end = Vector2::new(12.0, -2.0);
        curve.warp(live_start, live_end);
        assert!((curve.point(0.0).x - live_start.x).abs() < 1e-6);
        assert!((curve.point(0.0).y - live_start.y).abs() < 1e-6);
        assert!((curve.point(1.0).x - live_end.x).abs() < 1e-6);
        assert!((curve.point(1.0).y - live_end.y).abs() < 1e-6);
    }

    fn straight_leg(from: Vector2, to: Vector2) -> BezierCurve {
        let mid = from.lerp(to, 0.5);
        BezierCurve::with_sample_count(from, mid, mid, to, 8)
    }

    #[test]
    fn composite_leg_bounds_are_disjoint_and_cover_unit_interval() {
        let leg_a = straight_leg(Vector2::new(0.0, 0.0), Vector2::new(10.0, 0.0));
        let leg_b = straight_leg(Vector2::new(10.0, 0.0), Vector2::new(10.0, 10.0));
        let composite = CompositeCurve::new(vec![
            CompositeLeg { curve: Box::new(leg_a), tof_s: 100.0, sample_count: COMPOSITE_BEZIER_SAMPLES },
            CompositeLeg { curve: Box::new(leg_b), tof_s: 50.0, sample_count: COMPOSITE_BEZIER_SAMPLES },
        ]);
        let bounds = composite.leg_bounds();
        assert_eq!(bounds.len(), 2);
        assert!((bounds[0].0 - 0.0).abs() < 1e-9);
        assert!((bounds[0].1 - bounds[1].0).abs() < 1e-9);
        assert!((bounds[1].1 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn composite_point_at_zero_and_one_match_first_and_last_leg_endpoints() {
        let leg_a = straight_leg(Vector2::new(0.0, 0.0), Vector2::new(10.0, 0.0));
        let leg_b = straight_leg(Vector2::new(10.0, 0.0), Vector2::new(10.0, 10.0));
        let composite = CompositeCurve::new(vec![
            CompositeLeg { curve: Box::new(leg_a), tof_s: 100.0, sample_count: COMPOSITE_BEZIER_SAMPLES },
            CompositeLeg { curve: Box::new(leg_b), tof_s: 50.0, sample_count: COMPOSITE_BEZIER_SAMPLES },
        ]);
        assert!(composite.point(0.0).sub(Vector2::new(0.0, 0.0)).norm() < 1e-6);
        assert!(composite.point(1.0).sub(Vector2::new(10.0, 10.0)).norm() < 1e-6);
    }

    #[test]
    fn composite_length_is_positive_and_finite() {
        let leg_a = straight_leg(Vector2::new(0.0, 0.0), Vector2::new(10.0, 0.0));
        let composite = CompositeCurve::new(vec![CompositeLeg {
            curve: Box::new(leg_a),
            tof_s: 10.0,
            sample_count: COMPOSITE_BEZIER_SAMPLES,
        }]);
        assert!(composite.length() > 0.0);
        assert!(composite.length().is_finite());
    }
}
