//! Elliptical arc to cubic bezier conversion (endpoint parameterization,
//! SVG implementation notes F.6.5).

use glam::DVec2;
use std::f64::consts::{FRAC_PI_2, TAU};

/// One cubic segment: first control, second control, end point
pub type CubicSegment = (DVec2, DVec2, DVec2);

/// Arc flags and radii as written in path data
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArcParams {
    pub radii: DVec2,
    pub x_axis_rotation: f64,
    pub large_arc: bool,
    pub sweep: bool,
}

/// Approximate the arc from `from` to `to` with cubics of at most 90°.
///
/// A zero radius degenerates to a straight segment and coincident endpoints
/// produce nothing.
pub fn arc_to_cubics(from: DVec2, to: DVec2, arc: ArcParams) -> Vec<CubicSegment> {
    if from == to {
        return Vec::new();
    }
    let mut rx = arc.radii.x.abs();
    let mut ry = arc.radii.y.abs();
    if rx < f64::EPSILON || ry < f64::EPSILON {
        return vec![(from, to, to)];
    }

    let phi = arc.x_axis_rotation.to_radians();
    let (sin_phi, cos_phi) = phi.sin_cos();

    // Endpoint midpoint in the rotated frame
    let half = (from - to) / 2.0;
    let x1p = cos_phi * half.x + sin_phi * half.y;
    let y1p = -sin_phi * half.x + cos_phi * half.y;

    // Grow radii that cannot span the endpoints
    let lambda = (x1p * x1p) / (rx * rx) + (y1p * y1p) / (ry * ry);
    if lambda > 1.0 {
        let scale = lambda.sqrt();
        rx *= scale;
        ry *= scale;
    }

    let rx2 = rx * rx;
    let ry2 = ry * ry;
    let denom = rx2 * y1p * y1p + ry2 * x1p * x1p;
    if denom.abs() < f64::EPSILON {
        return vec![(from, to, to)];
    }
    let numer = (rx2 * ry2 - rx2 * y1p * y1p - ry2 * x1p * x1p).max(0.0);
    let sign = if arc.large_arc == arc.sweep { -1.0 } else { 1.0 };
    let coef = sign * (numer / denom).sqrt();
    let cxp = coef * (rx * y1p / ry);
    let cyp = coef * (-ry * x1p / rx);

    let mid = (from + to) / 2.0;
    let center = DVec2::new(
        cos_phi * cxp - sin_phi * cyp + mid.x,
        sin_phi * cxp + cos_phi * cyp + mid.y,
    );

    let u = DVec2::new((x1p - cxp) / rx, (y1p - cyp) / ry);
    let v = DVec2::new((-x1p - cxp) / rx, (-y1p - cyp) / ry);
    let theta1 = u.y.atan2(u.x);
    let mut delta = u.perp_dot(v).atan2(u.dot(v));
    if !arc.sweep && delta > 0.0 {
        delta -= TAU;
    } else if arc.sweep && delta < 0.0 {
        delta += TAU;
    }

    let segments = ((delta.abs() / FRAC_PI_2).ceil() as usize).max(1);
    let step = delta / segments as f64;
    let k = 4.0 / 3.0 * (step / 4.0).tan();

    let on_ellipse = |unit: DVec2| {
        DVec2::new(
            center.x + cos_phi * rx * unit.x - sin_phi * ry * unit.y,
            center.y + sin_phi * rx * unit.x + cos_phi * ry * unit.y,
        )
    };

    (0..segments)
        .map(|i| {
            let t0 = theta1 + step * i as f64;
            let t1 = t0 + step;
            let (s0, c0) = t0.sin_cos();
            let (s1, c1) = t1.sin_cos();
            let c1_unit = DVec2::new(c0 - k * s0, s0 + k * c0);
            let c2_unit = DVec2::new(c1 + k * s1, s1 - k * c1);
            let end = if i + 1 == segments {
                to
            } else {
                on_ellipse(DVec2::new(c1, s1))
            };
            (on_ellipse(c1_unit), on_ellipse(c2_unit), end)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(r: f64, large_arc: bool, sweep: bool) -> ArcParams {
        ArcParams {
            radii: DVec2::splat(r),
            x_axis_rotation: 0.0,
            large_arc,
            sweep,
        }
    }

    #[test]
    fn half_circle_is_two_quarter_segments() {
        let cubics = arc_to_cubics(DVec2::new(-1.0, 0.0), DVec2::new(1.0, 0.0), params(1.0, true, false));
        assert_eq!(cubics.len(), 2);
        assert_eq!(cubics[1].2, DVec2::new(1.0, 0.0));
        // Sweep 0 runs through decreasing angles: π, π/2, 0
        let mid = cubics[0].2;
        assert!((mid - DVec2::new(0.0, 1.0)).length() < 1e-9, "{mid:?}");
    }

    #[test]
    fn zero_radius_is_a_line() {
        let cubics = arc_to_cubics(DVec2::ZERO, DVec2::new(3.0, 4.0), params(0.0, false, true));
        assert_eq!(cubics, vec![(DVec2::ZERO, DVec2::new(3.0, 4.0), DVec2::new(3.0, 4.0))]);
    }

    #[test]
    fn coincident_endpoints_draw_nothing() {
        assert!(arc_to_cubics(DVec2::ONE, DVec2::ONE, params(2.0, true, true)).is_empty());
    }

    #[test]
    fn small_radius_is_scaled_up() {
        let cubics = arc_to_cubics(DVec2::ZERO, DVec2::new(10.0, 0.0), params(1.0, false, true));
        assert!(!cubics.is_empty());
        let last = cubics.last().unwrap().2;
        assert_eq!(last, DVec2::new(10.0, 0.0));
        for (c1, c2, end) in cubics {
            assert!(c1.is_finite() && c2.is_finite() && end.is_finite());
        }
    }
}
