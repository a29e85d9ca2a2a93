//! Curve paths, bezier subdivision and the primitive flattener.

pub mod arc;
pub mod path_data;
pub mod primitive;

pub use primitive::{Primitive, ToCurvePath};

use crate::defaults::MAX_SUBDIVISION_DEPTH;
use crate::errors::GeometryError;
use crate::transform::TransformMatrix;
use glam::DVec2;

/// An anchor with its incoming and outgoing bezier handles
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlPoint {
    pub ctrl_in: DVec2,
    pub anchor: DVec2,
    pub ctrl_out: DVec2,
}

impl ControlPoint {
    /// A sharp corner: both handles sit on the anchor
    pub fn corner(p: DVec2) -> Self {
        ControlPoint {
            ctrl_in: p,
            anchor: p,
            ctrl_out: p,
        }
    }
}

/// A connected run of cubic segments; the first point's `ctrl_in` is unused
pub type Subpath = Vec<ControlPoint>;

/// Straight segments in plot order
pub type Polyline = Vec<DVec2>;

/// Cubic bezier path made of one or more subpaths
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CurvePath {
    pub subpaths: Vec<Subpath>,
}

impl CurvePath {
    pub fn is_empty(&self) -> bool {
        self.subpaths.iter().all(|s| s.is_empty())
    }

    /// Map every handle and anchor through `matrix`
    pub fn transform(&mut self, matrix: &TransformMatrix) {
        for point in self.subpaths.iter_mut().flatten() {
            point.ctrl_in = matrix.apply(point.ctrl_in);
            point.anchor = matrix.apply(point.anchor);
            point.ctrl_out = matrix.apply(point.ctrl_out);
        }
    }
}

/// Largest distance of the two handles from the chord.
///
/// When the chord has (nearly) no length the handles are measured from the
/// start point instead, so a zero-length segment is flat.
pub fn max_deviation(segment: &[DVec2; 4]) -> f64 {
    let [p0, p1, p2, p3] = *segment;
    let chord = p3 - p0;
    let length = chord.length();
    if length < 1e-9 {
        return (p1 - p0).length().max((p2 - p0).length());
    }
    let d1 = chord.perp_dot(p1 - p0).abs() / length;
    let d2 = chord.perp_dot(p2 - p0).abs() / length;
    d1.max(d2)
}

/// de Casteljau split at t = 0.5
fn split_half(segment: &[DVec2; 4]) -> ([DVec2; 4], [DVec2; 4]) {
    let [p0, p1, p2, p3] = *segment;
    let p01 = p0.midpoint(p1);
    let p12 = p1.midpoint(p2);
    let p23 = p2.midpoint(p3);
    let p012 = p01.midpoint(p12);
    let p123 = p12.midpoint(p23);
    let mid = p012.midpoint(p123);
    ([p0, p01, p012, mid], [mid, p123, p23, p3])
}

fn flatten_segment(segment: &[DVec2; 4], flatness: f64, depth: u32, out: &mut Polyline) {
    let deviation = max_deviation(segment);
    if depth >= MAX_SUBDIVISION_DEPTH || !deviation.is_finite() || deviation <= flatness {
        out.push(segment[3]);
        return;
    }
    let (left, right) = split_half(segment);
    flatten_segment(&left, flatness, depth + 1, out);
    flatten_segment(&right, flatness, depth + 1, out);
}

/// Split every cubic of `subpath` until it deviates from its chord by no
/// more than `flatness`, returning the resulting anchors.
pub fn subdivide(subpath: &[ControlPoint], flatness: f64) -> Polyline {
    let mut out = Vec::new();
    let Some(first) = subpath.first() else {
        return out;
    };
    out.push(first.anchor);
    for pair in subpath.windows(2) {
        let segment = [pair[0].anchor, pair[0].ctrl_out, pair[1].ctrl_in, pair[1].anchor];
        flatten_segment(&segment, flatness, 0, &mut out);
    }
    out
}

/// Turns primitives into polylines in plot space
#[derive(Clone, Copy, Debug)]
pub struct PathFlattener {
    flatness: f64,
}

impl PathFlattener {
    /// `flatness` is the chord deviation tolerance in plot units (inches)
    pub fn new(flatness: f64) -> Self {
        PathFlattener { flatness }
    }

    pub fn flatness(&self) -> f64 {
        self.flatness
    }

    /// Convert, transform and subdivide. `None` means the primitive draws
    /// nothing (empty path data, zero radius, empty point list).
    pub fn flatten(
        &self,
        primitive: &Primitive,
        matrix: &TransformMatrix,
    ) -> Result<Option<Vec<Polyline>>, GeometryError> {
        let Some(mut curves) = primitive.to_curve_path()? else {
            return Ok(None);
        };
        if curves.is_empty() {
            return Ok(None);
        }
        curves.transform(matrix);
        Ok(Some(
            curves
                .subpaths
                .iter()
                .filter(|s| !s.is_empty())
                .map(|s| subdivide(s, self.flatness))
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::primitive::{EllipseShape, PathShape, RectShape};

    fn flattener() -> PathFlattener {
        PathFlattener::new(0.002)
    }

    #[test]
    fn rect_flattens_to_closed_corners() {
        let rect = Primitive::from(RectShape {
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 5.0,
        });
        let lines = flattener()
            .flatten(&rect, &TransformMatrix::IDENTITY)
            .unwrap()
            .unwrap();
        assert_eq!(
            lines,
            vec![vec![
                DVec2::new(0.0, 0.0),
                DVec2::new(10.0, 0.0),
                DVec2::new(10.0, 5.0),
                DVec2::new(0.0, 5.0),
                DVec2::new(0.0, 0.0),
            ]]
        );
    }

    #[test]
    fn zero_radius_circle_draws_nothing() {
        let circle = Primitive::from(EllipseShape {
            cx: 5.0,
            cy: 5.0,
            rx: 0.0,
            ry: 0.0,
        });
        assert_eq!(flattener().flatten(&circle, &TransformMatrix::IDENTITY).unwrap(), None);
    }

    #[test]
    fn identity_keeps_anchors() {
        let path = Primitive::from(PathShape::new("M1 2 L3 4 L5 -6"));
        let lines = flattener()
            .flatten(&path, &TransformMatrix::IDENTITY)
            .unwrap()
            .unwrap();
        assert_eq!(lines[0], vec![DVec2::new(1.0, 2.0), DVec2::new(3.0, 4.0), DVec2::new(5.0, -6.0)]);
    }

    #[test]
    fn transform_applies_before_subdivision() {
        let path = Primitive::from(PathShape::new("M0 0 L96 0"));
        let to_inches = TransformMatrix::scale(1.0 / 96.0, 1.0 / 96.0);
        let lines = flattener().flatten(&path, &to_inches).unwrap().unwrap();
        assert_eq!(lines[0], vec![DVec2::ZERO, DVec2::new(1.0, 0.0)]);
    }

    #[test]
    fn circle_points_stay_within_tolerance() {
        let circle = Primitive::from(EllipseShape {
            cx: 0.0,
            cy: 0.0,
            rx: 1.0,
            ry: 1.0,
        });
        let lines = flattener()
            .flatten(&circle, &TransformMatrix::IDENTITY)
            .unwrap()
            .unwrap();
        let points = &lines[0];
        assert!(points.len() > 16);
        assert_eq!(points.first(), points.last());
        for p in points {
            assert!((p.length() - 1.0).abs() < 0.01, "{p:?}");
        }
        // Chord midpoints sag at most slightly more than the tolerance
        for w in points.windows(2) {
            let sag = 1.0 - w[0].midpoint(w[1]).length();
            assert!(sag < 0.004, "sag {sag}");
        }
    }

    #[test]
    fn degenerate_segment_is_flat() {
        let p = DVec2::new(2.0, 2.0);
        assert_eq!(max_deviation(&[p, p, p, p]), 0.0);
        let looped = [DVec2::ZERO, DVec2::new(1.0, 1.0), DVec2::new(-1.0, 1.0), DVec2::ZERO];
        assert!(max_deviation(&looped) > 1.0);
    }

    #[test]
    fn nan_segment_terminates() {
        let nan = DVec2::splat(f64::NAN);
        let subpath = [ControlPoint::corner(DVec2::ZERO), ControlPoint::corner(nan)];
        assert_eq!(subdivide(&subpath, 0.01).len(), 2);
    }
}
