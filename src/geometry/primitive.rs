//! Drawable primitives and their conversion to curve paths

use super::CurvePath;
use super::arc::ArcParams;
use super::path_data::{CurveBuilder, parse_path_data, parse_points};
use crate::document::NodeRef;
use crate::errors::GeometryError;
use enum_dispatch::enum_dispatch;
use glam::DVec2;

/// Conversion of a primitive into cubic curves in its own user space.
/// `None` means the primitive draws nothing.
#[enum_dispatch]
pub trait ToCurvePath {
    fn to_curve_path(&self) -> Result<Option<CurvePath>, GeometryError>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct PathShape {
    pub d: String,
}

impl PathShape {
    pub fn new(d: impl Into<String>) -> Self {
        PathShape { d: d.into() }
    }
}

impl ToCurvePath for PathShape {
    fn to_curve_path(&self) -> Result<Option<CurvePath>, GeometryError> {
        if self.d.trim().is_empty() {
            return Ok(None);
        }
        parse_path_data(&self.d).map(Some)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RectShape {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ToCurvePath for RectShape {
    fn to_curve_path(&self) -> Result<Option<CurvePath>, GeometryError> {
        let mut b = CurveBuilder::default();
        b.move_to(DVec2::new(self.x, self.y));
        b.line_to(DVec2::new(self.x + self.width, self.y));
        b.line_to(DVec2::new(self.x + self.width, self.y + self.height));
        b.line_to(DVec2::new(self.x, self.y + self.height));
        b.close();
        Ok(Some(b.finish()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineShape {
    pub from: DVec2,
    pub to: DVec2,
}

impl ToCurvePath for LineShape {
    fn to_curve_path(&self) -> Result<Option<CurvePath>, GeometryError> {
        let mut b = CurveBuilder::default();
        b.move_to(self.from);
        b.line_to(self.to);
        Ok(Some(b.finish()))
    }
}

/// Open or closed chain of points (`polyline` / `polygon`)
#[derive(Clone, Debug, PartialEq)]
pub struct PolylineShape {
    pub points: String,
    pub closed: bool,
}

impl ToCurvePath for PolylineShape {
    fn to_curve_path(&self) -> Result<Option<CurvePath>, GeometryError> {
        let points = parse_points(&self.points)?;
        let Some((first, rest)) = points.split_first() else {
            return Ok(None);
        };
        let mut b = CurveBuilder::default();
        b.move_to(*first);
        for p in rest {
            b.line_to(*p);
        }
        if self.closed {
            b.close();
        }
        Ok(Some(b.finish()))
    }
}

/// Circles are ellipses with equal radii
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EllipseShape {
    pub cx: f64,
    pub cy: f64,
    pub rx: f64,
    pub ry: f64,
}

impl ToCurvePath for EllipseShape {
    fn to_curve_path(&self) -> Result<Option<CurvePath>, GeometryError> {
        if self.rx == 0.0 || self.ry == 0.0 {
            return Ok(None);
        }
        let arc = ArcParams {
            radii: DVec2::new(self.rx, self.ry),
            x_axis_rotation: 0.0,
            large_arc: true,
            sweep: false,
        };
        let left = DVec2::new(self.cx - self.rx, self.cy);
        let right = DVec2::new(self.cx + self.rx, self.cy);
        let mut b = CurveBuilder::default();
        b.move_to(left);
        b.arc_to(arc, right);
        b.arc_to(arc, left);
        Ok(Some(b.finish()))
    }
}

/// Every element kind the plotter can draw
#[enum_dispatch(ToCurvePath)]
#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    Path(PathShape),
    Rect(RectShape),
    Line(LineShape),
    Polyline(PolylineShape),
    Ellipse(EllipseShape),
}

impl Primitive {
    /// Tags recognized as drawable
    pub fn is_drawable_tag(tag: &str) -> bool {
        matches!(
            tag,
            "path" | "rect" | "line" | "polyline" | "polygon" | "circle" | "ellipse"
        )
    }

    /// Read the geometry attributes of a drawable element. Returns `Ok(None)`
    /// for tags that are not drawable.
    pub fn from_node(node: NodeRef<'_>) -> Result<Option<Self>, GeometryError> {
        let num = |attribute: &'static str| number_attribute(node, attribute);
        let primitive: Primitive = match node.tag() {
            "path" => PathShape::new(node.attr("d").unwrap_or_default()).into(),
            "rect" => RectShape {
                x: num("x")?,
                y: num("y")?,
                width: num("width")?,
                height: num("height")?,
            }
            .into(),
            "line" => LineShape {
                from: DVec2::new(num("x1")?, num("y1")?),
                to: DVec2::new(num("x2")?, num("y2")?),
            }
            .into(),
            tag @ ("polyline" | "polygon") => PolylineShape {
                points: node.attr("points").unwrap_or_default().to_string(),
                closed: tag == "polygon",
            }
            .into(),
            "circle" => {
                let r = num("r")?;
                EllipseShape {
                    cx: num("cx")?,
                    cy: num("cy")?,
                    rx: r,
                    ry: r,
                }
                .into()
            }
            "ellipse" => EllipseShape {
                cx: num("cx")?,
                cy: num("cy")?,
                rx: num("rx")?,
                ry: num("ry")?,
            }
            .into(),
            _ => return Ok(None),
        };
        Ok(Some(primitive))
    }
}

/// Numeric geometry attribute in user units; absent means zero
fn number_attribute(node: NodeRef<'_>, attribute: &'static str) -> Result<f64, GeometryError> {
    let Some(raw) = node.attr(attribute) else {
        return Ok(0.0);
    };
    let text = raw.trim();
    let text = text.strip_suffix("px").unwrap_or(text);
    match text.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(GeometryError::InvalidAttribute {
            element: node.tag().to_string(),
            attribute,
            value: raw.to_string(),
        }),
    }
}
