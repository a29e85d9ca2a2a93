//! Affine transforms: attribute parsing, viewport mapping and composition
//! along the ancestor chain.

use crate::defaults::PX_PER_INCH;
use crate::document::{Document, NodeRef};
use crate::errors::{ConfigError, attribute_source, span_of};
use crate::types::{Inches, parse_length};
use glam::{DAffine2, DVec2};
use miette::SourceSpan;
use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;
use std::ops::Mul;

#[derive(Parser)]
#[grammar = "transform.pest"]
struct TransformParser;

/// 2×3 affine matrix `(a, b, c, d, e, f)`:
/// `x' = a·x + c·y + e`, `y' = b·x + d·y + f`.
///
/// `outer * inner` applies `inner` first.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformMatrix(pub DAffine2);

impl TransformMatrix {
    pub const IDENTITY: TransformMatrix = TransformMatrix(DAffine2::IDENTITY);

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        TransformMatrix(DAffine2::from_cols_array(&[a, b, c, d, e, f]))
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        TransformMatrix(DAffine2::from_translation(DVec2::new(tx, ty)))
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        TransformMatrix(DAffine2::from_scale(DVec2::new(sx, sy)))
    }

    /// Rotation by `degrees` about the origin
    pub fn rotate(degrees: f64) -> Self {
        TransformMatrix(DAffine2::from_angle(degrees.to_radians()))
    }

    pub fn skew_x(degrees: f64) -> Self {
        Self::new(1.0, 0.0, degrees.to_radians().tan(), 1.0, 0.0, 0.0)
    }

    pub fn skew_y(degrees: f64) -> Self {
        Self::new(1.0, degrees.to_radians().tan(), 0.0, 1.0, 0.0, 0.0)
    }

    /// Coefficients in `(a, b, c, d, e, f)` order
    pub fn to_array(&self) -> [f64; 6] {
        self.0.to_cols_array()
    }

    pub fn apply(&self, p: DVec2) -> DVec2 {
        self.0.transform_point2(p)
    }

    pub fn determinant(&self) -> f64 {
        self.0.matrix2.determinant()
    }

    /// True when the matrix maps the plane onto a line or point, or holds
    /// non-finite coefficients
    pub fn is_degenerate(&self) -> bool {
        let det = self.determinant();
        !self.0.is_finite() || det.abs() < 1e-12
    }

    pub fn inverse(&self) -> Option<TransformMatrix> {
        if self.is_degenerate() {
            None
        } else {
            Some(TransformMatrix(self.0.inverse()))
        }
    }

    /// Parse an SVG `transform` attribute. `origin` names the element in
    /// diagnostics.
    pub fn parse(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let invalid = |message: String, span: SourceSpan| ConfigError::InvalidTransform {
            message,
            src: attribute_source(origin, text),
            span,
        };
        let list = TransformParser::parse(Rule::transform_list, text)
            .map_err(|e| invalid(e.variant.message().to_string(), span_of(&e.location)))?;

        let mut result = TransformMatrix::IDENTITY;
        for pair in list.flat_map(|p| p.into_inner()) {
            if pair.as_rule() != Rule::transform {
                continue;
            }
            let span = pair.as_span();
            let source_span: SourceSpan = (span.start(), span.end() - span.start()).into();
            let step = transform_step(pair).map_err(|message| invalid(message, source_span))?;
            result = result * step;
        }
        Ok(result)
    }
}

impl Mul for TransformMatrix {
    type Output = TransformMatrix;
    fn mul(self, rhs: TransformMatrix) -> TransformMatrix {
        TransformMatrix(self.0 * rhs.0)
    }
}

impl Default for TransformMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

fn transform_step(pair: Pair<'_, Rule>) -> Result<TransformMatrix, String> {
    let mut name = "";
    let mut args = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::transform_name => name = inner.as_str(),
            Rule::number => args.push(
                inner
                    .as_str()
                    .parse::<f64>()
                    .map_err(|e| format!("bad number `{}`: {e}", inner.as_str()))?,
            ),
            _ => {}
        }
    }
    let matrix = match (name, args.as_slice()) {
        ("matrix", &[a, b, c, d, e, f]) => TransformMatrix::new(a, b, c, d, e, f),
        ("translate", &[tx]) => TransformMatrix::translate(tx, 0.0),
        ("translate", &[tx, ty]) => TransformMatrix::translate(tx, ty),
        ("scale", &[s]) => TransformMatrix::scale(s, s),
        ("scale", &[sx, sy]) => TransformMatrix::scale(sx, sy),
        ("rotate", &[deg]) => TransformMatrix::rotate(deg),
        ("rotate", &[deg, cx, cy]) => {
            TransformMatrix::translate(cx, cy)
                * TransformMatrix::rotate(deg)
                * TransformMatrix::translate(-cx, -cy)
        }
        ("skewX", &[deg]) => TransformMatrix::skew_x(deg),
        ("skewY", &[deg]) => TransformMatrix::skew_y(deg),
        _ => return Err(format!("{name}() does not take {} arguments", args.len())),
    };
    Ok(matrix)
}

/// Parsed `transform` attribute of a node, identity when absent
pub fn node_transform(node: NodeRef<'_>) -> Result<TransformMatrix, ConfigError> {
    match node.attr("transform") {
        Some(text) => TransformMatrix::parse(text, &format!("<{}> transform", node.tag())),
        None => Ok(TransformMatrix::IDENTITY),
    }
}

/// Maps user units of the root `svg` element to inches
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: Inches,
    pub height: Inches,
    pub matrix: TransformMatrix,
}

impl Viewport {
    pub fn from_document(doc: &Document) -> Result<Self, ConfigError> {
        let root = doc.root();
        let width = document_length(root, "width")?;
        let height = document_length(root, "height")?;

        let matrix = match root.attr("viewBox") {
            Some(text) => {
                let invalid = || ConfigError::InvalidViewBox {
                    value: text.to_string(),
                };
                let values = text
                    .split(|c: char| c.is_whitespace() || c == ',')
                    .filter(|s| !s.is_empty())
                    .map(|s| s.parse::<f64>().map_err(|_| invalid()))
                    .collect::<Result<Vec<_>, _>>()?;
                let &[min_x, min_y, vb_width, vb_height] = values.as_slice() else {
                    return Err(invalid());
                };
                if values.iter().any(|v| !v.is_finite()) {
                    return Err(invalid());
                }
                if vb_width <= 0.0 || vb_height <= 0.0 {
                    return Err(ConfigError::DegenerateViewBox {
                        value: text.to_string(),
                    });
                }
                TransformMatrix::scale(width.0 / vb_width, height.0 / vb_height)
                    * TransformMatrix::translate(-min_x, -min_y)
            }
            None => TransformMatrix::scale(1.0 / PX_PER_INCH, 1.0 / PX_PER_INCH),
        };

        Ok(Viewport {
            width,
            height,
            matrix,
        })
    }

    /// Portrait documents are rotated onto the landscape machine
    pub fn is_portrait(&self) -> bool {
        self.height.0 > self.width.0
    }
}

fn document_length(root: NodeRef<'_>, attribute: &'static str) -> Result<Inches, ConfigError> {
    let value = root.attr(attribute);
    value
        .and_then(parse_length)
        .filter(|len| len.0 > 0.0)
        .ok_or_else(|| ConfigError::InvalidDimensions {
            attribute,
            value: value.map(str::to_string),
        })
}

/// Composes the full matrix for a node: the node's own transform, then each
/// enclosing group innermost first, then the viewport, then the caller's
/// outer matrix.
#[derive(Clone, Copy, Debug)]
pub struct TransformStack {
    viewport: TransformMatrix,
}

impl TransformStack {
    pub fn new(viewport: &Viewport) -> Self {
        TransformStack {
            viewport: viewport.matrix,
        }
    }

    pub fn viewport(&self) -> TransformMatrix {
        self.viewport
    }

    /// Node and group transforms only, in user units
    pub fn user_space(&self, node: NodeRef<'_>) -> Result<TransformMatrix, ConfigError> {
        let mut matrix = node_transform(node)?;
        for ancestor in node.ancestors().filter(|a| a.is_group()) {
            matrix = node_transform(ancestor)? * matrix;
        }
        Ok(matrix)
    }

    pub fn compose(
        &self,
        node: NodeRef<'_>,
        outer: TransformMatrix,
    ) -> Result<TransformMatrix, ConfigError> {
        let composed = outer * self.viewport * self.user_space(node)?;
        if composed.is_degenerate() {
            return Err(ConfigError::DegenerateTransform {
                element: node.tag().to_string(),
            });
        }
        Ok(composed)
    }
}

/// Parse every `transform` attribute up front so a bad one aborts the run
/// before the first command.
pub fn validate_document_transforms(doc: &Document) -> Result<(), ConfigError> {
    for node in doc.descendants() {
        if node.attr("transform").is_none() {
            continue;
        }
        if node_transform(node)?.is_degenerate() {
            return Err(ConfigError::DegenerateTransform {
                element: node.tag().to_string(),
            });
        }
    }
    Ok(())
}
