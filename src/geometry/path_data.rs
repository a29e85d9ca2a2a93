//! Parse SVG path data and point lists into cubic curve paths

use super::arc::{ArcParams, arc_to_cubics};
use super::{ControlPoint, CurvePath, Subpath};
use crate::errors::{GeometryError, attribute_source, span_of};
use glam::DVec2;
use miette::SourceSpan;
use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "path_data.pest"]
struct PathDataParser;

/// Incrementally builds a [`CurvePath`] with absolute coordinates
#[derive(Debug, Default)]
pub(crate) struct CurveBuilder {
    subpaths: Vec<Subpath>,
    current: DVec2,
    start: DVec2,
    open: bool,
}

impl CurveBuilder {
    pub fn current(&self) -> DVec2 {
        self.current
    }

    pub fn move_to(&mut self, p: DVec2) {
        self.subpaths.push(vec![ControlPoint::corner(p)]);
        self.current = p;
        self.start = p;
        self.open = true;
    }

    /// Drawing after a close starts a new subpath at the closed start point
    fn ensure_open(&mut self) {
        if !self.open {
            self.move_to(self.current);
        }
    }

    fn push(&mut self, point: ControlPoint) {
        self.current = point.anchor;
        if let Some(subpath) = self.subpaths.last_mut() {
            subpath.push(point);
        }
    }

    pub fn line_to(&mut self, p: DVec2) {
        self.ensure_open();
        self.push(ControlPoint::corner(p));
    }

    pub fn cubic_to(&mut self, c1: DVec2, c2: DVec2, p: DVec2) {
        self.ensure_open();
        if let Some(last) = self.subpaths.last_mut().and_then(|s| s.last_mut()) {
            last.ctrl_out = c1;
        }
        self.push(ControlPoint {
            ctrl_in: c2,
            anchor: p,
            ctrl_out: p,
        });
    }

    /// Quadratic raised to a cubic with the same shape
    pub fn quadratic_to(&mut self, q: DVec2, p: DVec2) {
        let p0 = self.current;
        let c1 = p0 + (q - p0) * (2.0 / 3.0);
        let c2 = p + (q - p) * (2.0 / 3.0);
        self.cubic_to(c1, c2, p);
    }

    pub fn arc_to(&mut self, arc: ArcParams, p: DVec2) {
        for (c1, c2, end) in arc_to_cubics(self.current, p, arc) {
            self.cubic_to(c1, c2, end);
        }
    }

    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        if self.current != self.start {
            self.line_to(self.start);
        }
        self.current = self.start;
        self.open = false;
    }

    pub fn finish(self) -> CurvePath {
        CurvePath {
            subpaths: self.subpaths,
        }
    }
}

/// Shorthand for the error constructor bound to one attribute value
struct Source<'a> {
    text: &'a str,
}

impl Source<'_> {
    fn path_error(&self, message: impl Into<String>, span: SourceSpan) -> GeometryError {
        GeometryError::InvalidPathData {
            message: message.into(),
            src: attribute_source("d", self.text),
            span,
        }
    }

    fn number(&self, pair: &Pair<'_, Rule>) -> Result<f64, GeometryError> {
        let span = pair.as_span();
        let source_span = SourceSpan::from((span.start(), span.end() - span.start()));
        match pair.as_str().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(self.path_error("number out of range", source_span)),
        }
    }

    fn pair(&self, pair: Pair<'_, Rule>) -> Result<DVec2, GeometryError> {
        let mut numbers = pair.into_inner();
        match (numbers.next(), numbers.next()) {
            (Some(x), Some(y)) => Ok(DVec2::new(self.number(&x)?, self.number(&y)?)),
            _ => Err(self.path_error("expected a coordinate pair", SourceSpan::from((0, 0)))),
        }
    }
}

/// Which control point the next smooth command may reflect
#[derive(Clone, Copy)]
enum Reflect {
    None,
    Cubic(DVec2),
    Quadratic(DVec2),
}

/// Parse a `d` attribute
pub fn parse_path_data(d: &str) -> Result<CurvePath, GeometryError> {
    let source = Source { text: d };
    let parsed = PathDataParser::parse(Rule::path_data, d)
        .map_err(|e| source.path_error(e.variant.message().to_string(), span_of(&e.location)))?;

    let mut builder = CurveBuilder::default();
    let mut reflect = Reflect::None;

    for command in parsed.flat_map(|p| p.into_inner()) {
        let rule = command.as_rule();
        if rule == Rule::EOI {
            continue;
        }
        let span = command.as_span();
        let command_span = SourceSpan::from((span.start(), span.end() - span.start()));
        let mut inner = command.into_inner();
        let relative = inner
            .next()
            .map(|letter| letter.as_str().chars().all(|c| c.is_ascii_lowercase()))
            .unwrap_or(false);
        let args: Vec<Pair<'_, Rule>> = inner.collect();
        let resolve = |builder: &CurveBuilder, p: DVec2| {
            if relative { builder.current() + p } else { p }
        };

        match rule {
            Rule::moveto => {
                for (i, arg) in args.into_iter().enumerate() {
                    let p = resolve(&builder, source.pair(arg)?);
                    if i == 0 {
                        builder.move_to(p);
                    } else {
                        builder.line_to(p);
                    }
                }
                reflect = Reflect::None;
            }
            Rule::lineto => {
                for arg in args {
                    let p = resolve(&builder, source.pair(arg)?);
                    builder.line_to(p);
                }
                reflect = Reflect::None;
            }
            Rule::hlineto | Rule::vlineto => {
                for arg in args {
                    let v = source.number(&arg)?;
                    let current = builder.current();
                    let p = match (rule == Rule::hlineto, relative) {
                        (true, true) => DVec2::new(current.x + v, current.y),
                        (true, false) => DVec2::new(v, current.y),
                        (false, true) => DVec2::new(current.x, current.y + v),
                        (false, false) => DVec2::new(current.x, v),
                    };
                    builder.line_to(p);
                }
                reflect = Reflect::None;
            }
            Rule::curveto => {
                if args.len() % 3 != 0 {
                    return Err(source.path_error("curveto takes coordinate pairs in threes", command_span));
                }
                let mut args = args.into_iter();
                while let (Some(a), Some(b), Some(c)) = (args.next(), args.next(), args.next()) {
                    let c1 = resolve(&builder, source.pair(a)?);
                    let c2 = resolve(&builder, source.pair(b)?);
                    let p = resolve(&builder, source.pair(c)?);
                    builder.cubic_to(c1, c2, p);
                    reflect = Reflect::Cubic(c2);
                }
            }
            Rule::smooth => {
                if args.len() % 2 != 0 {
                    return Err(source.path_error("smooth curveto takes coordinate pairs in twos", command_span));
                }
                let mut args = args.into_iter();
                while let (Some(a), Some(b)) = (args.next(), args.next()) {
                    let current = builder.current();
                    let c1 = match reflect {
                        Reflect::Cubic(c) => current * 2.0 - c,
                        _ => current,
                    };
                    let c2 = resolve(&builder, source.pair(a)?);
                    let p = resolve(&builder, source.pair(b)?);
                    builder.cubic_to(c1, c2, p);
                    reflect = Reflect::Cubic(c2);
                }
            }
            Rule::quadratic => {
                if args.len() % 2 != 0 {
                    return Err(source.path_error("quadratic takes coordinate pairs in twos", command_span));
                }
                let mut args = args.into_iter();
                while let (Some(a), Some(b)) = (args.next(), args.next()) {
                    let q = resolve(&builder, source.pair(a)?);
                    let p = resolve(&builder, source.pair(b)?);
                    builder.quadratic_to(q, p);
                    reflect = Reflect::Quadratic(q);
                }
            }
            Rule::smooth_q => {
                for arg in args {
                    let current = builder.current();
                    let q = match reflect {
                        Reflect::Quadratic(q) => current * 2.0 - q,
                        _ => current,
                    };
                    let p = resolve(&builder, source.pair(arg)?);
                    builder.quadratic_to(q, p);
                    reflect = Reflect::Quadratic(q);
                }
            }
            Rule::arc => {
                for arg in args {
                    let (params, end) = arc_argument(&source, arg)?;
                    let p = resolve(&builder, end);
                    builder.arc_to(params, p);
                }
                reflect = Reflect::None;
            }
            Rule::closepath => {
                builder.close();
                reflect = Reflect::None;
            }
            _ => {}
        }
    }

    Ok(builder.finish())
}

fn arc_argument(source: &Source<'_>, pair: Pair<'_, Rule>) -> Result<(ArcParams, DVec2), GeometryError> {
    let span = pair.as_span();
    let arg_span = SourceSpan::from((span.start(), span.end() - span.start()));
    let parts: Vec<Pair<'_, Rule>> = pair.into_inner().collect();
    let [rx, ry, rotation, large_arc, sweep, end] = <[Pair<'_, Rule>; 6]>::try_from(parts)
        .map_err(|_| source.path_error("arc takes seven values", arg_span))?;
    let params = ArcParams {
        radii: DVec2::new(source.number(&rx)?, source.number(&ry)?),
        x_axis_rotation: source.number(&rotation)?,
        large_arc: large_arc.as_str() == "1",
        sweep: sweep.as_str() == "1",
    };
    Ok((params, source.pair(end)?))
}

/// Parse a `points` attribute of a polyline or polygon
pub fn parse_points(text: &str) -> Result<Vec<DVec2>, GeometryError> {
    let parsed = PathDataParser::parse(Rule::points, text).map_err(|e| GeometryError::InvalidPoints {
        message: e.variant.message().to_string(),
        src: attribute_source("points", text),
        span: span_of(&e.location),
    })?;
    let source = Source { text };
    parsed
        .flat_map(|p| p.into_inner())
        .filter(|p| p.as_rule() == Rule::coordinate_pair)
        .map(|p| source.pair(p))
        .collect()
}
