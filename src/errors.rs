//! Error types with rich diagnostics using miette
//!
//! Attribute-level grammar errors carry source spans into the offending
//! attribute text. Protocol errors carry the command line that failed.

use miette::{Diagnostic, NamedSource, SourceSpan};
use pest::error::InputLocation;
use thiserror::Error;

/// Wrap an attribute value as a miette source named after where it came from
pub(crate) fn attribute_source(origin: &str, text: &str) -> NamedSource<String> {
    NamedSource::new(origin, text.to_string())
}

/// Convert a pest error location into a span
pub(crate) fn span_of(location: &InputLocation) -> SourceSpan {
    match *location {
        InputLocation::Pos(pos) => SourceSpan::from((pos, 0)),
        InputLocation::Span((start, end)) => SourceSpan::from((start, end.saturating_sub(start))),
    }
}

// ============================================================================
// Document Errors
// ============================================================================

/// Errors raised while loading a document
#[derive(Error, Diagnostic, Debug)]
pub enum DocumentError {
    #[error("malformed XML")]
    #[diagnostic(code(penplot::document::xml))]
    Xml(#[from] roxmltree::Error),

    #[error("root element is <{root}>, expected <svg>")]
    #[diagnostic(code(penplot::document::not_svg))]
    NotSvg { root: String },
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Errors detected before any motion is commanded
#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("document {attribute} is missing or not an absolute length")]
    #[diagnostic(
        code(penplot::config::invalid_dimensions),
        help("use a positive length with in, mm, cm, px, pt or pc units")
    )]
    InvalidDimensions {
        attribute: &'static str,
        value: Option<String>,
    },

    #[error("viewBox `{value}` is malformed")]
    #[diagnostic(code(penplot::config::invalid_view_box))]
    InvalidViewBox { value: String },

    #[error("viewBox `{value}` has a zero or negative size")]
    #[diagnostic(code(penplot::config::degenerate_view_box))]
    DegenerateViewBox { value: String },

    #[error("invalid transform: {message}")]
    #[diagnostic(code(penplot::config::invalid_transform))]
    InvalidTransform {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("transform on <{element}> collapses the drawing")]
    #[diagnostic(
        code(penplot::config::degenerate_transform),
        help("a transform with zero determinant maps every point onto a line or a point")
    )]
    DegenerateTransform { element: String },

    #[error("option `{name}` is invalid: {reason}")]
    #[diagnostic(code(penplot::config::invalid_option))]
    InvalidOption { name: &'static str, reason: String },
}

// ============================================================================
// Geometry Errors
// ============================================================================

/// Errors converting one primitive to curves. Recoverable: the plot skips the
/// primitive and reports a warning.
#[derive(Error, Diagnostic, Debug)]
pub enum GeometryError {
    #[error("malformed path data: {message}")]
    #[diagnostic(code(penplot::geometry::invalid_path_data))]
    InvalidPathData {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("malformed point list: {message}")]
    #[diagnostic(code(penplot::geometry::invalid_points))]
    InvalidPoints {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("<{element}> attribute `{attribute}` is not a number: `{value}`")]
    #[diagnostic(code(penplot::geometry::invalid_attribute))]
    InvalidAttribute {
        element: String,
        attribute: &'static str,
        value: String,
    },
}

// ============================================================================
// Protocol Errors
// ============================================================================

/// Fatal errors talking to the motion controller. Any of these closes the
/// link and aborts the run.
#[derive(Error, Diagnostic, Debug)]
pub enum ProtocolError {
    #[error("no response to `{command}` after {attempts} reads")]
    #[diagnostic(
        code(penplot::protocol::timeout),
        help("check the cable and that the controller is powered")
    )]
    Timeout { command: String, attempts: u32 },

    #[error("unexpected response to `{command}`: `{response}`")]
    #[diagnostic(code(penplot::protocol::unexpected))]
    Unexpected { command: String, response: String },

    #[error("transport failed during `{command}`")]
    #[diagnostic(code(penplot::protocol::transport))]
    Transport {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("link is closed after an earlier failure")]
    #[diagnostic(code(penplot::protocol::link_closed))]
    LinkClosed,
}

// ============================================================================
// Plot Warnings
// ============================================================================

/// Recoverable conditions met during a run. Each kind is reported once.
#[derive(Error, Diagnostic, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlotWarning {
    #[error("document contains elements that cannot be plotted")]
    #[diagnostic(code(penplot::plot::unsupported_element), severity(Warning))]
    UnsupportedElement,

    #[error("text is not plotted")]
    #[diagnostic(
        code(penplot::plot::text),
        severity(Warning),
        help("convert text to paths before plotting")
    )]
    Text,

    #[error("bitmap images are not plotted")]
    #[diagnostic(code(penplot::plot::image), severity(Warning))]
    Image,

    #[error("some shapes have malformed geometry and were skipped")]
    #[diagnostic(code(penplot::plot::malformed_geometry), severity(Warning))]
    MalformedGeometry,

    #[error("movement was limited by the page bounds")]
    #[diagnostic(
        code(penplot::plot::out_of_bounds),
        severity(Warning),
        help("check the document units and scaling")
    )]
    OutOfBounds,

    #[error("there is no plot in progress to resume")]
    #[diagnostic(code(penplot::plot::nothing_to_resume), severity(Warning))]
    NothingToResume,
}
