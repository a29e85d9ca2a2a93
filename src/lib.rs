//! Resumable two-axis pen plotter core.
//!
//! This crate is organized into modules:
//! - `document`: read-only SVG scene graph
//! - `transform`: transform parsing, viewport mapping and composition
//! - `geometry`: primitives to cubic paths to polylines
//! - `layer`: layer label directives and selection
//! - `traverse`: lazy document walk yielding plot events
//! - `state`: progress state machine and stop flag
//! - `progress`: persisted progress record
//! - `motion`: pen and carriage commands
//! - `serial`: GRBL line protocol
//! - `plot`: the `run_plot` entry point

pub mod config;
pub mod defaults;
pub mod document;
pub mod errors;
pub mod geometry;
pub mod layer;
pub mod log;
pub mod motion;
pub mod plot;
pub mod progress;
pub mod serial;
pub mod state;
pub mod transform;
pub mod traverse;
pub mod types;

// Re-export commonly used items
pub use config::{ManualCommand, Mode, PlotConfig, ResumeAction, SetupAction};
pub use document::{Document, NodeRef};
pub use errors::{ConfigError, DocumentError, GeometryError, PlotWarning, ProtocolError};
pub use motion::{NoPause, Pause, ThreadPause};
pub use plot::{PlotStats, Plotter, RunOutcome, RunReport, run_plot};
pub use progress::PlotProgress;
pub use serial::{LineTransport, SerialLink, StreamTransport};
pub use state::StopFlag;
pub use types::{BoundingBox, Inches};

/// Load an SVG document and plot it with `config`.
///
/// Document errors are rendered with diagnostics; controller failures are
/// reported in the returned [`RunReport`].
pub fn plot_svg<T: LineTransport>(
    source: &str,
    config: &PlotConfig,
    transport: T,
) -> Result<RunReport, miette::Report> {
    let doc = Document::parse_svg(source)?;
    Ok(run_plot(&doc, config, transport)?)
}
