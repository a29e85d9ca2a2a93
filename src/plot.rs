//! The `run_plot` entry point.
//!
//! A run validates its inputs, then dispatches on the configured mode. The
//! document modes fold traversal events through the state machine into
//! motion commands; the utility modes issue a handful of commands directly.

use crate::config::{ManualCommand, Mode, PlotConfig, ResumeAction, SetupAction};
use crate::defaults::{ALL_LAYERS, MAX_LAYER_NUMBER, MIN_GAP, TOGGLE_PAUSE_MS};
use crate::document::{Document, NodeRef};
use crate::errors::{ConfigError, PlotWarning, ProtocolError};
use crate::geometry::{PathFlattener, Primitive};
use crate::layer::{LayerSelection, LayerSelector};
use crate::log::{debug, info, warn};
use crate::motion::{MotionController, Pause, ThreadPause};
use crate::progress::PlotProgress;
use crate::serial::{LineTransport, SerialLink};
use crate::state::{PlotPhase, PlotStateMachine, PrimitiveDecision, StopFlag};
use crate::transform::{TransformMatrix, TransformStack, Viewport, validate_document_transforms};
use crate::traverse::{LayerContext, Traversal, TraversalEvent};
use crate::types::{BoundingBox, Inches};
use glam::DVec2;
use std::time::{Duration, Instant};

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    Completed,
    /// The host raised the stop flag
    Stopped,
    /// The controller link failed
    Aborted(ProtocolError),
}

/// Timing and distance of a document plot
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlotStats {
    pub elapsed: Duration,
    pub pen_down: Inches,
    pub total: Inches,
}

#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Progress to persist into the document
    pub progress: PlotProgress,
    pub warnings: Vec<PlotWarning>,
    pub out_of_bounds: bool,
    /// Extent of the drawing destinations, if anything was drawn
    pub bounding_box: Option<BoundingBox>,
    pub stats: Option<PlotStats>,
    /// Controller replies to manual queries
    pub replies: Vec<String>,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed)
    }

    /// Store the resulting progress in the document's progress block
    pub fn persist(&self, doc: &mut Document) {
        self.progress.write_to(doc);
    }
}

/// Run configuration plus the host-supplied hooks
pub struct Plotter {
    config: PlotConfig,
    pause: Box<dyn Pause>,
    stop: StopFlag,
}

impl Plotter {
    pub fn new(config: PlotConfig) -> Self {
        Plotter {
            config,
            pause: Box::new(ThreadPause),
            stop: StopFlag::new(),
        }
    }

    /// Replace the thread sleep used while the servo settles
    pub fn with_pause(mut self, pause: impl Pause + 'static) -> Self {
        self.pause = Box::new(pause);
        self
    }

    pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    /// Flag that stops the run between two moves when raised
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    /// Execute one run. Configuration and document errors are returned
    /// before anything is sent; controller failures end up in the report.
    pub fn run<T: LineTransport>(self, doc: &Document, transport: T) -> Result<RunReport, ConfigError> {
        let Plotter {
            config,
            pause,
            stop,
        } = self;
        config.validate()?;
        let viewport = Viewport::from_document(doc)?;
        validate_document_transforms(doc)?;

        let old = PlotProgress::read_from(doc);
        info!(mode = ?config.mode, in_progress = old.is_in_progress(), "starting run");
        let started = Instant::now();
        let mut run = PlotRun {
            motion: MotionController::new(SerialLink::new(transport), &config, pause),
            state: PlotStateMachine::new(old, stop),
            selector: LayerSelector::new(LayerSelection::All),
            flattener: PathFlattener::new(config.flatness()),
            rotate: config.auto_rotate && viewport.is_portrait(),
            viewport,
            config: &config,
            progress: old,
            tracking: false,
            cursor: DVec2::ZERO,
            warnings: Vec::new(),
            replies: Vec::new(),
        };
        let result = run.dispatch(doc);
        Ok(run.into_report(result, started))
    }
}

/// Run `config` over `doc`, talking to the controller through `transport`
pub fn run_plot<T: LineTransport>(
    doc: &Document,
    config: &PlotConfig,
    transport: T,
) -> Result<RunReport, ConfigError> {
    Plotter::new(config.clone()).run(doc, transport)
}

struct PlotRun<'c, T> {
    config: &'c PlotConfig,
    motion: MotionController<T>,
    state: PlotStateMachine,
    selector: LayerSelector,
    flattener: PathFlattener,
    viewport: Viewport,
    /// Portrait documents are turned onto the landscape page
    rotate: bool,
    /// Progress reported when the state machine is not tracking a plot
    progress: PlotProgress,
    tracking: bool,
    /// Last destination, moved to or (bounding box only) just recorded
    cursor: DVec2,
    warnings: Vec<PlotWarning>,
    replies: Vec<String>,
}

impl<T: LineTransport> PlotRun<'_, T> {
    fn warn_once(&mut self, warning: PlotWarning) {
        if !self.warnings.contains(&warning) {
            warn!(%warning, "plot warning");
            self.warnings.push(warning);
        }
    }

    fn dispatch(&mut self, doc: &Document) -> Result<RunOutcome, ProtocolError> {
        match self.config.mode {
            Mode::Plot => self.plot(doc, LayerSelection::All),
            Mode::Layer => self.plot(doc, LayerSelection::Only(self.config.target_layer)),
            Mode::Resume => self.resume(doc),
            Mode::Manual => self.manual(),
            Mode::Setup => self.setup(),
        }
    }

    fn plot(&mut self, doc: &Document, selection: LayerSelection) -> Result<RunOutcome, ProtocolError> {
        self.selector = LayerSelector::new(selection);
        self.state.begin(selection.code());
        self.tracking = true;
        self.motion.link().command("G90")?;
        self.plot_document(doc)
    }

    fn resume(&mut self, doc: &Document) -> Result<RunOutcome, ProtocolError> {
        let old = *self.state.old_progress();
        let known_layer = old.layer == ALL_LAYERS || (0..=i64::from(MAX_LAYER_NUMBER)).contains(&old.layer);
        self.motion.link().command("G90")?;
        if !known_layer || !old.is_in_progress() {
            self.warn_once(PlotWarning::NothingToResume);
            return Ok(RunOutcome::Completed);
        }
        self.motion.assume_position(old.last_known_pos);

        match self.config.resume_action {
            ResumeAction::GoHome => {
                self.motion.pen_up()?;
                self.motion.move_to(DVec2::ZERO)?;
                Ok(RunOutcome::Completed)
            }
            ResumeAction::ResumeNow => {
                self.selector = LayerSelector::new(LayerSelection::from_code(old.layer));
                self.state.begin_resume();
                self.tracking = true;
                info!(
                    last_path = old.last_path,
                    node_count = old.node_count,
                    "resuming plot"
                );
                let outcome = self.motion.move_to(old.paused_pos)?;
                self.cursor = outcome.destination;
                self.motion.set_resuming(self.state.is_seeking());
                self.plot_document(doc)
            }
        }
    }

    fn manual(&mut self) -> Result<RunOutcome, ProtocolError> {
        let command = self.config.manual_command;
        match command {
            ManualCommand::None => return Ok(RunOutcome::Completed),
            ManualCommand::StripData => {
                self.progress = PlotProgress::default();
                return Ok(RunOutcome::Completed);
            }
            _ => {}
        }

        self.motion.link().command("G90")?;
        match command {
            ManualCommand::RaisePen => self.motion.pen_up()?,
            ManualCommand::LowerPen => self.motion.pen_down()?,
            ManualCommand::VersionCheck => {
                let reply = self.motion.link().query("$I")?;
                self.replies.push(reply);
            }
            ManualCommand::ControllerCommand => {
                let query = self.config.controller_command.trim().to_string();
                let reply = self.motion.link().query(&query)?;
                self.replies.push(reply);
            }
            ManualCommand::WalkX | ManualCommand::WalkY => {
                let start = self.progress.last_known_pos;
                let step = self.config.walk_distance;
                let delta = if command == ManualCommand::WalkX {
                    DVec2::new(step, 0.0)
                } else {
                    DVec2::new(0.0, step)
                };
                self.motion.assume_position(start);
                self.motion.set_ignore_limits(true);
                let outcome = self.motion.move_to(start + delta)?;
                self.progress.last_known_pos = outcome.destination;
            }
            ManualCommand::None | ManualCommand::StripData => {}
        }
        Ok(RunOutcome::Completed)
    }

    fn setup(&mut self) -> Result<RunOutcome, ProtocolError> {
        self.motion.link().command("G90")?;
        self.motion.pen_up()?;
        if self.config.setup_action == SetupAction::TogglePen {
            self.motion.wait(Duration::from_millis(TOGGLE_PAUSE_MS));
            self.motion.pen_down()?;
        }
        Ok(RunOutcome::Completed)
    }

    fn raise_pen(&mut self) -> Result<(), ProtocolError> {
        if self.config.bounding_box_only {
            return Ok(());
        }
        self.motion.pen_up()
    }

    fn lower_pen(&mut self) -> Result<(), ProtocolError> {
        if self.config.bounding_box_only {
            return Ok(());
        }
        self.motion.pen_down()
    }

    /// Move to (or, bounding box only, record) a drawing destination
    fn travel(&mut self, point: DVec2) -> Result<(), ProtocolError> {
        let outcome = if self.config.bounding_box_only {
            self.motion.clamp(point)
        } else {
            self.motion.move_to(point)?
        };
        self.cursor = outcome.destination;
        self.state.record_destination(outcome.destination, outcome.clamped);
        self.state.record_node(outcome.destination);
        Ok(())
    }

    fn orient(&self, p: DVec2) -> DVec2 {
        if self.rotate {
            DVec2::new(p.y, self.viewport.width.0 - p.x)
        } else {
            p
        }
    }

    fn plot_document(&mut self, doc: &Document) -> Result<RunOutcome, ProtocolError> {
        self.raise_pen()?;
        let transforms = TransformStack::new(&self.viewport);

        for event in Traversal::new(doc, transforms, TransformMatrix::IDENTITY) {
            if self.state.should_stop() {
                break;
            }
            match event {
                Err(error) => {
                    warn!(%error, "element skipped");
                    self.warn_once(PlotWarning::MalformedGeometry);
                }
                Ok(TraversalEvent::LayerEntered(layer)) => {
                    info!(label = layer.label, "entering layer");
                    self.raise_pen()?;
                }
                Ok(TraversalEvent::Unsupported { node, layer }) => {
                    if self.selector.is_active(layer.as_ref().map(|l| &l.directive)) {
                        let warning = match node.tag() {
                            "text" | "flowRoot" => PlotWarning::Text,
                            "image" => PlotWarning::Image,
                            _ => PlotWarning::UnsupportedElement,
                        };
                        self.warn_once(warning);
                    }
                }
                Ok(TraversalEvent::Primitive {
                    node,
                    transform,
                    layer,
                }) => self.plot_primitive(node, &transform, layer)?,
            }
        }

        // A resume cursor past the last primitive leaves nothing to draw
        self.motion.set_resuming(false);
        if self.state.should_stop() {
            self.motion.set_stopped(true);
            self.motion.pen_up()?;
            self.state.finish();
            return Ok(RunOutcome::Stopped);
        }

        self.motion.pen_up()?;
        if self.config.bounding_box_only {
            self.trace_outline()?;
        }
        if self.motion.position() != DVec2::ZERO {
            self.motion.move_to(DVec2::ZERO)?;
        }
        match self.state.finish() {
            PlotPhase::Stopped => Ok(RunOutcome::Stopped),
            _ => Ok(RunOutcome::Completed),
        }
    }

    fn plot_primitive(
        &mut self,
        node: NodeRef<'_>,
        transform: &TransformMatrix,
        layer: Option<LayerContext<'_>>,
    ) -> Result<(), ProtocolError> {
        let directive = layer.map(|l| l.directive);
        if !self.selector.is_active(directive.as_ref()) {
            return Ok(());
        }
        let (height, speed) = directive.map_or((None, None), |d| (d.pen_down_height, d.pen_down_speed));
        if self.motion.set_layer_overrides(height, speed) {
            debug!(?speed, "layer speed override");
        }
        if self.state.enter_primitive() == PrimitiveDecision::Skip {
            return Ok(());
        }
        self.motion.set_resuming(false);

        let flattener = self.flattener;
        let flattened = Primitive::from_node(node).and_then(|primitive| match primitive {
            Some(primitive) => flattener.flatten(&primitive, transform),
            None => Ok(None),
        });
        match flattened {
            Ok(Some(polylines)) => {
                for polyline in &polylines {
                    self.plot_polyline(polyline)?;
                    if self.state.should_stop() {
                        break;
                    }
                }
            }
            Ok(None) => {}
            Err(error) => {
                warn!(%error, element = node.tag(), "malformed geometry");
                self.warn_once(PlotWarning::MalformedGeometry);
            }
        }
        self.state.finish_primitive();
        Ok(())
    }

    /// Travel to the first point (lifting unless it is within the minimum
    /// gap), lower the pen and draw through the rest.
    fn plot_polyline(&mut self, polyline: &[DVec2]) -> Result<(), ProtocolError> {
        for (index, &point) in polyline.iter().enumerate() {
            if self.state.should_stop() {
                self.motion.set_stopped(true);
                return Ok(());
            }
            let point = self.orient(point);
            match index {
                0 if point.distance(self.cursor) > MIN_GAP.0 => self.raise_pen()?,
                1 => self.lower_pen()?,
                _ => {}
            }
            self.travel(point)?;
        }
        Ok(())
    }

    /// Trace the recorded extent with the pen up
    fn trace_outline(&mut self) -> Result<(), ProtocolError> {
        let bounds = *self.state.bounds();
        if bounds.is_empty() {
            return Ok(());
        }
        info!(?bounds, "bounding box");
        for corner in bounds.outline() {
            self.motion.move_to(corner)?;
        }
        Ok(())
    }

    fn into_report(mut self, result: Result<RunOutcome, ProtocolError>, started: Instant) -> RunReport {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(%error, "run aborted");
                if self.tracking {
                    self.state.stop();
                }
                RunOutcome::Aborted(error)
            }
        };

        let out_of_bounds = self.state.out_of_bounds();
        if out_of_bounds {
            self.warn_once(PlotWarning::OutOfBounds);
        }
        let progress = if self.tracking {
            *self.state.progress()
        } else {
            self.progress
        };
        let bounds = *self.state.bounds();
        let travel = self.motion.stats();
        let stats = (self.tracking && self.config.report_time).then(|| PlotStats {
            elapsed: started.elapsed(),
            pen_down: travel.pen_down,
            total: travel.total(),
        });
        info!(?outcome, node_count = progress.node_count, "run finished");

        RunReport {
            outcome,
            progress,
            warnings: self.warnings,
            out_of_bounds,
            bounding_box: (!bounds.is_empty()).then_some(bounds),
            stats,
            replies: self.replies,
        }
    }
}
