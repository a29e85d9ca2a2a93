//! Plot progress state machine.
//!
//! One value threads through the whole run: it counts primitives and
//! destinations, decides which primitives a resumed plot skips, checkpoints
//! progress after every completed primitive and remembers the drawing's
//! extent.

use crate::progress::PlotProgress;
use crate::types::BoundingBox;
use glam::DVec2;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative stop request shared with the host
#[derive(Clone, Debug, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlotPhase {
    Idle,
    /// Resuming: skipping primitives until the checkpointed one
    ResumePending,
    Active,
    Completed,
    Stopped,
}

/// Whether a primitive is drawn
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveDecision {
    Skip,
    Draw,
}

#[derive(Debug)]
pub struct PlotStateMachine {
    phase: PlotPhase,
    old: PlotProgress,
    progress: PlotProgress,
    path_count: u64,
    node_count: u64,
    last_known_pos: DVec2,
    bounds: BoundingBox,
    out_of_bounds: bool,
    stop: StopFlag,
}

impl PlotStateMachine {
    /// `old` is the progress read from the document at run start
    pub fn new(old: PlotProgress, stop: StopFlag) -> Self {
        PlotStateMachine {
            phase: PlotPhase::Idle,
            old,
            progress: old,
            path_count: 0,
            node_count: 0,
            last_known_pos: DVec2::ZERO,
            bounds: BoundingBox::new(),
            out_of_bounds: false,
            stop,
        }
    }

    pub fn phase(&self) -> PlotPhase {
        self.phase
    }

    pub fn old_progress(&self) -> &PlotProgress {
        &self.old
    }

    pub fn progress(&self) -> &PlotProgress {
        &self.progress
    }

    pub fn path_count(&self) -> u64 {
        self.path_count
    }

    pub fn node_count(&self) -> u64 {
        self.node_count
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    pub fn out_of_bounds(&self) -> bool {
        self.out_of_bounds
    }

    /// Primitives are still being skipped toward the resume point
    pub fn is_seeking(&self) -> bool {
        self.phase == PlotPhase::ResumePending
    }

    /// Stop requested by the host or entered after a failure
    pub fn should_stop(&self) -> bool {
        self.phase == PlotPhase::Stopped || self.stop.is_raised()
    }

    /// Start a fresh plot under `layer_code`
    pub fn begin(&mut self, layer_code: i64) {
        self.phase = PlotPhase::Active;
        self.progress = PlotProgress {
            layer: layer_code,
            ..PlotProgress::default()
        };
        self.path_count = 0;
        self.node_count = 0;
    }

    /// Continue the interrupted plot described by the old progress
    pub fn begin_resume(&mut self) {
        self.phase = PlotPhase::ResumePending;
        self.progress = self.old;
        self.path_count = 0;
        self.node_count = self.old.node_count;
        self.last_known_pos = self.old.last_known_pos;
    }

    /// Count a drawable primitive and decide whether it is drawn
    pub fn enter_primitive(&mut self) -> PrimitiveDecision {
        if self.phase == PlotPhase::ResumePending {
            if self.path_count < self.old.last_path {
                self.path_count += 1;
                return PrimitiveDecision::Skip;
            }
            // Redraw the primitive that was interrupted
            self.node_count = self.old.last_path_node_count;
            self.phase = PlotPhase::Active;
        }
        self.path_count += 1;
        PrimitiveDecision::Draw
    }

    /// Record a destination sent to the controller
    pub fn record_node(&mut self, destination: DVec2) {
        self.node_count += 1;
        self.progress.node_count = self.node_count;
        self.last_known_pos = destination;
        self.progress.last_known_pos = destination;
    }

    /// Grow the extent by a final (clamped) destination
    pub fn record_destination(&mut self, destination: DVec2, clamped: bool) {
        self.bounds.expand_point(destination);
        if clamped {
            self.out_of_bounds = true;
        }
    }

    /// Checkpoint after a primitive has been fully emitted
    pub fn finish_primitive(&mut self) {
        if self.should_stop() {
            return;
        }
        self.progress.last_path = self.path_count;
        self.progress.last_path_node_count = self.node_count;
    }

    /// Abort the run, keeping progress at the last checkpoint
    pub fn stop(&mut self) {
        self.phase = PlotPhase::Stopped;
        self.progress.node_count = self.node_count;
        self.progress.paused_pos = self.last_known_pos;
        self.progress.last_known_pos = self.last_known_pos;
    }

    /// Close the run after traversal
    pub fn finish(&mut self) -> PlotPhase {
        if self.should_stop() {
            self.stop();
        } else {
            self.phase = PlotPhase::Completed;
            self.progress = PlotProgress::default();
        }
        self.phase
    }
}
