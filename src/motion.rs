//! Pen and carriage motion in controller commands.
//!
//! The controller tracks a virtual pen state (what the plot asked for) next
//! to the physical one (what was last sent). Physical transitions are only
//! sent when they change something and the plot is not still seeking its
//! resume point.

use crate::config::PlotConfig;
use crate::defaults::{CONSTANT_SPEED_DIVISOR, SETTLE_BLOCK_THRESHOLD_MS, SETTLE_LEAD_MS};
use crate::errors::ProtocolError;
use crate::log::debug;
use crate::serial::{LineTransport, SerialLink};
use crate::types::{Inches, PageBounds};
use glam::DVec2;
use std::time::Duration;

/// Blocking wait used while the servo settles
pub trait Pause {
    fn pause(&mut self, duration: Duration);
}

/// Sleeps the calling thread
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Returns immediately; the controller dwell still orders the motion
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPause;

impl Pause for NoPause {
    fn pause(&mut self, _duration: Duration) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PenState {
    Unknown,
    Up,
    Down,
}

/// Where a move ended up after clamping
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MoveOutcome {
    pub destination: DVec2,
    pub clamped: bool,
}

/// Travelled distance split by pen state
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TravelStats {
    pub pen_down: Inches,
    pub pen_up: Inches,
}

impl TravelStats {
    pub fn total(&self) -> Inches {
        self.pen_down + self.pen_up
    }
}

pub struct MotionController<T> {
    link: SerialLink<T>,
    config: PlotConfig,
    pause: Box<dyn Pause>,
    page: PageBounds,
    physical: PenState,
    virtual_pen: PenState,
    position: DVec2,
    resuming: bool,
    stopped: bool,
    ignore_limits: bool,
    height_override: Option<u8>,
    speed_override: Option<u8>,
    pen_down_feed: f64,
    stats: TravelStats,
}

impl<T: LineTransport> MotionController<T> {
    pub fn new(link: SerialLink<T>, config: &PlotConfig, pause: Box<dyn Pause>) -> Self {
        let mut motion = MotionController {
            link,
            config: config.clone(),
            pause,
            page: config.page(),
            physical: PenState::Unknown,
            virtual_pen: PenState::Unknown,
            position: DVec2::ZERO,
            resuming: false,
            stopped: false,
            ignore_limits: false,
            height_override: None,
            speed_override: None,
            pen_down_feed: config.pen_down_speed,
            stats: TravelStats::default(),
        };
        motion.configure_speeds();
        motion
    }

    pub fn link(&mut self) -> &mut SerialLink<T> {
        &mut self.link
    }

    pub fn into_link(self) -> SerialLink<T> {
        self.link
    }

    /// Virtual pen state
    pub fn pen_state(&self) -> PenState {
        self.virtual_pen
    }

    pub fn physical_pen_state(&self) -> PenState {
        self.physical
    }

    pub fn position(&self) -> DVec2 {
        self.position
    }

    /// Adopt a position without moving, e.g. the last known position of an
    /// interrupted plot
    pub fn assume_position(&mut self, p: DVec2) {
        self.position = p;
    }

    pub fn stats(&self) -> TravelStats {
        self.stats
    }

    /// While set, pen transitions only update the virtual state
    pub fn set_resuming(&mut self, resuming: bool) {
        self.resuming = resuming;
    }

    pub fn set_stopped(&mut self, stopped: bool) {
        self.stopped = stopped;
    }

    /// Manual walks may leave the page
    pub fn set_ignore_limits(&mut self, ignore: bool) {
        self.ignore_limits = ignore;
    }

    /// Apply a layer's overrides. Returns true when the pen-down speed
    /// changed and the feeds were recomputed.
    pub fn set_layer_overrides(&mut self, height: Option<u8>, speed: Option<u8>) -> bool {
        self.height_override = height;
        if speed == self.speed_override {
            return false;
        }
        self.speed_override = speed;
        self.configure_speeds();
        true
    }

    /// Recompute feeds from the configuration and the speed override
    pub fn configure_speeds(&mut self) {
        let percent = self.speed_override.map_or(100.0, f64::from);
        let mut feed = self.config.pen_down_speed * percent / 100.0;
        if self.config.constant_speed {
            feed /= CONSTANT_SPEED_DIVISOR;
        }
        self.pen_down_feed = feed;
        debug!(pen_down_feed = feed, "configured speeds");
    }

    pub fn pen_down_feed(&self) -> f64 {
        self.pen_down_feed
    }

    fn pen_down_height(&self) -> u8 {
        self.height_override.unwrap_or(self.config.pen_down_height)
    }

    /// Servo settle time in ms for a transition
    pub fn settle_delay(&self, raising: bool) -> i64 {
        let (rate, extra) = if raising {
            (self.config.pen_lift_rate, self.config.pen_lift_delay)
        } else {
            (self.config.pen_lower_rate, self.config.pen_lower_delay)
        };
        let travel = f64::from(self.config.pen_up_height) - f64::from(self.pen_down_height());
        let time = (1000.0 * travel / rate).trunc() as i64;
        (time.abs() + extra).max(0)
    }

    /// Block for `duration` through the configured pause
    pub fn wait(&mut self, duration: Duration) {
        self.pause.pause(duration);
    }

    fn dwell(&mut self, delay_ms: i64) -> Result<(), ProtocolError> {
        self.link.command(&format!("G4 P{}", delay_ms as f64 / 1000.0))
    }

    fn send_speed(&mut self, feed: f64) -> Result<(), ProtocolError> {
        self.link.command("G4 P0")?;
        self.link.command(&format!("$110={feed}"))?;
        self.link.command(&format!("$111={feed}"))
    }

    fn settle(&mut self, delay_ms: i64) {
        if delay_ms > SETTLE_BLOCK_THRESHOLD_MS && self.config.mode != crate::config::Mode::Manual {
            self.pause
                .pause(Duration::from_millis((delay_ms - SETTLE_LEAD_MS) as u64));
        }
    }

    pub fn pen_up(&mut self) -> Result<(), ProtocolError> {
        self.virtual_pen = PenState::Up;
        if self.resuming || self.physical == PenState::Up {
            return Ok(());
        }
        let delay = self.settle_delay(true);
        debug!(delay, "pen up");
        self.link.command(&format!("M3 S{}", self.config.pen_up_height))?;
        if self.config.apply_speed {
            self.send_speed(self.config.pen_up_speed)?;
        }
        self.dwell(delay)?;
        self.physical = PenState::Up;
        self.settle(delay);
        Ok(())
    }

    pub fn pen_down(&mut self) -> Result<(), ProtocolError> {
        self.virtual_pen = PenState::Down;
        if self.resuming || self.stopped || self.physical == PenState::Down {
            return Ok(());
        }
        let delay = self.settle_delay(false);
        debug!(delay, height = self.pen_down_height(), "pen down");
        if self.config.apply_speed {
            self.send_speed(self.pen_down_feed)?;
        }
        self.link.command(&format!("M3 S{}", self.pen_down_height()))?;
        self.dwell(delay)?;
        self.physical = PenState::Down;
        self.settle(delay);
        Ok(())
    }

    /// Clamp to the page unless limits are ignored
    pub fn clamp(&self, p: DVec2) -> MoveOutcome {
        if self.ignore_limits {
            return MoveOutcome {
                destination: p,
                clamped: false,
            };
        }
        let (destination, clamped) = self.page.clamp(p);
        MoveOutcome {
            destination,
            clamped,
        }
    }

    fn feed(&self) -> f64 {
        if self.virtual_pen == PenState::Down {
            self.pen_down_feed
        } else {
            self.config.pen_up_speed
        }
    }

    /// Straight move to `p` (inches) at the feed for the current pen state
    pub fn move_to(&mut self, p: DVec2) -> Result<MoveOutcome, ProtocolError> {
        let outcome = self.clamp(p);
        let dest = outcome.destination;
        self.link.command(&format!(
            "G1 F{:.0} X{:.3} Y{:.3}",
            self.feed(),
            Inches(dest.x).to_mm().raw(),
            Inches(dest.y).to_mm().raw(),
        ))?;
        let distance = Inches(self.position.distance(dest));
        if self.virtual_pen == PenState::Down {
            self.stats.pen_down += distance;
        } else {
            self.stats.pen_up += distance;
        }
        self.position = dest;
        Ok(outcome)
    }
}
