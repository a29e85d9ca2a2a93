//! Default plot settings and protocol constants (lengths in inches)

use crate::types::Inches;

/// Servo position for the raised pen (percent)
pub const PEN_UP_HEIGHT: u8 = 40;
/// Servo position for the lowered pen (percent)
pub const PEN_DOWN_HEIGHT: u8 = 0;

/// Feed while drawing, mm/min
pub const PEN_DOWN_SPEED: f64 = 1000.0;
/// Feed while travelling, mm/min
pub const PEN_UP_SPEED: f64 = 5000.0;

/// Servo travel rate used to estimate settle time
pub const PEN_LIFT_RATE: f64 = 150.0;
pub const PEN_LOWER_RATE: f64 = 150.0;
/// Extra settle time after actuation, ms
pub const PEN_LIFT_DELAY_MS: i64 = 0;
pub const PEN_LOWER_DELAY_MS: i64 = 0;

pub const SMOOTHNESS: f64 = 10.0;
/// Chord deviation allowed at smoothness 1
pub const FLATNESS_BASE: f64 = 0.02;
/// Bound on recursive bezier splitting per segment
pub const MAX_SUBDIVISION_DEPTH: u32 = 16;

pub const TARGET_LAYER: u32 = 1;
pub const MAX_LAYER_NUMBER: u32 = 100;
/// Progress layer code meaning "every layer"
pub const ALL_LAYERS: i64 = 12345;

pub const PAGE_WIDTH: Inches = Inches(16.5);
pub const PAGE_HEIGHT: Inches = Inches(11.69);
pub const PX_PER_INCH: f64 = 96.0;

/// Pen-up travel below this is drawn through instead of lifting
pub const MIN_GAP: Inches = Inches(0.010);
/// Manual walk distance
pub const WALK_DISTANCE: Inches = Inches(1.0);

/// Settle waits at or below this are left to the controller dwell
pub const SETTLE_BLOCK_THRESHOLD_MS: i64 = 50;
/// Subtracted from blocking settle waits to cover link latency
pub const SETTLE_LEAD_MS: i64 = 10;
/// Pause between the two halves of the toggle-pen setup action
pub const TOGGLE_PAUSE_MS: u64 = 1000;

/// Empty reads tolerated while waiting for a command acknowledgment
pub const COMMAND_READ_ATTEMPTS: u32 = 30;
/// Empty reads tolerated while collecting a query reply
pub const QUERY_READ_ATTEMPTS: u32 = 100;

/// Constant-speed mode divides the pen-down feed by this
pub const CONSTANT_SPEED_DIVISOR: f64 = 3.0;

/// Default query for the manual controller-command action
pub const CONTROLLER_COMMAND: &str = "$$";
