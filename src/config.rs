//! Plot configuration record

use crate::defaults;
use crate::errors::ConfigError;
use crate::types::{Inches, NumericError, PageBounds, check_positive};
use serde::{Deserialize, Serialize};

/// What a run does
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Plot every layer
    #[default]
    Plot,
    /// Plot only layers numbered `target_layer`
    Layer,
    /// Continue or abandon an interrupted plot
    Resume,
    /// Single utility action, see [`ManualCommand`]
    Manual,
    /// Pen alignment helpers, see [`SetupAction`]
    Setup,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResumeAction {
    #[default]
    ResumeNow,
    GoHome,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManualCommand {
    #[default]
    None,
    RaisePen,
    LowerPen,
    VersionCheck,
    /// Send `controller_command` as a query and report the reply
    ControllerCommand,
    WalkX,
    WalkY,
    /// Clear the persisted progress without moving
    StripData,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SetupAction {
    /// Raise the pen so it can be mounted
    #[default]
    Align,
    /// Raise, wait, lower
    TogglePen,
}

/// Everything a run needs besides the document and the transport.
///
/// Speeds are mm/min, heights are servo percentages, delays are ms and
/// lengths are inches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct PlotConfig {
    pub pen_up_height: u8,
    pub pen_down_height: u8,
    /// Push per-state speeds to the controller on every pen change
    pub apply_speed: bool,
    pub pen_down_speed: f64,
    pub pen_up_speed: f64,
    pub pen_lift_rate: f64,
    pub pen_lift_delay: i64,
    pub pen_lower_rate: f64,
    pub pen_lower_delay: i64,
    /// Rotate portrait documents onto the landscape machine
    pub auto_rotate: bool,
    pub constant_speed: bool,
    pub smoothness: f64,
    pub target_layer: u32,
    pub mode: Mode,
    /// Record the extent of the drawing instead of drawing it
    pub bounding_box_only: bool,
    pub report_time: bool,
    pub resume_action: ResumeAction,
    pub manual_command: ManualCommand,
    pub controller_command: String,
    pub walk_distance: f64,
    pub setup_action: SetupAction,
    pub page_width: f64,
    pub page_height: f64,
}

impl Default for PlotConfig {
    fn default() -> Self {
        PlotConfig {
            pen_up_height: defaults::PEN_UP_HEIGHT,
            pen_down_height: defaults::PEN_DOWN_HEIGHT,
            apply_speed: false,
            pen_down_speed: defaults::PEN_DOWN_SPEED,
            pen_up_speed: defaults::PEN_UP_SPEED,
            pen_lift_rate: defaults::PEN_LIFT_RATE,
            pen_lift_delay: defaults::PEN_LIFT_DELAY_MS,
            pen_lower_rate: defaults::PEN_LOWER_RATE,
            pen_lower_delay: defaults::PEN_LOWER_DELAY_MS,
            auto_rotate: true,
            constant_speed: false,
            smoothness: defaults::SMOOTHNESS,
            target_layer: defaults::TARGET_LAYER,
            mode: Mode::Plot,
            bounding_box_only: false,
            report_time: true,
            resume_action: ResumeAction::ResumeNow,
            manual_command: ManualCommand::None,
            controller_command: defaults::CONTROLLER_COMMAND.to_string(),
            walk_distance: defaults::WALK_DISTANCE.0,
            setup_action: SetupAction::Align,
            page_width: defaults::PAGE_WIDTH.0,
            page_height: defaults::PAGE_HEIGHT.0,
        }
    }
}

fn positive(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    check_positive(value).map_err(|e: NumericError| ConfigError::InvalidOption {
        name,
        reason: e.to_string(),
    })
}

impl PlotConfig {
    /// Reject values that would make the plot meaningless or divide by zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("smoothness", self.smoothness)?;
        positive("pen_lift_rate", self.pen_lift_rate)?;
        positive("pen_lower_rate", self.pen_lower_rate)?;
        positive("pen_down_speed", self.pen_down_speed)?;
        positive("pen_up_speed", self.pen_up_speed)?;
        positive("page_width", self.page_width)?;
        positive("page_height", self.page_height)?;
        if !self.walk_distance.is_finite() {
            return Err(ConfigError::InvalidOption {
                name: "walk_distance",
                reason: NumericError::Infinite.to_string(),
            });
        }
        for (name, height) in [
            ("pen_up_height", self.pen_up_height),
            ("pen_down_height", self.pen_down_height),
        ] {
            if height > 100 {
                return Err(ConfigError::InvalidOption {
                    name,
                    reason: format!("{height} is above 100 percent"),
                });
            }
        }
        if self.mode == Mode::Layer && self.target_layer > defaults::MAX_LAYER_NUMBER {
            return Err(ConfigError::InvalidOption {
                name: "target_layer",
                reason: format!("{} is above {}", self.target_layer, defaults::MAX_LAYER_NUMBER),
            });
        }
        Ok(())
    }

    pub fn page(&self) -> PageBounds {
        PageBounds::new(Inches(self.page_width), Inches(self.page_height))
    }

    /// Curve flatness tolerance in inches
    pub fn flatness(&self) -> f64 {
        defaults::FLATNESS_BASE / self.smoothness
    }
}
