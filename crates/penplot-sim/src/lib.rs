//! Simulated GRBL controller.
//!
//! Implements [`LineTransport`] by interpreting the command subset the
//! plotter emits: it tracks the carriage and servo, records every stroke
//! drawn with the pen down and answers with `ok`, setting dumps or GRBL
//! error codes. It can be told to go silent after a number of commands to
//! reproduce a lost link.

use penplot::LineTransport;
use regex_lite::Regex;
use std::collections::{BTreeSet, VecDeque};
use std::io;
use std::sync::LazyLock;

static MOVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^G[01](?:\s+F(?P<f>[-+\d.]+))?(?:\s+X(?P<x>[-+\d.]+))?(?:\s+Y(?P<y>[-+\d.]+))?$")
        .expect("move pattern")
});
static SERVO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^M3\s+S(?P<s>\d+)$").expect("servo pattern"));
static DWELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^G4\s+P(?P<p>[\d.]+)$").expect("dwell pattern"));
static SETTING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$(?P<key>\d+)=(?P<value>[-+\d.]+)$").expect("setting pattern"));

/// GRBL reports this for commands it does not understand
pub const UNSUPPORTED_COMMAND: &str = "error:20";

/// Build string returned by `$I`
pub const VERSION_REPLY: &str = "[VER:1.1h.20190825:]\n[OPT:V,15,128]";

/// A command line understood by the simulator
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Absolute,
    Move {
        feed: Option<f64>,
        x: Option<f64>,
        y: Option<f64>,
    },
    Servo(u32),
    Dwell(f64),
    Setting { key: u32, value: f64 },
    BuildInfo,
    Settings,
}

impl Command {
    pub fn parse(line: &str) -> Option<Command> {
        let line = line.trim();
        match line {
            "G90" => return Some(Command::Absolute),
            "$I" => return Some(Command::BuildInfo),
            "$$" => return Some(Command::Settings),
            _ => {}
        }
        let number = |caps: &regex_lite::Captures<'_>, name: &str| {
            caps.name(name).and_then(|m| m.as_str().parse::<f64>().ok())
        };
        if let Some(caps) = MOVE.captures(line) {
            return Some(Command::Move {
                feed: number(&caps, "f"),
                x: number(&caps, "x"),
                y: number(&caps, "y"),
            });
        }
        if let Some(caps) = SERVO.captures(line) {
            return caps["s"].parse().ok().map(Command::Servo);
        }
        if let Some(caps) = DWELL.captures(line) {
            return number(&caps, "p").map(Command::Dwell);
        }
        if let Some(caps) = SETTING.captures(line) {
            let key = caps["key"].parse().ok()?;
            return number(&caps, "value").map(|value| Command::Setting { key, value });
        }
        None
    }
}

/// Carriage position in millimeters
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// A line drawn with the pen down
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stroke {
    pub from: Point,
    pub to: Point,
}

/// Stroke endpoints rounded to micrometers, for set comparisons
pub type StrokeKey = ((i64, i64), (i64, i64));

impl Stroke {
    pub fn key(&self) -> StrokeKey {
        let um = |v: f64| (v * 1000.0).round() as i64;
        (
            (um(self.from.x), um(self.from.y)),
            (um(self.to.x), um(self.to.y)),
        )
    }

    pub fn length(&self) -> f64 {
        (self.to.x - self.from.x).hypot(self.to.y - self.from.y)
    }
}

#[derive(Debug)]
pub struct SimController {
    position: Point,
    absolute: bool,
    servo: Option<u32>,
    /// Servo positions at or below this count as pen down
    pen_threshold: u32,
    settings: [(u32, f64); 2],
    dwell: f64,
    log: Vec<String>,
    strokes: Vec<Stroke>,
    pending: VecDeque<String>,
    silent_after: Option<usize>,
    accepted: usize,
}

impl Default for SimController {
    fn default() -> Self {
        SimController {
            position: Point::default(),
            absolute: false,
            servo: None,
            pen_threshold: 20,
            settings: [(110, 5000.0), (111, 5000.0)],
            dwell: 0.0,
            log: Vec::new(),
            strokes: Vec::new(),
            pending: VecDeque::new(),
            silent_after: None,
            accepted: 0,
        }
    }
}

impl SimController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pen_threshold(mut self, threshold: u32) -> Self {
        self.pen_threshold = threshold;
        self
    }

    /// Stop answering (and executing) once `commands` lines were accepted
    pub fn silent_after(mut self, commands: usize) -> Self {
        self.silent_after = Some(commands);
        self
    }

    /// Every accepted command line, without the terminator
    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    /// Keys of every stroke with a visible length
    pub fn stroke_keys(&self) -> BTreeSet<StrokeKey> {
        self.strokes
            .iter()
            .filter(|s| s.length() > 1e-6)
            .map(Stroke::key)
            .collect()
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn is_pen_down(&self) -> bool {
        self.servo.is_some_and(|s| s <= self.pen_threshold)
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// Total controller dwell in seconds
    pub fn dwell(&self) -> f64 {
        self.dwell
    }

    pub fn setting(&self, key: u32) -> Option<f64> {
        self.settings.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }

    fn is_silent(&self) -> bool {
        self.silent_after.is_some_and(|n| self.accepted >= n)
    }

    fn execute(&mut self, line: &str) {
        let Some(command) = Command::parse(line) else {
            self.pending.push_back(UNSUPPORTED_COMMAND.to_string());
            return;
        };
        match command {
            Command::Absolute => self.absolute = true,
            Command::Move { x, y, .. } => {
                let from = self.position;
                let to = if self.absolute {
                    Point {
                        x: x.unwrap_or(from.x),
                        y: y.unwrap_or(from.y),
                    }
                } else {
                    Point {
                        x: from.x + x.unwrap_or(0.0),
                        y: from.y + y.unwrap_or(0.0),
                    }
                };
                if self.is_pen_down() {
                    self.strokes.push(Stroke { from, to });
                }
                self.position = to;
            }
            Command::Servo(s) => self.servo = Some(s),
            Command::Dwell(seconds) => self.dwell += seconds,
            Command::Setting { key, value } => {
                match self.settings.iter_mut().find(|(k, _)| *k == key) {
                    Some(slot) => slot.1 = value,
                    None => {
                        self.pending.push_back("error:3".to_string());
                        return;
                    }
                }
            }
            Command::BuildInfo => {
                self.pending.extend(VERSION_REPLY.lines().map(str::to_string));
            }
            Command::Settings => {
                let dump: Vec<String> = self
                    .settings
                    .iter()
                    .map(|(k, v)| format!("${k}={v:.3}"))
                    .collect();
                self.pending.extend(dump);
            }
        }
        self.pending.push_back("ok".to_string());
    }
}

impl LineTransport for SimController {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        if self.is_silent() {
            return Ok(());
        }
        let line = line.trim_end_matches(['\r', '\n']);
        self.accepted += 1;
        self.log.push(line.to_string());
        self.execute(line);
        Ok(())
    }

    fn read_line(&mut self) -> io::Result<String> {
        Ok(self.pending.pop_front().unwrap_or_default())
    }
}
