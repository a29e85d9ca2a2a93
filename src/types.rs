//! Strongly-typed numeric primitives for penplot (zero-cost newtypes).
//!
//! Plot geometry lives in inches; the controller speaks millimeters.
//! Conversions between the two go through [`Inches::to_mm`].

use glam::DVec2;
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub};

/// Millimeters per inch
pub const MM_PER_INCH: f64 = 25.4;

/// Error type for invalid numeric values
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericError {
    /// Value is NaN
    NaN,
    /// Value is infinite
    Infinite,
    /// Value is zero when non-zero required
    Zero,
    /// Value is negative when positive required
    Negative,
}

impl fmt::Display for NumericError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericError::NaN => write!(f, "value is NaN"),
            NumericError::Infinite => write!(f, "value is infinite"),
            NumericError::Zero => write!(f, "value is zero"),
            NumericError::Negative => write!(f, "value is negative"),
        }
    }
}

impl std::error::Error for NumericError {}

/// Reject NaN and infinities
pub fn check_finite(val: f64) -> Result<f64, NumericError> {
    if val.is_nan() {
        Err(NumericError::NaN)
    } else if val.is_infinite() {
        Err(NumericError::Infinite)
    } else {
        Ok(val)
    }
}

/// Reject anything that is not a finite, strictly positive number
pub fn check_positive(val: f64) -> Result<f64, NumericError> {
    let val = check_finite(val)?;
    if val == 0.0 {
        Err(NumericError::Zero)
    } else if val < 0.0 {
        Err(NumericError::Negative)
    } else {
        Ok(val)
    }
}

/// Length in inches (plot canonical unit)
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default)]
#[repr(transparent)]
pub struct Inches(pub f64);

impl Inches {
    pub const ZERO: Inches = Inches(0.0);

    /// Create a length with validation (rejects NaN/infinite)
    #[inline]
    pub fn try_new(val: f64) -> Result<Inches, NumericError> {
        check_finite(val).map(Inches)
    }

    #[inline]
    pub fn to_mm(self) -> Millimeters {
        Millimeters(self.0 * MM_PER_INCH)
    }

    #[inline]
    pub fn raw(self) -> f64 {
        self.0
    }
}

impl Add for Inches {
    type Output = Inches;
    fn add(self, rhs: Inches) -> Inches { Inches(self.0 + rhs.0) }
}
impl Sub for Inches {
    type Output = Inches;
    fn sub(self, rhs: Inches) -> Inches { Inches(self.0 - rhs.0) }
}
impl Mul<f64> for Inches {
    type Output = Inches;
    fn mul(self, rhs: f64) -> Inches { Inches(self.0 * rhs) }
}
impl AddAssign for Inches {
    fn add_assign(&mut self, rhs: Inches) {
        self.0 += rhs.0;
    }
}

impl fmt::Display for Inches {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} in", self.0)
    }
}

/// Length in millimeters (controller unit)
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default)]
#[repr(transparent)]
pub struct Millimeters(pub f64);

impl Millimeters {
    #[inline]
    pub fn to_inches(self) -> Inches {
        Inches(self.0 / MM_PER_INCH)
    }

    #[inline]
    pub fn raw(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Millimeters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

/// Physical units accepted on document dimensions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LengthUnit {
    Inch,
    Millimeter,
    Centimeter,
    Pixel,
    Point,
    Pica,
}

impl LengthUnit {
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "in" => Some(LengthUnit::Inch),
            "mm" => Some(LengthUnit::Millimeter),
            "cm" => Some(LengthUnit::Centimeter),
            "" | "px" => Some(LengthUnit::Pixel),
            "pt" => Some(LengthUnit::Point),
            "pc" => Some(LengthUnit::Pica),
            _ => None,
        }
    }

    /// How many of this unit make an inch
    pub fn per_inch(self) -> f64 {
        match self {
            LengthUnit::Inch => 1.0,
            LengthUnit::Millimeter => MM_PER_INCH,
            LengthUnit::Centimeter => MM_PER_INCH / 10.0,
            LengthUnit::Pixel => crate::defaults::PX_PER_INCH,
            LengthUnit::Point => 72.0,
            LengthUnit::Pica => 6.0,
        }
    }
}

/// Parse an absolute length such as `"210mm"` or `"8.5in"` into inches.
///
/// Percentages and unknown suffixes return `None`.
pub fn parse_length(text: &str) -> Option<Inches> {
    let text = text.trim();
    let split = text
        .find(|c: char| c.is_ascii_alphabetic() || c == '%')
        .unwrap_or(text.len());
    let (number, suffix) = text.split_at(split);
    let unit = LengthUnit::from_suffix(suffix.trim())?;
    let value: f64 = number.trim().parse().ok()?;
    Inches::try_new(value / unit.per_inch()).ok()
}

/// Axis-aligned bounding box in inches
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: DVec2,
    pub max: DVec2,
}

impl BoundingBox {
    /// Create an empty bounding box (will expand on first point)
    pub fn new() -> Self {
        BoundingBox {
            min: DVec2::splat(f64::MAX),
            max: DVec2::splat(f64::MIN),
        }
    }

    /// Check if the bbox is empty (never expanded)
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    /// Expand to include a point
    pub fn expand_point(&mut self, p: DVec2) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn width(&self) -> Inches { Inches(self.max.x - self.min.x) }

    pub fn height(&self) -> Inches { Inches(self.max.y - self.min.y) }

    /// Corners in drawing order, starting and ending at the minimum corner
    pub fn outline(&self) -> [DVec2; 5] {
        [
            self.min,
            DVec2::new(self.max.x, self.min.y),
            self.max,
            DVec2::new(self.min.x, self.max.y),
            self.min,
        ]
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::new()
    }
}

/// Plottable area, from the origin to the page size
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageBounds {
    pub width: Inches,
    pub height: Inches,
}

impl PageBounds {
    pub fn new(width: Inches, height: Inches) -> Self {
        PageBounds { width, height }
    }

    /// Clamp a destination into the page. The flag reports whether any
    /// coordinate had to move.
    pub fn clamp(&self, p: DVec2) -> (DVec2, bool) {
        let clamped = DVec2::new(
            p.x.clamp(0.0, self.width.0),
            p.y.clamp(0.0, self.height.0),
        );
        (clamped, clamped != p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inches_try_new_rejects_nan() {
        assert_eq!(Inches::try_new(f64::NAN), Err(NumericError::NaN));
        assert_eq!(Inches::try_new(f64::INFINITY), Err(NumericError::Infinite));
        assert_eq!(Inches::try_new(1.5), Ok(Inches(1.5)));
    }

    #[test]
    fn check_positive_rejects_zero_and_negative() {
        assert_eq!(check_positive(0.0), Err(NumericError::Zero));
        assert_eq!(check_positive(-2.0), Err(NumericError::Negative));
        assert_eq!(check_positive(3.0), Ok(3.0));
    }

    #[test]
    fn inches_to_mm() {
        assert_eq!(Inches(1.0).to_mm(), Millimeters(25.4));
        assert!((Millimeters(50.8).to_inches().0 - 2.0).abs() < 1e-12);
    }

    #[test]
    fn parse_length_units() {
        assert_eq!(parse_length("2in"), Some(Inches(2.0)));
        assert_eq!(parse_length("96"), Some(Inches(1.0)));
        assert_eq!(parse_length("192px"), Some(Inches(2.0)));
        assert_eq!(parse_length("72pt"), Some(Inches(1.0)));
        assert_eq!(parse_length("12pc"), Some(Inches(2.0)));
        assert!((parse_length("254mm").unwrap().0 - 10.0).abs() < 1e-12);
        assert!((parse_length(" 2.54cm ").unwrap().0 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn parse_length_rejects_relative_and_garbage() {
        assert_eq!(parse_length("100%"), None);
        assert_eq!(parse_length("12em"), None);
        assert_eq!(parse_length("abc"), None);
        assert_eq!(parse_length(""), None);
    }

    #[test]
    fn bbox_starts_empty_and_only_grows() {
        let mut bb = BoundingBox::new();
        assert!(bb.is_empty());
        bb.expand_point(DVec2::new(1.0, 2.0));
        bb.expand_point(DVec2::new(3.0, -1.0));
        let before = bb;
        bb.expand_point(DVec2::new(2.0, 0.0));
        assert_eq!(bb, before);
        assert_eq!(bb.min, DVec2::new(1.0, -1.0));
        assert_eq!(bb.max, DVec2::new(3.0, 2.0));
        assert_eq!(bb.width(), Inches(2.0));
    }

    #[test]
    fn page_bounds_clamp_flags_moves() {
        let page = PageBounds::new(Inches(10.0), Inches(5.0));
        assert_eq!(page.clamp(DVec2::new(1.0, 1.0)), (DVec2::new(1.0, 1.0), false));
        assert_eq!(page.clamp(DVec2::new(-1.0, 7.0)), (DVec2::new(0.0, 5.0), true));
    }
}
