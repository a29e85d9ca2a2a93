//! Layer label directives.
//!
//! A layer label such as `"3+h20+s50 outline"` selects layer 3, lowers the
//! pen to height 20 and draws at 50 percent speed. A label starting with `%`
//! is never plotted.

use crate::defaults::{ALL_LAYERS, MAX_LAYER_NUMBER};

/// What a layer label asks of the plotter
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LayerDirective {
    pub layer_number: Option<u32>,
    pub skip: bool,
    /// Pen-down servo position, 0..=100
    pub pen_down_height: Option<u8>,
    /// Percentage of the configured pen-down speed, 1..=100
    pub pen_down_speed: Option<u8>,
}

/// Lexer states while scanning a label
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LexState {
    /// Expecting `+` to start an escape
    Escape,
    /// Saw `+`, expecting `h` or `s`
    Code,
    /// Collecting digits for the escape code
    Digits(EscapeKind),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EscapeKind {
    Height,
    Speed,
}

/// Parse a layer label into its directive
pub fn classify(label: &str) -> LayerDirective {
    let label = label.trim_start();
    if label.starts_with('%') {
        return LayerDirective {
            skip: true,
            ..LayerDirective::default()
        };
    }

    let digits_end = label
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(label.len());
    let mut directive = LayerDirective {
        layer_number: parse_digits(&label[..digits_end]),
        ..LayerDirective::default()
    };

    let mut state = LexState::Escape;
    let mut digits_start = digits_end;
    let rest = &label[digits_end..];
    for (offset, c) in rest.char_indices().chain(std::iter::once((rest.len(), '\0'))) {
        let pos = digits_end + offset;
        state = match (state, c) {
            (LexState::Escape, '+') => LexState::Code,
            (LexState::Escape, _) => break,
            (LexState::Code, 'h' | 'H') => {
                digits_start = pos + 1;
                LexState::Digits(EscapeKind::Height)
            }
            (LexState::Code, 's' | 'S') => {
                digits_start = pos + 1;
                LexState::Digits(EscapeKind::Speed)
            }
            (LexState::Code, _) => break,
            (LexState::Digits(_), d) if d.is_ascii_digit() => state,
            (LexState::Digits(kind), next) => {
                if pos == digits_start {
                    // `+h` with no digits ends the escapes
                    break;
                }
                apply_escape(&mut directive, kind, parse_digits(&label[digits_start..pos]));
                if next == '+' {
                    LexState::Code
                } else {
                    break;
                }
            }
        };
    }
    directive
}

fn parse_digits(digits: &str) -> Option<u32> {
    if digits.is_empty() {
        return None;
    }
    digits.parse::<u32>().ok()
}

fn apply_escape(directive: &mut LayerDirective, kind: EscapeKind, value: Option<u32>) {
    let Some(value) = value else {
        return;
    };
    match kind {
        EscapeKind::Height if value <= 100 => directive.pen_down_height = Some(value as u8),
        EscapeKind::Speed if (1..=100).contains(&value) => directive.pen_down_speed = Some(value as u8),
        _ => {}
    }
}

/// Which layers participate in a run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerSelection {
    All,
    Only(u32),
}

impl LayerSelection {
    /// Decode a persisted progress layer code
    pub fn from_code(code: i64) -> Self {
        match u32::try_from(code) {
            Ok(n) if n <= MAX_LAYER_NUMBER => LayerSelection::Only(n),
            _ => LayerSelection::All,
        }
    }

    pub fn code(&self) -> i64 {
        match *self {
            LayerSelection::All => ALL_LAYERS,
            LayerSelection::Only(n) => i64::from(n),
        }
    }
}

/// Decides participation of layers and content outside any layer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerSelector {
    selection: LayerSelection,
}

impl LayerSelector {
    pub fn new(selection: LayerSelection) -> Self {
        LayerSelector { selection }
    }

    pub fn selection(&self) -> LayerSelection {
        self.selection
    }

    /// Whether content governed by `directive` is plotted. `None` stands for
    /// content outside every layer.
    pub fn is_active(&self, directive: Option<&LayerDirective>) -> bool {
        match (directive, self.selection) {
            (None, LayerSelection::All) => true,
            (None, LayerSelection::Only(_)) => false,
            (Some(d), _) if d.skip => false,
            (Some(_), LayerSelection::All) => true,
            (Some(d), LayerSelection::Only(target)) => d.layer_number == Some(target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_and_both_overrides() {
        assert_eq!(
            classify("3+h20+s50"),
            LayerDirective {
                layer_number: Some(3),
                skip: false,
                pen_down_height: Some(20),
                pen_down_speed: Some(50),
            }
        );
    }

    #[test]
    fn percent_skips() {
        let d = classify("%hidden");
        assert!(d.skip);
        assert_eq!(d.layer_number, None);
        assert!(classify("  %3 still hidden").skip);
    }

    #[test]
    fn leading_whitespace_is_stripped() {
        assert_eq!(classify("  12 border").layer_number, Some(12));
    }

    #[test]
    fn escapes_are_case_insensitive() {
        let d = classify("1+S30+H5 name");
        assert_eq!(d.pen_down_speed, Some(30));
        assert_eq!(d.pen_down_height, Some(5));
    }

    #[test]
    fn out_of_range_values_are_ignored() {
        let d = classify("2+h150+s0+s101");
        assert_eq!(d.layer_number, Some(2));
        assert_eq!(d.pen_down_height, None);
        assert_eq!(d.pen_down_speed, None);
    }

    #[test]
    fn last_valid_value_wins() {
        let d = classify("2+s10+s20+s500");
        assert_eq!(d.pen_down_speed, Some(20));
    }

    #[test]
    fn scanning_stops_at_first_mismatch() {
        let d = classify("4 +h20");
        assert_eq!(d.layer_number, Some(4));
        assert_eq!(d.pen_down_height, None);

        let d = classify("4+h+s20");
        assert_eq!(d.pen_down_height, None);
        assert_eq!(d.pen_down_speed, None);

        let d = classify("4+x20");
        assert_eq!(d.pen_down_height, None);
    }

    #[test]
    fn unnumbered_label() {
        let d = classify("sketch");
        assert_eq!(d, LayerDirective::default());
        assert_eq!(classify("").layer_number, None);
    }

    #[test]
    fn selection_rules() {
        let all = LayerSelector::new(LayerSelection::All);
        let only3 = LayerSelector::new(LayerSelection::Only(3));
        let three = classify("3");
        let four = classify("4 other");
        let hidden = classify("%3");
        let unnumbered = classify("notes");

        assert!(all.is_active(None));
        assert!(all.is_active(Some(&unnumbered)));
        assert!(!all.is_active(Some(&hidden)));

        assert!(only3.is_active(Some(&three)));
        assert!(!only3.is_active(Some(&four)));
        assert!(!only3.is_active(Some(&unnumbered)));
        assert!(!only3.is_active(None));
    }

    #[test]
    fn layer_codes() {
        assert_eq!(LayerSelection::from_code(12345), LayerSelection::All);
        assert_eq!(LayerSelection::from_code(7), LayerSelection::Only(7));
        assert_eq!(LayerSelection::Only(7).code(), 7);
        assert_eq!(LayerSelection::All.code(), ALL_LAYERS);
    }
}
