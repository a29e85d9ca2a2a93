use penplot::{ConfigError, ManualCommand, Mode, PlotConfig, ResumeAction, SetupAction};

#[test]
fn partial_json_fills_in_defaults() {
    let config: PlotConfig = serde_json::from_str(
        r#"{ "mode": "resume", "resume_action": "go-home", "pen_down_height": 15 }"#,
    )
    .unwrap();
    assert_eq!(config.mode, Mode::Resume);
    assert_eq!(config.resume_action, ResumeAction::GoHome);
    assert_eq!(config.pen_down_height, 15);
    assert_eq!(config.pen_up_height, PlotConfig::default().pen_up_height);
    assert!(config.validate().is_ok());
}

#[test]
fn manual_and_setup_actions_use_kebab_case() {
    let config: PlotConfig = serde_json::from_str(
        r#"{ "manual_command": "walk-y", "walk_distance": -0.5, "setup_action": "toggle-pen" }"#,
    )
    .unwrap();
    assert_eq!(config.manual_command, ManualCommand::WalkY);
    assert_eq!(config.setup_action, SetupAction::TogglePen);
    assert!(config.validate().is_ok());
}

#[test]
fn serialized_defaults_read_back_unchanged() {
    let text = serde_json::to_string(&PlotConfig::default()).unwrap();
    assert!(text.contains(r#""mode":"plot""#));
    let config: PlotConfig = serde_json::from_str(&text).unwrap();
    assert_eq!(config, PlotConfig::default());
}

#[test]
fn unknown_mode_is_a_parse_error() {
    assert!(serde_json::from_str::<PlotConfig>(r#"{ "mode": "engrave" }"#).is_err());
}

#[test]
fn layer_mode_rejects_out_of_range_target() {
    let config: PlotConfig =
        serde_json::from_str(r#"{ "mode": "layer", "target_layer": 101 }"#).unwrap();
    let err = config.validate().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidOption { name: "target_layer", .. }));
}
