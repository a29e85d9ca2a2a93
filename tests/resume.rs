use glam::DVec2;
use penplot::{
    Document, Mode, NoPause, PlotConfig, PlotProgress, Plotter, ResumeAction, RunOutcome,
    RunReport,
};
use penplot_sim::SimController;

const MM: f64 = 25.4;

/// Five one-inch lines at y = 1..=5 inches
fn ladder() -> Document {
    let lines: String = (1..=5)
        .map(|y| format!(r#"<line x1="1" y1="{y}" x2="2" y2="{y}"/>"#))
        .collect();
    Document::parse_svg(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="8in" height="6in" viewBox="0 0 8 6">{lines}</svg>"#
    ))
    .unwrap()
}

fn interrupted_at(last_path: u64, last_path_node_count: u64, pos: DVec2) -> PlotProgress {
    PlotProgress {
        layer: 12345,
        node_count: last_path_node_count + 2,
        last_path,
        last_path_node_count,
        last_known_pos: pos,
        paused_pos: pos,
    }
}

fn resume(doc: &Document, action: ResumeAction, sim: &mut SimController) -> RunReport {
    let config = PlotConfig {
        mode: Mode::Resume,
        resume_action: action,
        ..PlotConfig::default()
    };
    Plotter::new(config).with_pause(NoPause).run(doc, sim).unwrap()
}

fn stroke_rows(sim: &SimController) -> Vec<f64> {
    sim.strokes().iter().map(|s| (s.from.y / MM * 1000.0).round() / 1000.0).collect()
}

#[test]
fn resume_skips_completed_paths() {
    let mut doc = ladder();
    interrupted_at(3, 7, DVec2::new(2.0, 3.0)).write_to(&mut doc);
    let mut sim = SimController::new();
    let report = resume(&doc, ResumeAction::ResumeNow, &mut sim);
    assert!(report.is_completed());
    assert_eq!(report.progress, PlotProgress::default());
    assert_eq!(stroke_rows(&sim), [4.0, 5.0]);
    // travel to the paused position comes before any pen command
    assert_eq!(&sim.log()[..3], ["G90", "G1 F5000 X50.800 Y76.200", "M3 S40"]);
}

#[test]
fn resume_counts_nodes_from_checkpoint() {
    let mut doc = ladder();
    interrupted_at(3, 7, DVec2::new(2.0, 3.0)).write_to(&mut doc);
    // G90, travel, then pen up, move, pen down and draw for the fourth line
    let mut sim = SimController::new().silent_after(8);
    let report = resume(&doc, ResumeAction::ResumeNow, &mut sim);
    assert!(matches!(report.outcome, RunOutcome::Aborted(_)));
    let progress = report.progress;
    assert_eq!(progress.last_path, 4);
    assert_eq!(progress.last_path_node_count, 9);
    assert_eq!(progress.node_count, 9);
    assert_eq!(progress.paused_pos, DVec2::new(2.0, 4.0));
    assert_eq!(stroke_rows(&sim), [4.0]);
}

#[test]
fn go_home_keeps_progress() {
    let mut doc = ladder();
    let old = interrupted_at(3, 7, DVec2::new(2.0, 3.0));
    old.write_to(&mut doc);
    let mut sim = SimController::new();
    let report = resume(&doc, ResumeAction::GoHome, &mut sim);
    assert!(report.is_completed());
    assert_eq!(report.progress, old);
    assert_eq!(sim.log(), ["G90", "M3 S40", "G4 P0.266", "G1 F5000 X0.000 Y0.000"]);
    assert!(sim.strokes().is_empty());
}

#[test]
fn overlong_cursor_draws_nothing() {
    let mut doc = ladder();
    interrupted_at(40, 90, DVec2::new(2.0, 5.0)).write_to(&mut doc);
    let mut sim = SimController::new();
    let report = resume(&doc, ResumeAction::ResumeNow, &mut sim);
    assert!(report.is_completed());
    assert!(sim.strokes().is_empty());
    assert_eq!(sim.position(), Default::default());
}

#[test]
fn layer_resume_stays_in_its_layer() {
    let mut doc = Document::parse_svg(
        r#"<svg xmlns="http://www.w3.org/2000/svg"
            xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape"
            width="8in" height="6in" viewBox="0 0 8 6">
          <g inkscape:groupmode="layer" inkscape:label="1">
            <line x1="1" y1="1" x2="2" y2="1"/>
          </g>
          <g inkscape:groupmode="layer" inkscape:label="2">
            <line x1="1" y1="2" x2="2" y2="2"/>
            <line x1="1" y1="3" x2="2" y2="3"/>
          </g>
        </svg>"#,
    )
    .unwrap();
    PlotProgress {
        layer: 2,
        ..interrupted_at(1, 2, DVec2::new(2.0, 2.0))
    }
    .write_to(&mut doc);
    let mut sim = SimController::new();
    let report = resume(&doc, ResumeAction::ResumeNow, &mut sim);
    assert!(report.is_completed());
    assert_eq!(stroke_rows(&sim), [3.0]);
}

#[test]
fn stopped_plot_resumes_where_it_left_off() {
    let doc = ladder();
    let mut first = SimController::new().silent_after(12);
    let report = Plotter::new(PlotConfig::default())
        .with_pause(NoPause)
        .run(&doc, &mut first)
        .unwrap();
    assert!(matches!(report.outcome, RunOutcome::Aborted(_)));

    let mut saved = doc.clone();
    report.persist(&mut saved);
    assert_eq!(PlotProgress::read_from(&saved), report.progress);

    let mut second = SimController::new();
    let resumed = resume(&saved, ResumeAction::ResumeNow, &mut second);
    assert!(resumed.is_completed());
    let mut rows = stroke_rows(&first);
    rows.extend(stroke_rows(&second));
    rows.dedup();
    assert_eq!(rows, [1.0, 2.0, 3.0, 4.0, 5.0]);
}
