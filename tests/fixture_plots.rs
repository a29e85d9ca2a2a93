use datatest_stable::Utf8Path;
use penplot::{Document, Mode, NoPause, PlotConfig, PlotProgress, Plotter, RunOutcome, RunReport};
use penplot_sim::{SimController, StrokeKey};
use std::collections::BTreeSet;

/// Interruption points tried per fixture
const CUTS: usize = 16;

fn plot(doc: &Document, config: &PlotConfig, sim: &mut SimController) -> RunReport {
    Plotter::new(config.clone())
        .with_pause(NoPause)
        .run(doc, sim)
        .expect("fixture passes validation")
}

fn missing(expected: &BTreeSet<StrokeKey>, drawn: &BTreeSet<StrokeKey>) -> usize {
    expected.difference(drawn).count()
}

/// Plot the fixture once, then cut the link at evenly spaced commands and
/// resume from the persisted progress. The interrupted and resumed runs
/// together must draw exactly the strokes of the uninterrupted plot.
fn interrupted_plots_resume(path: &Utf8Path) -> datatest_stable::Result<()> {
    let source = std::fs::read_to_string(path)?;
    let doc = Document::parse_svg(&source)?;
    let config = PlotConfig::default();
    let resume = PlotConfig {
        mode: Mode::Resume,
        ..PlotConfig::default()
    };

    let mut full = SimController::new();
    let report = plot(&doc, &config, &mut full);
    if !report.is_completed() {
        return Err(format!("{path}: uninterrupted plot ended with {:?}", report.outcome).into());
    }
    if report.progress != PlotProgress::default() {
        return Err(format!("{path}: completed plot left progress behind").into());
    }
    if full.position() != Default::default() || full.is_pen_down() {
        return Err(format!("{path}: plot did not end at home with the pen up").into());
    }
    let expected = full.stroke_keys();
    if expected.is_empty() {
        return Err(format!("{path}: fixture draws nothing").into());
    }

    let total = full.log().len();
    let step = (total / CUTS).max(1);
    for cut in (1..total).step_by(step) {
        let mut first = SimController::new().silent_after(cut);
        let report = plot(&doc, &config, &mut first);
        if !matches!(report.outcome, RunOutcome::Aborted(_)) {
            return Err(format!("{path}: cut at {cut} was not noticed").into());
        }
        let mut drawn = first.stroke_keys();
        if !drawn.is_subset(&expected) {
            return Err(format!("{path}: cut at {cut} drew strokes the full plot does not").into());
        }

        let mut saved = doc.clone();
        report.persist(&mut saved);
        // Nothing was sent past the preamble: start over instead
        let second_config = if report.progress.is_in_progress() { &resume } else { &config };
        let mut second = SimController::new();
        let report = plot(&saved, second_config, &mut second);
        if !report.is_completed() {
            return Err(format!("{path}: resume after cut {cut} ended with {:?}", report.outcome).into());
        }
        if report.progress != PlotProgress::default() {
            return Err(format!("{path}: resume after cut {cut} left progress behind").into());
        }
        let redrawn = second.stroke_keys();
        if !redrawn.is_subset(&expected) {
            return Err(format!("{path}: resume after cut {cut} drew unexpected strokes").into());
        }
        drawn.extend(redrawn);
        let lost = missing(&expected, &drawn);
        if lost > 0 {
            return Err(format!("{path}: {lost} strokes lost when cut at {cut} of {total}").into());
        }
    }
    Ok(())
}

datatest_stable::harness! {
    { test = interrupted_plots_resume, root = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures"), pattern = r"\.svg$" },
}
