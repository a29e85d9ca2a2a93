//! Plot an SVG against the simulated controller and print the run report.
//!
//! Usage: `cargo run --example plot_svg --features tracing -- drawing.svg [config.json]`

use miette::{IntoDiagnostic, WrapErr};
use penplot::{Document, NoPause, PlotConfig, Plotter, RunOutcome};
use penplot_sim::SimController;

fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/shapes.svg").to_string());
    let source = std::fs::read_to_string(&path)
        .into_diagnostic()
        .wrap_err_with(|| format!("reading {path}"))?;

    let config = match std::env::args().nth(2) {
        Some(config_path) => {
            let text = std::fs::read_to_string(&config_path).into_diagnostic()?;
            serde_json::from_str::<PlotConfig>(&text)
                .into_diagnostic()
                .wrap_err_with(|| format!("parsing {config_path}"))?
        }
        None => PlotConfig::default(),
    };

    let doc = Document::parse_svg(&source)?;
    let mut sim = SimController::new();
    let report = Plotter::new(config).with_pause(NoPause).run(&doc, &mut sim)?;

    for warning in &report.warnings {
        eprintln!("{:?}", miette::Report::new(*warning));
    }
    match &report.outcome {
        RunOutcome::Completed => println!("completed"),
        RunOutcome::Stopped => println!("stopped"),
        RunOutcome::Aborted(e) => println!("aborted: {e}"),
    }
    println!("commands sent: {}", sim.log().len());
    println!("strokes drawn: {}", sim.strokes().len());
    if let Some(bounds) = report.bounding_box {
        println!(
            "extent: ({:.3}, {:.3}) to ({:.3}, {:.3}) in",
            bounds.min.x, bounds.min.y, bounds.max.x, bounds.max.y
        );
    }
    if let Some(stats) = report.stats {
        println!("pen down: {}, total travel: {}", stats.pen_down, stats.total);
    }
    for reply in &report.replies {
        println!("{reply}");
    }
    Ok(())
}
