use std::{
    fmt::Write,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use rlcpp_lab_core::{
    comparison_chart, cumulative_chart, cumulative_regret, encode_svg_data_url, load_configurations,
    load_or_init, logging, save_chart, write_demo_data, LoadedConfigurations, Notebook, PlotConfig,
    Preset, ReportSection, ResultTable, SeriesSpec, SyntheticRun, REGRET_REPORT_TEMPLATE,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "regret-curves", about = "Plot cumulative regret from experiment CSVs")]
struct Cli {
    /// Log at debug level unless RUST_LOG is set.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compare labeled configurations: mean curve with a standard-error band each.
    Compare(CompareArgs),
    /// Cumulative regret of a single long-format run.
    Cumulative(CumulativeArgs),
    /// Write seeded demo result files.
    Synth(SynthArgs),
}

#[derive(Args, Debug)]
struct CompareArgs {
    /// JSON plot config; written with the preset's defaults if missing.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Which data files to compare when no config or series are given.
    #[arg(long, default_value = "ucbvi", value_parser = parse_preset)]
    preset: Preset,
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
    /// LABEL=PATH; replaces the configured series when given.
    #[arg(long = "series", value_parser = parse_series)]
    series: Vec<SeriesSpec>,
    #[arg(long)]
    output: Option<PathBuf>,
    /// Markdown notebook to update with the run's summary and chart.
    #[arg(long)]
    report: Option<PathBuf>,
    /// Band half-width in standard errors.
    #[arg(long)]
    band_width: Option<f64>,
}

#[derive(Args, Debug)]
struct CumulativeArgs {
    #[arg(long, default_value = "data/ucbvi.csv")]
    input: PathBuf,
    /// Legend label; the curve is unlabeled when omitted.
    #[arg(long)]
    label: Option<String>,
    #[arg(long, default_value = "plots/ucbvi_cumulative.svg")]
    output: PathBuf,
    #[arg(long, default_value_t = 1024)]
    width: u32,
    #[arg(long, default_value_t = 640)]
    height: u32,
}

#[derive(Args, Debug)]
struct SynthArgs {
    #[arg(long, default_value = "data")]
    out_dir: PathBuf,
    #[arg(long, default_value_t = 1337)]
    seed: u64,
    #[arg(long, default_value_t = 8)]
    trials: usize,
    #[arg(long, default_value_t = 200)]
    episodes: usize,
    #[arg(long, default_value_t = 7)]
    horizon: usize,
}

fn parse_preset(value: &str) -> Result<Preset> {
    Preset::from_str(value)
}

fn parse_series(value: &str) -> Result<SeriesSpec> {
    SeriesSpec::parse_pair(value)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Compare(args) => run_compare(args),
        Commands::Cumulative(args) => run_cumulative(args),
        Commands::Synth(args) => run_synth(args),
    }
}

fn resolve_config(args: &CompareArgs) -> Result<PlotConfig> {
    let defaults = || PlotConfig::from_preset(args.preset, &args.data_dir);
    let mut config = match &args.config {
        Some(path) => load_or_init(path, defaults)?,
        None => defaults(),
    };

    if !args.series.is_empty() {
        config.series = args.series.clone();
    }
    if let Some(output) = &args.output {
        config.output = output.clone();
    }
    if let Some(report) = &args.report {
        config.report = Some(report.clone());
    }
    if let Some(band_width) = args.band_width {
        config.band_width = band_width;
    }

    config.validate()?;
    Ok(config)
}

fn run_compare(args: CompareArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    let loaded = load_configurations(&config.series).context("failed to load results")?;

    for missing in &loaded.missing {
        println!(
            "skipping {}: {} not found",
            missing.label,
            missing.path.display()
        );
    }
    if loaded.is_empty() {
        println!("no result files found; the chart will be empty");
    }

    let chart = comparison_chart(&loaded, config.band_width, config.title.as_str());
    let svg = save_chart(&config.output, &chart, config.size())?;
    info!(
        path = %config.output.display(),
        series = chart.series.len(),
        "wrote comparison chart"
    );

    if let Some(report) = &config.report {
        write_report(report, &config, &loaded, &svg)?;
        println!("updated report at {}", report.display());
    }

    println!("wrote chart to {}", config.output.display());
    Ok(())
}

fn run_cumulative(args: CumulativeArgs) -> Result<()> {
    let table = ResultTable::load(&args.input)?;
    let regret = cumulative_regret(&table)?;
    info!(
        horizon = regret.horizon,
        episodes = regret.nb_episodes,
        "sampled cumulative regret"
    );

    let title = format!("Cumulative regret ({})", display_stem(&args.input));
    let chart = cumulative_chart(&regret, args.label.as_deref(), title);
    save_chart(&args.output, &chart, (args.width, args.height))?;

    if let Some(total) = regret.cumulative.last() {
        println!(
            "{} episodes, horizon {}: final cumulative regret {:.4}",
            regret.nb_episodes, regret.horizon, total
        );
    }
    println!("wrote chart to {}", args.output.display());
    Ok(())
}

fn run_synth(args: SynthArgs) -> Result<()> {
    if args.trials == 0 || args.episodes == 0 || args.horizon == 0 {
        return Err(anyhow!("trials, episodes and horizon must be positive"));
    }

    let run = SyntheticRun {
        episodes: args.episodes,
        horizon: args.horizon,
        trials: args.trials,
        ..SyntheticRun::default()
    };
    for path in write_demo_data(&args.out_dir, &run, args.seed)? {
        println!("wrote {path}");
    }
    Ok(())
}

fn display_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn write_report(
    path: &Path,
    config: &PlotConfig,
    loaded: &LoadedConfigurations,
    svg: &str,
) -> Result<()> {
    let notebook = Notebook::open_or_create(path, REGRET_REPORT_TEMPLATE)?;
    let sections = [
        ReportSection::new("configuration", render_configuration_section(config)),
        ReportSection::new("series", render_series_section(loaded)),
        ReportSection::new("missing", render_missing_section(loaded)),
        ReportSection::new(
            "chart",
            format!("![{}]({})", config.title, encode_svg_data_url(svg)),
        ),
    ];

    notebook.update(&sections)
}

fn render_configuration_section(config: &PlotConfig) -> String {
    let mut output = String::new();
    let _ = writeln!(&mut output, "- Title: {}", config.title);
    let _ = writeln!(
        &mut output,
        "- Band: mean ± {:.1} standard errors",
        config.band_width
    );
    let _ = writeln!(&mut output, "- Chart size: {}x{}", config.width, config.height);
    let _ = writeln!(&mut output, "- Output: {}", config.output.display());
    for spec in &config.series {
        let _ = writeln!(
            &mut output,
            "- Series `{}`: {} ({:?} layout)",
            spec.label,
            spec.path.display(),
            spec.layout
        );
    }
    output
}

fn render_series_section(loaded: &LoadedConfigurations) -> String {
    if loaded.series.is_empty() {
        return "No series were plotted.".to_string();
    }

    let mut output = String::new();
    let _ = writeln!(
        &mut output,
        "| Configuration | Trials | Episodes | Final mean | Final std. error |"
    );
    let _ = writeln!(&mut output, "| --- | --- | --- | --- | --- |");
    for series in &loaded.series {
        let (mean, se) = series.summary.final_point().unwrap_or((f64::NAN, f64::NAN));
        let _ = writeln!(
            &mut output,
            "| {} | {} | {} | {:.4} | {:.4} |",
            series.label,
            series.summary.trials,
            series.summary.episodes(),
            mean,
            se
        );
    }
    output
}

fn render_missing_section(loaded: &LoadedConfigurations) -> String {
    let mut output = String::new();
    for missing in &loaded.missing {
        let _ = writeln!(
            &mut output,
            "- `{}` skipped: {} not found",
            missing.label,
            missing.path.display()
        );
    }
    output
}
