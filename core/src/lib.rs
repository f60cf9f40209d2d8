pub mod bundle;
pub mod chart;
pub mod comparison;
pub mod config;
pub mod logging;
pub mod report;
pub mod results;
pub mod summary;
pub mod synthetic;

pub use bundle::{BundleError, FileKind, SourceFile, SourceTree};
pub use chart::{encode_svg_data_url, render_svg, save_chart, ChartSeries, RegretChart};
pub use comparison::{
    comparison_chart, cumulative_chart, load_configurations, LoadedConfigurations, LoadedSeries,
    MissingSeries,
};
pub use config::{load_or_init, PlotConfig, Preset, SeriesSpec};
pub use report::{Notebook, ReportSection, REGRET_REPORT_TEMPLATE};
pub use results::{CsvLayout, ResultRow, ResultTable, ResultsError, SeriesMatrix};
pub use summary::{cumulative_regret, cumulative_sum, CumulativeRegret, CurveSummary};
pub use synthetic::{seeded_rng, write_demo_data, SyntheticRun};
