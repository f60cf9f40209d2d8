//! Building regret charts from experiment result files.
//!
//! Two modes mirror the experiment scripts: comparing several labeled
//! configurations (mean curve with a standard-error band each), and plotting
//! the cumulative regret of a single long-format run.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::{
    chart::{ChartSeries, RegretChart},
    config::SeriesSpec,
    results::{ResultsError, SeriesMatrix},
    summary::{CumulativeRegret, CurveSummary},
};

#[derive(Clone, Debug, PartialEq)]
pub struct LoadedSeries {
    pub label: String,
    pub path: PathBuf,
    pub summary: CurveSummary,
}

/// A configuration whose results file does not exist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MissingSeries {
    pub label: String,
    pub path: PathBuf,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadedConfigurations {
    pub series: Vec<LoadedSeries>,
    pub missing: Vec<MissingSeries>,
}

impl LoadedConfigurations {
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Load and summarize every configuration. Absent files are recorded and
/// skipped; any other failure aborts.
pub fn load_configurations(specs: &[SeriesSpec]) -> Result<LoadedConfigurations, ResultsError> {
    let mut loaded = LoadedConfigurations::default();

    for spec in specs {
        match SeriesMatrix::load(&spec.path, spec.layout) {
            Ok(matrix) => {
                info!(
                    label = %spec.label,
                    path = %spec.path.display(),
                    episodes = matrix.episodes(),
                    trials = matrix.trials(),
                    "loaded configuration"
                );
                loaded.series.push(LoadedSeries {
                    label: spec.label.clone(),
                    path: spec.path.clone(),
                    summary: CurveSummary::from_matrix(&matrix),
                });
            }
            Err(err) if err.is_not_found() => {
                warn!(
                    label = %spec.label,
                    path = %spec.path.display(),
                    "results file not found; skipping configuration"
                );
                loaded.missing.push(MissingSeries {
                    label: spec.label.clone(),
                    path: spec.path.clone(),
                });
            }
            Err(err) => return Err(err),
        }
    }

    Ok(loaded)
}

/// One labeled mean curve per present configuration, shaded by
/// `mean ± band_width * standard_error`.
pub fn comparison_chart(
    loaded: &LoadedConfigurations,
    band_width: f64,
    title: impl Into<String>,
) -> RegretChart {
    let mut chart = RegretChart::new(title);
    chart.y_label = "cumulative regret".to_string();

    for series in &loaded.series {
        chart.series.push(ChartSeries {
            label: Some(series.label.clone()),
            values: series.summary.mean.clone(),
            band: Some(series.summary.band(band_width)),
        });
    }

    chart
}

pub fn cumulative_chart(
    regret: &CumulativeRegret,
    label: Option<&str>,
    title: impl Into<String>,
) -> RegretChart {
    let mut chart = RegretChart::new(title);
    chart.y_label = "cumulative regret".to_string();
    chart.series.push(ChartSeries {
        label: label.map(str::to_string),
        values: regret.cumulative.clone(),
        band: None,
    });
    chart
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::results::{ResultRow, ResultTable};
    use crate::summary::cumulative_regret;

    #[test]
    fn absent_configuration_produces_no_series() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("ucbvi_bernstein.csv");
        fs::write(&present, "t0,t1,t2\n0.0,0.0,0.0\n1.0,2.0,3.0\n2.0,3.0,4.0\n").unwrap();
        let specs = vec![
            SeriesSpec::new("bernstein", &present),
            SeriesSpec::new("hoeffding", dir.path().join("ucbvi_hoeffding.csv")),
        ];

        let loaded = load_configurations(&specs).unwrap();
        let chart = comparison_chart(&loaded, 2.0, "regret");

        assert_eq!(chart.labels().collect::<Vec<_>>(), vec!["bernstein"]);
        assert_eq!(loaded.missing.len(), 1);
        assert_eq!(loaded.missing[0].label, "hoeffding");
    }

    #[test]
    fn malformed_file_is_not_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.csv");
        fs::write(&bad, "t0,t1\n1.0,x\n").unwrap();

        let err = load_configurations(&[SeriesSpec::new("bad", &bad)]).unwrap_err();

        assert!(matches!(err, ResultsError::InvalidValue { .. }));
    }

    #[test]
    fn band_uses_requested_width() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        fs::write(&path, "t0,t1\n0.0,2.0\n").unwrap();

        let loaded = load_configurations(&[SeriesSpec::new("a", &path)]).unwrap();
        let chart = comparison_chart(&loaded, 2.0, "regret");

        let (lower, upper) = chart.series[0].band.clone().unwrap();
        // mean 1, std 1, se 1/sqrt(2)
        let se = 1.0 / 2f64.sqrt();
        assert!((lower[0] - (1.0 - 2.0 * se)).abs() < 1e-12);
        assert!((upper[0] - (1.0 + 2.0 * se)).abs() < 1e-12);
    }

    #[test]
    fn cumulative_chart_has_a_single_curve() {
        let table = ResultTable::new(
            (0..4)
                .flat_map(|episode| [episode, episode])
                .map(|episode| ResultRow {
                    episode,
                    regret: 1.0,
                })
                .collect(),
        );
        let regret = cumulative_regret(&table).unwrap();

        let chart = cumulative_chart(&regret, None, "ucbvi");

        assert_eq!(chart.series.len(), 1);
        assert_eq!(chart.series[0].values, vec![1.0, 2.0, 3.0, 4.0]);
        assert!(chart.series[0].band.is_none());
        assert_eq!(chart.labels().count(), 0);
    }
}
