use serde::{Deserialize, Serialize};

use crate::results::{ResultTable, ResultsError, SeriesMatrix};

/// Per-episode mean and standard error across trials.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurveSummary {
    pub trials: usize,
    pub mean: Vec<f64>,
    pub standard_error: Vec<f64>,
}

impl CurveSummary {
    /// Standard error is the population standard deviation over `sqrt(trials)`.
    pub fn from_matrix(matrix: &SeriesMatrix) -> Self {
        let trials = matrix.trials();
        let mut mean = Vec::with_capacity(matrix.episodes());
        let mut standard_error = Vec::with_capacity(matrix.episodes());

        for row in matrix.rows() {
            let count = row.len() as f64;
            let row_mean = row.iter().sum::<f64>() / count;
            let variance = row.iter().map(|v| (v - row_mean).powi(2)).sum::<f64>() / count;
            mean.push(row_mean);
            standard_error.push(variance.sqrt() / count.sqrt());
        }

        Self {
            trials,
            mean,
            standard_error,
        }
    }

    pub fn episodes(&self) -> usize {
        self.mean.len()
    }

    /// Lower and upper bounds of `mean ± width * standard_error`.
    pub fn band(&self, width: f64) -> (Vec<f64>, Vec<f64>) {
        self.mean
            .iter()
            .zip(&self.standard_error)
            .map(|(m, se)| (m - width * se, m + width * se))
            .unzip()
    }

    pub fn final_point(&self) -> Option<(f64, f64)> {
        Some((*self.mean.last()?, *self.standard_error.last()?))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CumulativeRegret {
    pub horizon: usize,
    pub nb_episodes: usize,
    /// Regret at the first row of each episode, `nb_episodes + 1` samples.
    pub sampled: Vec<f64>,
    pub cumulative: Vec<f64>,
}

/// Sample one regret value per episode at a stride of `horizon` rows and
/// accumulate them.
pub fn cumulative_regret(table: &ResultTable) -> Result<CumulativeRegret, ResultsError> {
    let horizon = table.horizon();
    if horizon == 0 {
        return Err(ResultsError::NoInitialEpisode);
    }
    let nb_episodes = table.max_episode().unwrap_or(0);

    let available = table.len();
    let last_row = nb_episodes.checked_mul(horizon);
    if !last_row.is_some_and(|row| row < available) {
        return Err(ResultsError::SampleOutOfRange {
            needed: last_row.unwrap_or(usize::MAX),
            available,
        });
    }

    let sampled: Vec<f64> = table
        .regrets()
        .step_by(horizon)
        .take(nb_episodes + 1)
        .collect();
    let cumulative = cumulative_sum(&sampled);

    Ok(CumulativeRegret {
        horizon,
        nb_episodes,
        sampled,
        cumulative,
    })
}

pub fn cumulative_sum(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .scan(0.0, |total, value| {
            *total += value;
            Some(*total)
        })
        .collect()
}
