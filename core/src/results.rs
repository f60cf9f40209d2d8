use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
};

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const EPISODE_COLUMN: &str = "episode";
pub const REGRET_COLUMN: &str = "regret";

#[derive(Debug, Error)]
pub enum ResultsError {
    #[error("results file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed CSV in {}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{} has no `{column}` column", path.display())]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error("{}:{line}: invalid value {value:?} in column `{column}`", path.display())]
    InvalidValue {
        path: PathBuf,
        line: u64,
        column: String,
        value: String,
    },
    #[error("no result rows in {}", path.display())]
    EmptyTable { path: PathBuf },
    #[error("trial {trial} has {found} episodes, expected {expected}")]
    ShapeMismatch {
        trial: usize,
        expected: usize,
        found: usize,
    },
    #[error("episode {episode} has {found} trial values, expected {expected}")]
    RaggedRow {
        episode: usize,
        expected: usize,
        found: usize,
    },
    #[error("no rows with episode 0; cannot infer the horizon")]
    NoInitialEpisode,
    #[error("stride sampling needs row {needed} but only {available} rows are present")]
    SampleOutOfRange { needed: usize, available: usize },
}

impl ResultsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// How a results CSV lays out its values.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CsvLayout {
    /// Long when the header has both `episode` and `regret`, wide otherwise.
    #[default]
    Auto,
    /// One `episode,regret` row per sample, trials stacked one after another.
    Long,
    /// One column per trial, one row per episode.
    Wide,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResultRow {
    pub episode: usize,
    pub regret: f64,
}

/// Long-format results: `episode` and `regret` columns in file order.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultTable {
    rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn new(rows: Vec<ResultRow>) -> Self {
        Self { rows }
    }

    pub fn load(path: &Path) -> Result<Self, ResultsError> {
        let mut reader = open_csv(path)?;
        let headers = read_headers(&mut reader, path)?;
        Self::from_records(path, &headers, &mut reader)
    }

    fn from_records(
        path: &Path,
        headers: &StringRecord,
        reader: &mut csv::Reader<File>,
    ) -> Result<Self, ResultsError> {
        let episode_idx = column_index(headers, EPISODE_COLUMN).ok_or_else(|| {
            ResultsError::MissingColumn {
                path: path.to_path_buf(),
                column: EPISODE_COLUMN,
            }
        })?;
        let regret_idx = column_index(headers, REGRET_COLUMN).ok_or_else(|| {
            ResultsError::MissingColumn {
                path: path.to_path_buf(),
                column: REGRET_COLUMN,
            }
        })?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|source| csv_error(path, source))?;
            let episode = parse_episode(path, &record, episode_idx)?;
            let regret = parse_float(path, &record, regret_idx, REGRET_COLUMN)?;
            rows.push(ResultRow { episode, regret });
        }

        if rows.is_empty() {
            return Err(ResultsError::EmptyTable {
                path: path.to_path_buf(),
            });
        }

        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows sharing episode 0.
    pub fn horizon(&self) -> usize {
        self.rows.iter().filter(|row| row.episode == 0).count()
    }

    pub fn max_episode(&self) -> Option<usize> {
        self.rows.iter().map(|row| row.episode).max()
    }

    pub fn regrets(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(|row| row.regret)
    }
}

/// Regret values arranged as episodes × trials, stored row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct SeriesMatrix {
    episodes: usize,
    trials: usize,
    values: Vec<f64>,
}

impl SeriesMatrix {
    /// Build from per-episode rows. Every row must hold one value per trial.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, ResultsError> {
        let trials = rows.first().map(Vec::len).unwrap_or(0);
        let episodes = rows.len();
        let mut values = Vec::with_capacity(episodes * trials);
        for row in rows {
            if row.len() != trials {
                return Err(ResultsError::RaggedRow {
                    episode: values.len() / trials.max(1),
                    expected: trials,
                    found: row.len(),
                });
            }
            values.extend(row);
        }

        Ok(Self {
            episodes,
            trials,
            values,
        })
    }

    /// Reshape a long-format table. A trial ends when the episode index goes
    /// backwards; repeated rows of one episode collapse to the first sample.
    pub fn from_table(table: &ResultTable) -> Result<Self, ResultsError> {
        let mut trials: Vec<Vec<f64>> = Vec::new();
        let mut previous: Option<usize> = None;

        for row in table.rows() {
            match previous {
                Some(last) if row.episode == last => continue,
                Some(last) if row.episode > last => {
                    if let Some(current) = trials.last_mut() {
                        current.push(row.regret);
                    }
                }
                _ => trials.push(vec![row.regret]),
            }
            previous = Some(row.episode);
        }

        let expected = trials.first().map(Vec::len).unwrap_or(0);
        for (trial, samples) in trials.iter().enumerate() {
            if samples.len() != expected {
                return Err(ResultsError::ShapeMismatch {
                    trial,
                    expected,
                    found: samples.len(),
                });
            }
        }

        let trial_count = trials.len();
        let mut values = Vec::with_capacity(expected * trial_count);
        for episode in 0..expected {
            values.extend(trials.iter().map(|samples| samples[episode]));
        }

        Ok(Self {
            episodes: expected,
            trials: trial_count,
            values,
        })
    }

    pub fn load(path: &Path, layout: CsvLayout) -> Result<Self, ResultsError> {
        let mut reader = open_csv(path)?;
        let headers = read_headers(&mut reader, path)?;

        let layout = match layout {
            CsvLayout::Auto if is_long_header(&headers) => CsvLayout::Long,
            CsvLayout::Auto => CsvLayout::Wide,
            explicit => explicit,
        };

        let matrix = match layout {
            CsvLayout::Long => {
                let table = ResultTable::from_records(path, &headers, &mut reader)?;
                Self::from_table(&table)?
            }
            _ => Self::from_wide_records(path, &headers, &mut reader)?,
        };

        if matrix.is_empty() {
            return Err(ResultsError::EmptyTable {
                path: path.to_path_buf(),
            });
        }

        tracing::debug!(
            path = %path.display(),
            ?layout,
            episodes = matrix.episodes,
            trials = matrix.trials,
            "loaded series matrix"
        );
        Ok(matrix)
    }

    fn from_wide_records(
        path: &Path,
        headers: &StringRecord,
        reader: &mut csv::Reader<File>,
    ) -> Result<Self, ResultsError> {
        let trial_columns: Vec<usize> = headers
            .iter()
            .enumerate()
            .filter(|(_, name)| !is_index_column(name))
            .map(|(idx, _)| idx)
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|source| csv_error(path, source))?;
            let mut row = Vec::with_capacity(trial_columns.len());
            for &idx in &trial_columns {
                row.push(parse_float(path, &record, idx, &headers[idx])?);
            }
            rows.push(row);
        }

        Self::from_rows(rows)
    }

    pub fn episodes(&self) -> usize {
        self.episodes
    }

    pub fn trials(&self) -> usize {
        self.trials
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, episode: usize, trial: usize) -> f64 {
        self.values[episode * self.trials + trial]
    }

    /// All trial samples for one episode.
    pub fn row(&self, episode: usize) -> &[f64] {
        let start = episode * self.trials;
        &self.values[start..start + self.trials]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.values.chunks_exact(self.trials.max(1))
    }
}

fn open_csv(path: &Path) -> Result<csv::Reader<File>, ResultsError> {
    let file = File::open(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ResultsError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ResultsError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    Ok(ReaderBuilder::new().trim(Trim::All).from_reader(file))
}

fn read_headers(
    reader: &mut csv::Reader<File>,
    path: &Path,
) -> Result<StringRecord, ResultsError> {
    reader
        .headers()
        .cloned()
        .map_err(|source| csv_error(path, source))
}

fn csv_error(path: &Path, source: csv::Error) -> ResultsError {
    ResultsError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

fn column_index(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|header| header == name)
}

fn is_long_header(headers: &StringRecord) -> bool {
    column_index(headers, EPISODE_COLUMN).is_some() && column_index(headers, REGRET_COLUMN).is_some()
}

fn is_index_column(name: &str) -> bool {
    name.is_empty() || name == EPISODE_COLUMN || name.starts_with("Unnamed:")
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|pos| pos.line()).unwrap_or(0)
}

fn parse_float(
    path: &Path,
    record: &StringRecord,
    idx: usize,
    column: &str,
) -> Result<f64, ResultsError> {
    let raw = record.get(idx).unwrap_or_default();
    raw.parse::<f64>()
        .map_err(|_| ResultsError::InvalidValue {
            path: path.to_path_buf(),
            line: line_of(record),
            column: column.to_string(),
            value: raw.to_string(),
        })
}

fn parse_episode(path: &Path, record: &StringRecord, idx: usize) -> Result<usize, ResultsError> {
    let raw = record.get(idx).unwrap_or_default();
    if let Ok(episode) = raw.parse::<usize>() {
        return Ok(episode);
    }

    // pandas sometimes writes integer columns as floats ("3.0").
    match raw.parse::<f64>() {
        Ok(value) if value >= 0.0 && value.fract() == 0.0 && value < usize::MAX as f64 => {
            Ok(value as usize)
        }
        _ => Err(ResultsError::InvalidValue {
            path: path.to_path_buf(),
            line: line_of(record),
            column: EPISODE_COLUMN.to_string(),
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn write_csv(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn wide_csv_has_one_column_per_trial() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "wide.csv", "0,1,2\n1.0,2.0,3.0\n2.0,4.0,6.0\n");

        let matrix = SeriesMatrix::load(&path, CsvLayout::Auto).unwrap();

        assert_eq!(matrix.episodes(), 2);
        assert_eq!(matrix.trials(), 3);
        assert_eq!(matrix.row(1), &[2.0, 4.0, 6.0]);
    }

    #[test]
    fn wide_csv_skips_pandas_index_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "wide.csv", ",a,b\n0,1.5,2.5\n1,3.5,4.5\n");

        let matrix = SeriesMatrix::load(&path, CsvLayout::Wide).unwrap();

        assert_eq!(matrix.trials(), 2);
        assert_eq!(matrix.value(1, 0), 3.5);
    }

    #[test]
    fn long_table_reshapes_to_the_same_matrix_as_wide() {
        let dir = tempfile::tempdir().unwrap();
        let long = write_csv(
            dir.path(),
            "long.csv",
            "episode,regret\n0,1.0\n1,2.0\n2,3.0\n0,1.5\n1,2.5\n2,3.5\n",
        );
        let wide = write_csv(dir.path(), "wide.csv", "t0,t1\n1.0,1.5\n2.0,2.5\n3.0,3.5\n");

        let from_long = SeriesMatrix::load(&long, CsvLayout::Auto).unwrap();
        let from_wide = SeriesMatrix::load(&wide, CsvLayout::Auto).unwrap();

        assert_eq!(from_long, from_wide);
    }

    #[test]
    fn repeated_episode_rows_collapse_to_first_sample() {
        let table = ResultTable::new(vec![
            ResultRow { episode: 0, regret: 1.0 },
            ResultRow { episode: 0, regret: 9.0 },
            ResultRow { episode: 1, regret: 2.0 },
            ResultRow { episode: 1, regret: 9.0 },
        ]);

        let matrix = SeriesMatrix::from_table(&table).unwrap();

        assert_eq!(matrix.trials(), 1);
        assert_eq!(matrix.row(0), &[1.0]);
        assert_eq!(matrix.row(1), &[2.0]);
    }

    #[test]
    fn uneven_trials_are_a_shape_mismatch() {
        let table = ResultTable::new(vec![
            ResultRow { episode: 0, regret: 1.0 },
            ResultRow { episode: 1, regret: 2.0 },
            ResultRow { episode: 0, regret: 1.0 },
        ]);

        let err = SeriesMatrix::from_table(&table).unwrap_err();

        assert!(matches!(
            err,
            ResultsError::ShapeMismatch {
                trial: 1,
                expected: 2,
                found: 1
            }
        ));
    }

    #[test]
    fn missing_file_is_typed_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = SeriesMatrix::load(&dir.path().join("absent.csv"), CsvLayout::Auto).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn invalid_number_reports_line_and_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "bad.csv", "episode,regret\n0,1.0\n1,oops\n");

        let err = ResultTable::load(&path).unwrap_err();

        match err {
            ResultsError::InvalidValue {
                line,
                column,
                value,
                ..
            } => {
                assert_eq!(line, 3);
                assert_eq!(column, "regret");
                assert_eq!(value, "oops");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn float_formatted_episodes_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "floats.csv", "episode,regret\n0.0,1.0\n1.0,2.0\n");

        let table = ResultTable::load(&path).unwrap();

        assert_eq!(table.max_episode(), Some(1));
    }

    #[test]
    fn episodes_beyond_usize_are_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "big.csv", "episode,regret\n0,1.0\n1e30,1.0\n");

        let err = ResultTable::load(&path).unwrap_err();

        assert!(matches!(
            err,
            ResultsError::InvalidValue { ref column, ref value, .. } if column == "episode" && value == "1e30"
        ));
    }

    #[test]
    fn header_only_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "empty.csv", "episode,regret\n");

        let err = ResultTable::load(&path).unwrap_err();

        assert!(matches!(err, ResultsError::EmptyTable { .. }));
    }

    #[test]
    fn loading_twice_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "wide.csv", "a,b\n0.25,0.5\n0.75,1.0\n");

        let first = SeriesMatrix::load(&path, CsvLayout::Auto).unwrap();
        let second = SeriesMatrix::load(&path, CsvLayout::Auto).unwrap();

        assert_eq!(first, second);
    }
}
