use std::{fs, path::Path};

use anyhow::{Context, Result};
use csv::Writer;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Construct a deterministic RNG from a fixed seed.
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Shape of a synthetic run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyntheticRun {
    pub episodes: usize,
    pub horizon: usize,
    pub trials: usize,
    /// Per-episode regret scale; larger values learn more slowly.
    pub difficulty: f64,
}

impl Default for SyntheticRun {
    fn default() -> Self {
        Self {
            episodes: 200,
            horizon: 7,
            trials: 8,
            difficulty: 1.0,
        }
    }
}

/// Regret incurred in one episode: decays like 1/sqrt(k) with multiplicative noise.
fn episode_regret(rng: &mut StdRng, episode: usize, difficulty: f64) -> f64 {
    let noise: f64 = rng.gen_range(0.5..1.5);
    difficulty * noise / ((episode + 1) as f64).sqrt()
}

/// Long-format `episode,regret` rows: `horizon` rows per episode, the first
/// of which carries the episode's regret.
pub fn write_long_run(path: &Path, run: &SyntheticRun, rng: &mut StdRng) -> Result<()> {
    let mut writer = create_writer(path)?;
    writer.write_record(["episode", "regret"])?;

    for episode in 0..run.episodes {
        let regret = episode_regret(rng, episode, run.difficulty);
        for step in 0..run.horizon {
            let value = if step == 0 { regret } else { 0.0 };
            writer.write_record([episode.to_string(), format!("{value:.6}")])?;
        }
    }

    writer
        .flush()
        .with_context(|| format!("failed to write {}", path.display()))
}

/// Wide cumulative-regret table: one column per trial, one row per episode.
pub fn write_wide_run(path: &Path, run: &SyntheticRun, rng: &mut StdRng) -> Result<()> {
    let mut writer = create_writer(path)?;
    writer.write_record((0..run.trials).map(|trial| format!("trial_{trial}")))?;

    let mut totals = vec![0.0f64; run.trials];
    for episode in 0..run.episodes {
        for total in totals.iter_mut() {
            *total += episode_regret(rng, episode, run.difficulty);
        }
        writer.write_record(totals.iter().map(|total| format!("{total:.6}")))?;
    }

    writer
        .flush()
        .with_context(|| format!("failed to write {}", path.display()))
}

/// Write every file the regret-curves presets expect into `dir`.
pub fn write_demo_data(dir: &Path, run: &SyntheticRun, seed: u64) -> Result<Vec<String>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create directory {}", dir.display()))?;
    let mut rng = seeded_rng(seed);
    let mut written = Vec::new();

    let long = dir.join("ucbvi.csv");
    write_long_run(&long, run, &mut rng)?;
    written.push(long.display().to_string());

    for (stem, bound, difficulty) in [
        ("ucbvi", "bernstein", 1.0),
        ("ucbvi", "hoeffding", 1.6),
        ("ucbvi_chain", "bernstein", 0.8),
        ("ucbvi_chain", "hoeffding", 1.3),
    ] {
        let path = dir.join(format!("{stem}_{bound}.csv"));
        let scaled = SyntheticRun {
            difficulty: run.difficulty * difficulty,
            ..*run
        };
        write_wide_run(&path, &scaled, &mut rng)?;
        written.push(path.display().to_string());
    }

    Ok(written)
}

fn create_writer(path: &Path) -> Result<Writer<fs::File>> {
    Writer::from_path(path).with_context(|| format!("failed to create {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{CsvLayout, ResultTable, SeriesMatrix};
    use crate::summary::cumulative_regret;

    fn small_run() -> SyntheticRun {
        SyntheticRun {
            episodes: 12,
            horizon: 3,
            trials: 4,
            difficulty: 1.0,
        }
    }

    #[test]
    fn long_run_matches_cumulative_mode_expectations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ucbvi.csv");
        write_long_run(&path, &small_run(), &mut seeded_rng(7)).unwrap();

        let table = ResultTable::load(&path).unwrap();
        let regret = cumulative_regret(&table).unwrap();

        assert_eq!(regret.horizon, 3);
        assert_eq!(regret.nb_episodes, 11);
        assert!(regret.sampled.iter().all(|value| *value > 0.0));
    }

    #[test]
    fn wide_run_has_requested_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.csv");
        write_wide_run(&path, &small_run(), &mut seeded_rng(7)).unwrap();

        let matrix = SeriesMatrix::load(&path, CsvLayout::Auto).unwrap();

        assert_eq!(matrix.episodes(), 12);
        assert_eq!(matrix.trials(), 4);
    }

    #[test]
    fn same_seed_writes_identical_files() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");

        write_demo_data(&first, &small_run(), 42).unwrap();
        write_demo_data(&second, &small_run(), 42).unwrap();

        for name in ["ucbvi.csv", "ucbvi_bernstein.csv", "ucbvi_chain_hoeffding.csv"] {
            assert_eq!(
                fs::read(first.join(name)).unwrap(),
                fs::read(second.join(name)).unwrap()
            );
        }
    }
}
