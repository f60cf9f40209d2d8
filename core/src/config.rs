use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::results::CsvLayout;

/// One labeled configuration and the CSV holding its results.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesSpec {
    pub label: String,
    pub path: PathBuf,
    #[serde(default)]
    pub layout: CsvLayout,
}

impl SeriesSpec {
    pub fn new(label: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
            layout: CsvLayout::Auto,
        }
    }

    /// Parse a `label=path` pair as given on the command line.
    pub fn parse_pair(value: &str) -> Result<Self> {
        let (label, path) = value
            .split_once('=')
            .ok_or_else(|| anyhow!("expected LABEL=PATH, got {:?}", value))?;
        if label.trim().is_empty() || path.trim().is_empty() {
            return Err(anyhow!("expected LABEL=PATH, got {:?}", value));
        }
        Ok(Self::new(label.trim(), path.trim()))
    }
}

/// Named sets of configurations matching the experiment scripts' data files.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Preset {
    Ucbvi,
    Chain,
}

impl Preset {
    pub fn from_str(value: &str) -> Result<Self> {
        match value {
            "ucbvi" => Ok(Self::Ucbvi),
            "chain" => Ok(Self::Chain),
            other => Err(anyhow!("invalid preset: {}", other)),
        }
    }

    fn file_stem(&self) -> &'static str {
        match self {
            Self::Ucbvi => "ucbvi",
            Self::Chain => "ucbvi_chain",
        }
    }

    pub fn series(&self, data_dir: &Path) -> Vec<SeriesSpec> {
        ["bernstein", "hoeffding"]
            .iter()
            .map(|bound| {
                SeriesSpec::new(
                    *bound,
                    data_dir.join(format!("{}_{}.csv", self.file_stem(), bound)),
                )
            })
            .collect()
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Ucbvi => "UCBVI: Bernstein vs Hoeffding bonuses",
            Self::Chain => "UCBVI on Chain: Bernstein vs Hoeffding bonuses",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlotConfig {
    pub title: String,
    /// Band half-width in standard errors.
    pub band_width: f64,
    pub width: u32,
    pub height: u32,
    pub output: PathBuf,
    #[serde(default)]
    pub report: Option<PathBuf>,
    pub series: Vec<SeriesSpec>,
}

impl PlotConfig {
    pub fn from_preset(preset: Preset, data_dir: &Path) -> Self {
        Self {
            title: preset.title().to_string(),
            band_width: 2.0,
            width: 1024,
            height: 640,
            output: PathBuf::from(format!("plots/{}.svg", preset.file_stem())),
            report: None,
            series: preset.series(data_dir),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.band_width.is_finite() && self.band_width >= 0.0) {
            return Err(anyhow!("band_width must be a non-negative number"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(anyhow!("chart size must be non-zero"));
        }
        Ok(())
    }
}

/// Read a JSON config, or write the initializer's value when the file is missing.
pub fn load_or_init<T, F>(path: &Path, initializer: F) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> T,
{
    if !path.exists() {
        let value = initializer();
        write_json(path, &value)?;
        tracing::info!(path = %path.display(), "wrote default config");
        return Ok(value);
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config from {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse config from {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let serialized = serde_json::to_string_pretty(value)?;
    fs::write(path, serialized)
        .with_context(|| format!("failed to write config to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_point_at_the_experiment_data_files() {
        let ucbvi = Preset::Ucbvi.series(Path::new("data"));
        let chain = Preset::Chain.series(Path::new("data"));

        assert_eq!(ucbvi[0].path, PathBuf::from("data/ucbvi_bernstein.csv"));
        assert_eq!(ucbvi[1].path, PathBuf::from("data/ucbvi_hoeffding.csv"));
        assert_eq!(chain[0].path, PathBuf::from("data/ucbvi_chain_bernstein.csv"));
        assert_eq!(chain[1].label, "hoeffding");
    }

    #[test]
    fn pair_parsing_requires_both_halves() {
        let spec = SeriesSpec::parse_pair("bernstein=data/b.csv").unwrap();
        assert_eq!(spec.label, "bernstein");
        assert_eq!(spec.path, PathBuf::from("data/b.csv"));

        assert!(SeriesSpec::parse_pair("bernstein").is_err());
        assert!(SeriesSpec::parse_pair("=data/b.csv").is_err());
    }

    #[test]
    fn missing_config_is_initialized_then_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/plot.json");

        let written: PlotConfig =
            load_or_init(&path, || PlotConfig::from_preset(Preset::Chain, Path::new("data")))
                .unwrap();
        let reloaded: PlotConfig =
            load_or_init(&path, || PlotConfig::from_preset(Preset::Ucbvi, Path::new("data")))
                .unwrap();

        assert_eq!(written, reloaded);
    }

    #[test]
    fn series_layout_defaults_to_auto() {
        let spec: SeriesSpec =
            serde_json::from_str(r#"{"label": "a", "path": "a.csv"}"#).unwrap();
        assert_eq!(spec.layout, CsvLayout::Auto);
    }

    #[test]
    fn negative_band_width_is_rejected() {
        let mut config = PlotConfig::from_preset(Preset::Ucbvi, Path::new("data"));
        config.band_width = -1.0;
        assert!(config.validate().is_err());
    }
}
