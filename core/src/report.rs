use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};

pub const REGRET_REPORT_TEMPLATE: &str = r"# Regret Notebook

<!-- SECTION:overview start -->
<!-- Describe which algorithms and environments this notebook compares. -->
<!-- SECTION:overview end -->

## Configuration

<!-- SECTION:configuration start -->
<!-- Populated automatically with the chart settings of the latest run. -->
<!-- SECTION:configuration end -->

## Series

<!-- SECTION:series start -->
<!-- Populated automatically with one row per plotted configuration. -->
<!-- SECTION:series end -->

<!-- SECTION:missing start -->
<!-- Configurations whose result files were absent are listed here. -->
<!-- SECTION:missing end -->

## Chart

<!-- SECTION:chart start -->
<!-- The rendered regret chart is embedded here. -->
<!-- SECTION:chart end -->

> Text outside the `<!-- SECTION:name start/end -->` markers is never touched, so notes written
> around them survive re-runs.
";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportSection {
    id: String,
    content: String,
}

impl ReportSection {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }

    fn markers(&self) -> (String, String) {
        (
            format!("<!-- SECTION:{} start -->", self.id),
            format!("<!-- SECTION:{} end -->", self.id),
        )
    }

    /// Replace the region between this section's markers in `document`.
    fn apply(&self, document: &str) -> Result<String> {
        let (start_marker, end_marker) = self.markers();

        let start = document
            .find(&start_marker)
            .ok_or_else(|| anyhow!("missing start marker: {}", start_marker))?;
        let body_start = start + start_marker.len();
        let end = document[body_start..]
            .find(&end_marker)
            .map(|offset| body_start + offset)
            .ok_or_else(|| anyhow!("missing end marker: {}", end_marker))?;

        let body = self.content.trim_matches('\n');
        let mut updated = String::with_capacity(document.len() + body.len());
        updated.push_str(&document[..body_start]);
        updated.push('\n');
        if !body.is_empty() {
            updated.push_str(body);
            updated.push('\n');
        }
        updated.push_str(&document[end..]);
        Ok(updated)
    }
}

/// A markdown notebook whose marked sections are rewritten on every run.
#[derive(Clone, Debug)]
pub struct Notebook {
    path: PathBuf,
}

impl Notebook {
    pub fn open_or_create(path: &Path, template: &str) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }

        if !path.exists() {
            fs::write(path, template)
                .with_context(|| format!("failed to write report template to {}", path.display()))?;
        }

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All sections are applied before anything is written, so a missing
    /// marker leaves the file untouched.
    pub fn update(&self, sections: &[ReportSection]) -> Result<()> {
        let original = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read report at {}", self.path.display()))?;

        let updated = sections
            .iter()
            .try_fold(original, |document, section| section.apply(&document))?;

        fs::write(&self.path, updated)
            .with_context(|| format!("failed to write updated report to {}", self.path.display()))
    }
}
