use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    selection::DEFAULT_MIN_FAMILY_SIZE,
    stages::tree::TreeModel,
};


pub const DEFAULT_ARCHIVE_NAME: &str = "AMPSphere_v.2022-03.faa.gz";

/// All parameters of a pipeline run.
///
/// Every field has a default, so an empty TOML document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Root of the artifact layout, also holding the sequence archive by default.
    pub analysis_dir: PathBuf,
    /// Directory holding the logo resources.
    pub data_dir: PathBuf,
    /// Explicit path of the sequence archive.
    pub archive: Option<PathBuf>,
    pub min_family_size: usize,
    /// Number of worker threads, `0` meaning available parallelism.
    pub threads: usize,
    pub tool_timeout_secs: Option<u64>,
    /// Skip work items whose output artifact is already complete.
    pub reuse_existing: bool,
    pub alignment: AlignmentConfig,
    pub tree: TreeConfig,
    pub profile: ProfileConfig,
    pub logo: LogoConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlignmentConfig {
    pub program: String,
    pub max_iterations: u32,
    pub diags: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TreeConfig {
    pub program: String,
    /// `<substitution>[+<rate>]`, e.g. `WAG+CAT`.
    pub model: String,
    pub bootstrap: u32,
    pub ascii_width: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileConfig {
    pub program: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogoConfig {
    pub program: String,
    /// Alphabet resource, relative to the data directory.
    pub alphabet: PathBuf,
    /// Color map resource, relative to the data directory.
    pub color_map: PathBuf,
}

impl PipelineConfig {
    pub fn read_toml(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Reading configuration from {path:?}");
        let input = std::fs::read_to_string(path).map_err(Error::io(path))?;
        toml::from_str(&input)
            .map_err(|error| Error::Config(format!("unable to parse {path:?}: {error}")))
    }

    pub fn archive_path(&self) -> PathBuf {
        self.archive
            .clone()
            .unwrap_or_else(|| self.analysis_dir.join(DEFAULT_ARCHIVE_NAME))
    }

    pub fn alphabet_path(&self) -> PathBuf {
        self.data_dir.join(&self.logo.alphabet)
    }

    pub fn color_map_path(&self) -> PathBuf {
        self.data_dir.join(&self.logo.color_map)
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_secs.map(Duration::from_secs)
    }

    pub fn worker_threads(&self) -> usize {
        if self.threads > 0 {
            self.threads
        } else {
            std::thread::available_parallelism()
                .map(usize::from)
                .unwrap_or(1)
        }
    }

    /// Checks all values that cannot be expressed by their types.
    pub fn validate(&self) -> Result<()> {
        if self.min_family_size == 0 {
            return Err(Error::Config(
                "the minimum family size must be at least one".to_string(),
            ));
        }
        if self.tool_timeout_secs == Some(0) {
            return Err(Error::Config("the tool timeout must be positive".to_string()));
        }
        if self.alignment.max_iterations == 0 {
            return Err(Error::Config(
                "the aligner needs at least one iteration".to_string(),
            ));
        }
        if self.tree.ascii_width == 0 {
            return Err(Error::Config(
                "the tree drawing width must be positive".to_string(),
            ));
        }
        self.tree.model.parse::<TreeModel>()?;

        for (name, program) in [
            ("alignment", &self.alignment.program),
            ("tree", &self.tree.program),
            ("profile", &self.profile.program),
            ("logo", &self.logo.program),
        ] {
            if program.trim().is_empty() {
                return Err(Error::Config(format!("the {name} program is empty")));
            }
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            analysis_dir: "analysis".into(),
            data_dir: "data".into(),
            archive: None,
            min_family_size: DEFAULT_MIN_FAMILY_SIZE,
            threads: 0,
            tool_timeout_secs: None,
            reuse_existing: false,
            alignment: Default::default(),
            tree: Default::default(),
            profile: Default::default(),
            logo: Default::default(),
        }
    }
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            program: "muscle".to_string(),
            max_iterations: 1,
            diags: true,
        }
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            program: "FastTree".to_string(),
            model: "WAG+CAT".to_string(),
            bootstrap: 1000,
            ascii_width: lib_famshow::ascii_tree::DEFAULT_COLUMN_WIDTH,
        }
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            program: "hmmbuild".to_string(),
        }
    }
}

impl Default for LogoConfig {
    fn default() -> Self {
        Self {
            program: "hmmlogo".to_string(),
            alphabet: "alph.json".into(),
            color_map: "cmap.json".into(),
        }
    }
}
