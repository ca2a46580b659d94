use std::{
    collections::HashMap,
    io::Read,
    path::{Path, PathBuf},
};

use lib_famshow::logo::{LogoStyle, ResidueHeights, render_logo_svg};
use log::{debug, info};
use serde::Deserialize;

use crate::{
    compression::open_decompressed,
    config::LogoConfig,
    error::{Error, Result},
    tool::ToolRunner,
};

use super::{Stage, StageKind, Tool, WorkItem};

/// Renders the residue heights of a family's profile as an SVG logo.
#[derive(Debug, Clone)]
pub struct LogoRenderingStage {
    tool: Tool,
    alphabet_path: PathBuf,
    color_map_path: PathBuf,
    style: Option<LogoStyle>,
}

/// Alphabet resource, either a list of symbols or a string of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AlphabetResource {
    Symbols(Vec<String>),
    Text(String),
}

impl LogoRenderingStage {
    pub fn new(
        config: &LogoConfig,
        alphabet_path: impl Into<PathBuf>,
        color_map_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tool: Tool::new(&config.program),
            alphabet_path: alphabet_path.into(),
            color_map_path: color_map_path.into(),
            style: None,
        }
    }
}

impl Stage for LogoRenderingStage {
    fn kind(&self) -> StageKind {
        StageKind::LogoRendering
    }

    fn prepare(&mut self, tools: &dyn ToolRunner) -> Result<()> {
        self.tool.resolve(tools)?;
        self.style = Some(load_logo_style(&self.alphabet_path, &self.color_map_path)?);
        Ok(())
    }

    fn run(&self, item: &WorkItem, tools: &dyn ToolRunner) -> Result<()> {
        let style = self.style.as_ref().ok_or_else(|| Error::ResourceLoadFailed {
            path: self.alphabet_path.clone(),
            reason: "the logo resources were not loaded".to_string(),
        })?;

        let invocation = self
            .tool
            .invocation(&item.family)?
            .arg("--no_indel")
            .arg(&item.input);
        let output = tools.capture(&invocation)?;

        let heights = ResidueHeights::parse(&output, style.symbols().len()).map_err(|error| {
            Error::Parse {
                path: item.input.clone(),
                line: match &error {
                    lib_famshow::error::Error::MalformedHeights { line, .. } => *line,
                    _ => 0,
                },
                reason: format!("{} printed malformed residue heights: {error}", invocation.tool),
            }
        })?;
        debug!(
            "Family {}: rendering a logo of {} positions",
            item.family,
            heights.len()
        );

        let svg = render_logo_svg(&heights, style);
        std::fs::write(&item.staging, svg).map_err(Error::io(&item.staging))
    }
}

/// Loads the alphabet and color map resources, each plain, gzip or xz compressed JSON.
pub fn load_logo_style(alphabet_path: &Path, color_map_path: &Path) -> Result<LogoStyle> {
    let alphabet: AlphabetResource = read_json_resource(alphabet_path)?;
    let symbols = match alphabet {
        AlphabetResource::Symbols(symbols) => symbols
            .iter()
            .map(|symbol| single_char(symbol, alphabet_path))
            .collect::<Result<Vec<_>>>()?,
        AlphabetResource::Text(text) => text.chars().filter(|c| !c.is_whitespace()).collect(),
    };

    let colors: HashMap<String, String> = read_json_resource(color_map_path)?;
    let colors = colors
        .into_iter()
        .map(|(symbol, color)| Ok((single_char(&symbol, color_map_path)?, color)))
        .collect::<Result<HashMap<_, _>>>()?;

    let style = LogoStyle::new(symbols, colors).map_err(|error| Error::ResourceLoadFailed {
        path: alphabet_path.to_path_buf(),
        reason: error.to_string(),
    })?;
    info!(
        "Loaded a logo alphabet of {} residues from {alphabet_path:?}",
        style.symbols().len()
    );
    Ok(style)
}

fn read_json_resource<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let load_failed = |reason: String| Error::ResourceLoadFailed {
        path: path.to_path_buf(),
        reason,
    };

    let mut input = String::new();
    open_decompressed(path)
        .map_err(|error| load_failed(error.to_string()))?
        .read_to_string(&mut input)
        .map_err(|error| load_failed(error.to_string()))?;
    serde_json::from_str(&input).map_err(|error| load_failed(error.to_string()))
}

fn single_char(symbol: &str, path: &Path) -> Result<char> {
    let mut chars = symbol.chars();
    match (chars.next(), chars.next()) {
        (Some(symbol), None) => Ok(symbol),
        _ => Err(Error::ResourceLoadFailed {
            path: path.to_path_buf(),
            reason: format!("{symbol:?} is not a single residue symbol"),
        }),
    }
}
