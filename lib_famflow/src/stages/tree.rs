use std::{fmt::Display, str::FromStr};

use lib_famshow::{ascii_tree::draw_ascii, newick::Tree};
use log::trace;

use crate::{
    config::TreeConfig,
    error::{Error, Result},
    tool::ToolRunner,
};

use super::{Stage, StageKind, Tool, WorkItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubstitutionModel {
    Jtt,
    Wag,
    Lg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateModel {
    #[default]
    Cat,
    Gamma,
}

/// An amino acid evolution model of the form `<substitution>[+<rate>]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeModel {
    pub substitution: SubstitutionModel,
    pub rate: RateModel,
}

/// Infers a Newick tree with bootstrap support from a family's alignment.
#[derive(Debug, Clone)]
pub struct TreeInferenceStage {
    tool: Tool,
    model: TreeModel,
    bootstrap: u32,
}

/// Draws a family's Newick tree as an ASCII dendrogram.
#[derive(Debug, Clone)]
pub struct TreeRenderingStage {
    column_width: usize,
}

impl TreeModel {
    /// The tree builder flags selecting this model.
    pub fn arguments(&self) -> Vec<&'static str> {
        let mut arguments = Vec::new();
        match self.substitution {
            SubstitutionModel::Jtt => {}
            SubstitutionModel::Wag => arguments.push("-wag"),
            SubstitutionModel::Lg => arguments.push("-lg"),
        }
        if self.rate == RateModel::Gamma {
            arguments.push("-gamma");
        }
        arguments
    }
}

impl FromStr for SubstitutionModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "JTT" => Ok(Self::Jtt),
            "WAG" => Ok(Self::Wag),
            "LG" => Ok(Self::Lg),
            _ => Err(Error::Config(format!(
                "unknown substitution model {s:?}, expected one of JTT, WAG or LG"
            ))),
        }
    }
}

impl FromStr for RateModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CAT" => Ok(Self::Cat),
            "GAMMA" => Ok(Self::Gamma),
            _ => Err(Error::Config(format!(
                "unknown rate model {s:?}, expected CAT or GAMMA"
            ))),
        }
    }
}

impl FromStr for TreeModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (substitution, rate): (SubstitutionModel, RateModel) = match s.split_once('+') {
            Some((substitution, rate)) => (substitution.parse()?, rate.parse()?),
            None => (s.parse()?, RateModel::default()),
        };
        Ok(Self { substitution, rate })
    }
}

impl Display for SubstitutionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Jtt => write!(f, "JTT"),
            Self::Wag => write!(f, "WAG"),
            Self::Lg => write!(f, "LG"),
        }
    }
}

impl Display for RateModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cat => write!(f, "CAT"),
            Self::Gamma => write!(f, "GAMMA"),
        }
    }
}

impl Display for TreeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}+{}", self.substitution, self.rate)
    }
}

impl TreeInferenceStage {
    pub fn new(config: &TreeConfig) -> Result<Self> {
        Ok(Self {
            tool: Tool::new(&config.program),
            model: config.model.parse()?,
            bootstrap: config.bootstrap,
        })
    }
}

impl Stage for TreeInferenceStage {
    fn kind(&self) -> StageKind {
        StageKind::TreeInference
    }

    fn prepare(&mut self, tools: &dyn ToolRunner) -> Result<()> {
        self.tool.resolve(tools)
    }

    fn run(&self, item: &WorkItem, tools: &dyn ToolRunner) -> Result<()> {
        let mut invocation = self.tool.invocation(&item.family)?;
        for argument in self.model.arguments() {
            invocation = invocation.arg(argument);
        }
        let invocation = invocation
            .arg("-boot")
            .arg(self.bootstrap.to_string())
            .arg("-out")
            .arg(&item.staging)
            .arg(&item.input);

        tools.run(&invocation, &item.staging)
    }
}

impl TreeRenderingStage {
    pub fn new(column_width: usize) -> Self {
        Self { column_width }
    }
}

impl Stage for TreeRenderingStage {
    fn kind(&self) -> StageKind {
        StageKind::TreeRendering
    }

    fn run(&self, item: &WorkItem, _tools: &dyn ToolRunner) -> Result<()> {
        let input = std::fs::read_to_string(&item.input).map_err(Error::io(&item.input))?;
        let tree = Tree::parse(&input).map_err(|source| Error::MalformedTree {
            family: item.family.clone(),
            path: item.input.clone(),
            source,
        })?;
        trace!(
            "Family {}: drawing {} terminals",
            item.family,
            tree.terminals().len()
        );

        let drawing = draw_ascii(&tree, self.column_width);
        std::fs::write(&item.staging, drawing).map_err(Error::io(&item.staging))
    }
}
