use std::{fmt::Display, path::PathBuf};

use log::debug;

use crate::{
    config::PipelineConfig,
    error::{Error, Result},
    store::{self, ArtifactKind, ArtifactStore},
    tool::{ToolInvocation, ToolRunner},
};

pub mod alignment;
pub mod logo;
pub mod profile;
pub mod tree;

#[cfg(test)]
mod tests;

/// The steps of the pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StageKind {
    Fasta,
    Alignment,
    TreeInference,
    TreeRendering,
    ProfileBuilding,
    LogoRendering,
}

/// The inputs and outputs of one stage for one family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub family: String,
    pub stage: StageKind,
    pub input: PathBuf,
    pub output: PathBuf,
    /// Writers write here, the pipeline renames it to `output` on success.
    pub staging: PathBuf,
}

/// A per-family pipeline step.
pub trait Stage: Sync {
    fn kind(&self) -> StageKind;

    /// Resolves tools and loads shared resources.
    ///
    /// Called once per run before any family is processed.
    fn prepare(&mut self, _tools: &dyn ToolRunner) -> Result<()> {
        Ok(())
    }

    /// Produces `item.staging` from `item.input`.
    fn run(&self, item: &WorkItem, tools: &dyn ToolRunner) -> Result<()>;
}

/// A configured external program and its resolved path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tool {
    name: String,
    path: Option<PathBuf>,
}

impl StageKind {
    pub const ALL: [Self; 6] = [
        Self::Fasta,
        Self::Alignment,
        Self::TreeInference,
        Self::TreeRendering,
        Self::ProfileBuilding,
        Self::LogoRendering,
    ];

    pub fn output(&self) -> ArtifactKind {
        match self {
            Self::Fasta => ArtifactKind::Fasta,
            Self::Alignment => ArtifactKind::Alignment,
            Self::TreeInference => ArtifactKind::TreeNewick,
            Self::TreeRendering => ArtifactKind::TreeAscii,
            Self::ProfileBuilding => ArtifactKind::HmmProfile,
            Self::LogoRendering => ArtifactKind::HmmLogo,
        }
    }

    /// The artifact a stage reads, `None` for the fasta stage which reads the catalog.
    pub fn input(&self) -> Option<ArtifactKind> {
        match self {
            Self::Fasta => None,
            Self::Alignment => Some(ArtifactKind::Fasta),
            Self::TreeInference => Some(ArtifactKind::Alignment),
            Self::TreeRendering => Some(ArtifactKind::TreeNewick),
            Self::ProfileBuilding => Some(ArtifactKind::Alignment),
            Self::LogoRendering => Some(ArtifactKind::HmmProfile),
        }
    }

    pub fn progress_message(&self) -> &'static str {
        match self {
            Self::Fasta => "Writing family fasta files",
            Self::Alignment => "Aligning families",
            Self::TreeInference => "Inferring family trees",
            Self::TreeRendering => "Drawing family trees",
            Self::ProfileBuilding => "Building family profiles",
            Self::LogoRendering => "Drawing profile logos",
        }
    }
}

impl Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Fasta => "fasta",
                Self::Alignment => "alignment",
                Self::TreeInference => "tree-inference",
                Self::TreeRendering => "tree-rendering",
                Self::ProfileBuilding => "profile-building",
                Self::LogoRendering => "logo-rendering",
            }
        )
    }
}

impl WorkItem {
    /// Creates the work item, failing with [`Error::InputMissing`] if an earlier artifact of the family is absent.
    ///
    /// Besides the input, the artifact directly preceding the output must be complete as well.
    pub fn prepare(store: &ArtifactStore, family: &str, stage: StageKind) -> Result<Self> {
        let Some(input_kind) = stage.input() else {
            return Err(Error::Config(format!(
                "the {stage} stage has no per-family input"
            )));
        };

        let output_kind = stage.output();
        let input = store.require(family, input_kind)?;
        if let Some(predecessor) = output_kind.predecessor() {
            if predecessor != input_kind {
                store.require(family, predecessor)?;
            }
        }

        Ok(Self {
            family: family.to_string(),
            stage,
            input,
            output: store.path(family, output_kind),
            staging: store.staging_path(family, output_kind),
        })
    }

    pub fn commit(&self) -> Result<()> {
        store::commit(&self.staging, &self.output)
    }

    pub fn discard(&self) {
        store::discard(&self.staging);
    }
}

impl Tool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resolve(&mut self, tools: &dyn ToolRunner) -> Result<()> {
        self.path = Some(tools.locate(&self.name)?);
        Ok(())
    }

    /// Starts an invocation of the resolved program.
    pub fn invocation(&self, family: &str) -> Result<ToolInvocation> {
        let path = self.path.as_ref().ok_or_else(|| Error::ToolNotFound {
            tool: self.name.clone(),
        })?;
        Ok(ToolInvocation::new(family, &self.name, path))
    }
}

/// Creates the stage of the given kind, `None` for the fasta stage which the pipeline runs itself.
pub fn build_stage(kind: StageKind, config: &PipelineConfig) -> Result<Option<Box<dyn Stage>>> {
    debug!("Configuring the {kind} stage");
    let stage: Box<dyn Stage> = match kind {
        StageKind::Fasta => return Ok(None),
        StageKind::Alignment => Box::new(alignment::AlignmentStage::new(&config.alignment)),
        StageKind::TreeInference => Box::new(tree::TreeInferenceStage::new(&config.tree)?),
        StageKind::TreeRendering => Box::new(tree::TreeRenderingStage::new(config.tree.ascii_width)),
        StageKind::ProfileBuilding => {
            Box::new(profile::ProfileBuildingStage::new(&config.profile))
        }
        StageKind::LogoRendering => Box::new(logo::LogoRenderingStage::new(
            &config.logo,
            config.alphabet_path(),
            config.color_map_path(),
        )),
    };
    Ok(Some(stage))
}
