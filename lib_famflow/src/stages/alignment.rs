use crate::{config::AlignmentConfig, error::Result, tool::ToolRunner};

use super::{Stage, StageKind, Tool, WorkItem};

/// Multiple sequence alignment of a family's fasta file.
#[derive(Debug, Clone)]
pub struct AlignmentStage {
    tool: Tool,
    max_iterations: u32,
    diags: bool,
}

impl AlignmentStage {
    pub fn new(config: &AlignmentConfig) -> Self {
        Self {
            tool: Tool::new(&config.program),
            max_iterations: config.max_iterations,
            diags: config.diags,
        }
    }
}

impl Stage for AlignmentStage {
    fn kind(&self) -> StageKind {
        StageKind::Alignment
    }

    fn prepare(&mut self, tools: &dyn ToolRunner) -> Result<()> {
        self.tool.resolve(tools)
    }

    fn run(&self, item: &WorkItem, tools: &dyn ToolRunner) -> Result<()> {
        let mut invocation = self
            .tool
            .invocation(&item.family)?
            .arg("-in")
            .arg(&item.input)
            .arg("-out")
            .arg(&item.staging)
            .arg("-maxiters")
            .arg(self.max_iterations.to_string());
        if self.diags {
            invocation = invocation.arg("-diags");
        }

        tools.run(&invocation, &item.staging)
    }
}
