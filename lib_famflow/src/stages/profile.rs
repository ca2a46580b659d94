use crate::{config::ProfileConfig, error::Result, tool::ToolRunner};

use super::{Stage, StageKind, Tool, WorkItem};

/// Builds a profile HMM named after the family from its alignment.
#[derive(Debug, Clone)]
pub struct ProfileBuildingStage {
    tool: Tool,
}

impl ProfileBuildingStage {
    pub fn new(config: &ProfileConfig) -> Self {
        Self {
            tool: Tool::new(&config.program),
        }
    }
}

impl Stage for ProfileBuildingStage {
    fn kind(&self) -> StageKind {
        StageKind::ProfileBuilding
    }

    fn prepare(&mut self, tools: &dyn ToolRunner) -> Result<()> {
        self.tool.resolve(tools)
    }

    fn run(&self, item: &WorkItem, tools: &dyn ToolRunner) -> Result<()> {
        let invocation = self
            .tool
            .invocation(&item.family)?
            .arg("--amino")
            .arg("-n")
            .arg(&item.family)
            .arg(&item.staging)
            .arg(&item.input);

        tools.run(&invocation, &item.staging)
    }
}
