use std::collections::BTreeMap;

use lib_famshow::newick::RECURSION_STACK_SIZE;
use log::{debug, info, warn};
use rayon::{ThreadPoolBuilder, prelude::*};

use crate::{
    catalog::SequenceCatalog,
    config::PipelineConfig,
    error::{Error, Result},
    selection::{SelectedFamilySet, select_families},
    stages::{Stage, StageKind, WorkItem, build_stage},
    store::ArtifactStore,
    tool::ToolRunner,
};


/// Runs the stages of a configured range over all selected families.
pub struct Pipeline<'tools> {
    config: PipelineConfig,
    store: ArtifactStore,
    tools: &'tools dyn ToolRunner,
    first_stage: StageKind,
    last_stage: StageKind,
}

/// What a run did.
#[derive(Debug, Default)]
pub struct RunReport {
    pub selected: SelectedFamilySet,
    pub stages: Vec<StageSummary>,
    /// The first failure of each failed family.
    pub failures: BTreeMap<String, FamilyFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSummary {
    pub stage: StageKind,
    pub completed: usize,
    /// Work items skipped because their artifact was already complete.
    pub reused: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub struct FamilyFailure {
    pub stage: StageKind,
    pub error: Error,
}

enum Outcome {
    Completed,
    Reused,
}

impl<'tools> Pipeline<'tools> {
    pub fn new(config: PipelineConfig, tools: &'tools dyn ToolRunner) -> Self {
        Self {
            store: ArtifactStore::new(&config.analysis_dir),
            config,
            tools,
            first_stage: StageKind::Fasta,
            last_stage: StageKind::LogoRendering,
        }
    }

    /// Restricts the run to the stages from `first` to `last`, both inclusive.
    pub fn with_stage_range(mut self, first: StageKind, last: StageKind) -> Self {
        self.first_stage = first;
        self.last_stage = last;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    fn stage_range(&self) -> impl Iterator<Item = StageKind> + '_ {
        StageKind::ALL
            .into_iter()
            .filter(|stage| (self.first_stage..=self.last_stage).contains(stage))
    }

    /// Runs the pipeline.
    ///
    /// Fatal errors are returned, failures of single families are collected in the report.
    pub fn run(&self) -> Result<RunReport> {
        self.config.validate()?;
        if self.first_stage > self.last_stage {
            return Err(Error::Config(format!(
                "the first stage {} comes after the last stage {}",
                self.first_stage, self.last_stage
            )));
        }

        info!("Preparing stages {} to {}", self.first_stage, self.last_stage);
        let mut stages = Vec::new();
        for kind in self.stage_range() {
            if let Some(mut stage) = build_stage(kind, &self.config)? {
                stage.prepare(self.tools)?;
                stages.push(stage);
            }
        }

        self.store.ensure_layout()?;
        let catalog = SequenceCatalog::load(self.config.archive_path())?;
        let selected = select_families(catalog.families(), self.config.min_family_size);
        let mut report = RunReport {
            selected,
            ..Default::default()
        };

        if self.stage_range().any(|stage| stage == StageKind::Fasta) {
            info!("{}", StageKind::Fasta.progress_message());
            let mut summary = StageSummary {
                stage: StageKind::Fasta,
                completed: 0,
                reused: 0,
                failed: 0,
            };
            for (family, outcome) in self.store.write_fasta_files(&catalog, &report.selected) {
                match outcome {
                    Ok(_) => summary.completed += 1,
                    Err(error) => {
                        warn!("{error}");
                        summary.failed += 1;
                        report.failures.insert(
                            family,
                            FamilyFailure {
                                stage: StageKind::Fasta,
                                error,
                            },
                        );
                    }
                }
            }
            report.stages.push(summary);
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.config.worker_threads())
            .stack_size(RECURSION_STACK_SIZE)
            .build()?;
        debug!("Using {} worker threads", pool.current_num_threads());

        for stage in &stages {
            let active: Vec<_> = report
                .selected
                .iter()
                .filter(|family| !report.failures.contains_key(*family))
                .collect();
            info!(
                "{} ({} families)",
                stage.kind().progress_message(),
                active.len()
            );

            let outcomes: Vec<_> = pool.install(|| {
                active
                    .par_iter()
                    .map(|family| (family.to_string(), self.run_item(stage.as_ref(), family)))
                    .collect()
            });

            let mut summary = StageSummary {
                stage: stage.kind(),
                completed: 0,
                reused: 0,
                failed: 0,
            };
            for (family, outcome) in outcomes {
                match outcome {
                    Ok(Outcome::Completed) => summary.completed += 1,
                    Ok(Outcome::Reused) => summary.reused += 1,
                    Err(error) if error.is_fatal() => return Err(error),
                    Err(error) => {
                        warn!("{error}");
                        summary.failed += 1;
                        report.failures.insert(
                            family,
                            FamilyFailure {
                                stage: stage.kind(),
                                error,
                            },
                        );
                    }
                }
            }

            info!(
                "Finished the {} stage: {} completed, {} reused, {} failed",
                summary.stage, summary.completed, summary.reused, summary.failed
            );
            report.stages.push(summary);
        }

        Ok(report)
    }

    fn run_item(&self, stage: &dyn Stage, family: &str) -> Result<Outcome> {
        let item = WorkItem::prepare(&self.store, family, stage.kind())?;

        if self.config.reuse_existing && self.store.is_complete(family, stage.kind().output()) {
            warn!(
                "Family {family}: reusing the existing {} artifact {:?}",
                stage.kind().output(),
                item.output
            );
            return Ok(Outcome::Reused);
        }

        debug!("Family {family}: running the {} stage", stage.kind());
        match stage.run(&item, self.tools) {
            Ok(()) => {
                item.commit()?;
                Ok(Outcome::Completed)
            }
            Err(error) => {
                item.discard();
                Err(error)
            }
        }
    }
}

impl RunReport {
    /// True if no family failed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn summary(&self, stage: StageKind) -> Option<&StageSummary> {
        self.stages.iter().find(|summary| summary.stage == stage)
    }

    /// Families that passed all stages of the run.
    pub fn completed_families(&self) -> impl Iterator<Item = &str> {
        self.selected
            .iter()
            .filter(|family| !self.failures.contains_key(*family))
    }
}
