// src/pipeline/runner.rs

use std::fmt;

use tracing::trace;

use crate::errors::TransformError;
use crate::pipeline::asset::Asset;
use crate::pipeline::stage::{Stage, StageContext};

/// Ordered list of stages applied to every source of a task.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.stage_names()).finish()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage in order over `asset`.
    ///
    /// The first failing stage aborts this file only; the error names the
    /// stage and the source it was working on.
    pub fn run(&self, asset: Asset, ctx: &StageContext<'_>) -> Result<Vec<Asset>, TransformError> {
        let mut current = vec![asset];

        for stage in &self.stages {
            let mut next = Vec::with_capacity(current.len());
            for item in current {
                let file = item.source.clone();
                trace!(stage = stage.name(), ?file, "applying stage");
                let produced = stage.apply(item, ctx).map_err(|cause| TransformError {
                    stage: stage.name(),
                    file,
                    cause,
                })?;
                next.extend(produced);
            }
            current = next;
        }

        Ok(current)
    }
}
