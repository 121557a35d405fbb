// src/pipeline/stage.rs

use crate::fs::FileSystem;
use crate::pipeline::asset::Asset;

/// Read-only environment handed to every stage.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    /// Used for dependency reads (includes, imports).
    pub fs: &'a dyn FileSystem,
    /// Emit optimized variants.
    pub production: bool,
}

/// One step of a transform chain.
///
/// A stage consumes one asset and returns zero or more assets: most stages
/// map 1:1, image variants fan out. Stages must not touch the output
/// directory; writing is the task runner's job.
pub trait Stage: Send + Sync {
    /// Short identifier used in error messages.
    fn name(&self) -> &'static str;

    fn apply(&self, asset: Asset, ctx: &StageContext<'_>) -> anyhow::Result<Vec<Asset>>;
}
