// src/exec/clean.rs

use tracing::{debug, info};

use crate::errors::Result;
use crate::exec::context::BuildContext;

/// Remove the output root, once per process.
///
/// Returns `Ok(false)` when the clean already ran (or was skipped up front).
/// A failed removal releases the claim so the next build retries it.
pub fn clean_output(ctx: &BuildContext) -> Result<bool> {
    if !ctx.claim_clean() {
        debug!("output already cleaned in this process; skipping");
        return Ok(false);
    }

    let out = ctx.output_root();
    if !ctx.fs().is_dir(out) {
        debug!(output = ?out, "output directory absent; nothing to clean");
        return Ok(true);
    }

    if let Err(err) = ctx.fs().remove_dir_all(out) {
        ctx.release_clean();
        return Err(err.context(format!("removing output directory {}", out.display())).into());
    }

    info!(output = ?out, "cleaned output directory");
    Ok(true)
}
