// src/exec/build.rs

//! One pass of a configured task: resolve, filter, transform, write, record,
//! notify.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::model::TaskConfig;
use crate::errors::{FileError, Result, SitepipeError};
use crate::exec::context::BuildContext;
use crate::fileset::{FileSet, FileSetSpec, SourceFile};
use crate::freshness::{glob_signature, hash_bytes, BuildRecord, ChangeDetector, GlobRecord, RecordEntry};
use crate::pipeline::{concat_assets, pipeline_for, primary_output, Asset, Pipeline, StageContext};
use crate::reload::{ReloadKind, ReloadNotice};

/// What happened during one task pass.
#[derive(Debug, Default)]
pub struct TaskReport {
    pub task: String,
    /// Sources that went through the pipeline.
    pub processed: usize,
    /// Sources judged up to date.
    pub skipped: usize,
    /// Sources that failed to read, transform or write.
    pub failed: usize,
    /// Record entries dropped because their source disappeared.
    pub removed: usize,
    /// Absolute paths of every output written.
    pub written: Vec<PathBuf>,
    pub errors: Vec<FileError>,
}

impl TaskReport {
    fn new(task: &str) -> Self {
        Self {
            task: task.to_string(),
            ..Self::default()
        }
    }

    /// A task fails only when it attempted files and every one of them failed.
    pub fn is_failure(&self) -> bool {
        self.processed > 0 && self.failed == self.processed
    }
}

/// Dry-run view of a task: what a build would do right now.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TaskPlan {
    pub task: String,
    pub dest: PathBuf,
    pub to_build: Vec<PathBuf>,
    pub up_to_date: Vec<PathBuf>,
}

/// Resolved sources of a task, split into those to rebuild and the rest.
struct Selection {
    set: FileSet,
    dest_root: PathBuf,
    record: BuildRecord,
    removed: usize,
    stale: Vec<SourceFile>,
}

fn task_config<'a>(ctx: &'a BuildContext, name: &str) -> Result<&'a TaskConfig> {
    ctx.task(name)
        .ok_or_else(|| SitepipeError::TaskNotFound(name.to_string()))
}

fn select(ctx: &BuildContext, name: &str, task: &TaskConfig) -> Result<Selection> {
    let fs = ctx.fs();
    let spec = FileSetSpec::from_task(ctx.source_root(), task)?;
    let set = spec.resolve(fs)?;
    let dest_root = ctx.output_root().join(&task.dest);

    let mut record = ctx.load_record(name);
    let live: HashSet<&Path> = set.files.iter().map(|f| f.path.as_path()).collect();
    let removed = record.retain(|source| live.contains(source));
    if removed > 0 {
        debug!(task = %name, removed, "dropped records of deleted sources");
    }

    let partials: Vec<PathBuf> = set.partials.iter().map(|p| p.path.clone()).collect();
    let detector = ChangeDetector::new(fs, &record, ctx.hashes(), &partials);
    let bundled = task.bundle.is_some();
    let mut stale: Vec<SourceFile> = set
        .files
        .iter()
        .filter(|file| {
            // A bundle part without a record was left out of the last bundle
            // (it failed); the bundle itself exists, so mtimes say nothing.
            (bundled && record.get(&file.path).is_none())
                || detector.should_process(&file.path, &dest_root.join(primary_output(task, &file.rel)))
        })
        .cloned()
        .collect();

    // A bundle is rebuilt from every part as soon as one part changed.
    if bundled && (!stale.is_empty() || removed > 0) {
        stale = set.files.clone();
    }

    Ok(Selection {
        set,
        dest_root,
        record,
        removed,
        stale,
    })
}

/// Work out what `build_task` would rebuild, without touching anything.
pub fn plan_task(ctx: &BuildContext, name: &str) -> Result<TaskPlan> {
    let task = task_config(ctx, name)?;
    let selection = select(ctx, name, task)?;
    let stale: HashSet<&Path> = selection.stale.iter().map(|f| f.path.as_path()).collect();

    let (to_build, up_to_date): (Vec<PathBuf>, Vec<PathBuf>) = selection
        .set
        .files
        .iter()
        .map(|f| f.path.clone())
        .partition(|path| stale.contains(path.as_path()));

    Ok(TaskPlan {
        task: name.to_string(),
        dest: selection.dest_root,
        to_build,
        up_to_date,
    })
}

/// Run one task pass over its stale sources.
///
/// File-level failures are collected in the report and never abort the pass.
/// `Err` is reserved for failures of the task as a whole (unknown task,
/// unresolvable sources, broken stage chain).
pub fn build_task(ctx: &BuildContext, name: &str) -> Result<TaskReport> {
    let task = task_config(ctx, name)?;
    let Selection {
        set,
        dest_root,
        mut record,
        removed,
        stale,
    } = select(ctx, name, task)?;

    let mut report = TaskReport::new(name);
    report.removed = removed;
    report.skipped = set.files.len() - stale.len();

    if stale.is_empty() {
        if removed > 0 {
            ctx.save_record(name, &record);
        }
        debug!(task = %name, files = set.files.len(), "everything up to date");
        return Ok(report);
    }

    let pipeline = pipeline_for(task)?;
    let builder = FileBuilder {
        ctx,
        pipeline: &pipeline,
        dest_root: &dest_root,
        write: task.bundle.is_none(),
    };

    let mut built: Vec<(PathBuf, Built)> = Vec::with_capacity(stale.len());
    for file in &stale {
        report.processed += 1;
        match builder.build(file) {
            Ok(done) => built.push((file.path.clone(), done)),
            Err(err) => {
                warn!(task = %name, file = ?err.path(), error = %err, "file failed; skipping");
                report.failed += 1;
                report.errors.push(err);
            }
        }
    }

    match &task.bundle {
        None => {
            for (source, done) in built {
                report.written.extend(done.entry.outputs.iter().cloned());
                record.insert(source, done.entry);
            }
        }
        Some(bundle_name) => {
            write_bundle(ctx, bundle_name, &dest_root, built, &mut record, &mut report);
        }
    }

    ctx.save_record(name, &record);

    info!(
        task = %name,
        processed = report.processed,
        skipped = report.skipped,
        written = report.written.len(),
        failed = report.failed,
        "task pass finished"
    );

    for notice in notices_for(task.kind.reload_kind(), ctx.output_root(), &report.written) {
        ctx.broadcaster().publish(notice);
    }

    Ok(report)
}

struct Built {
    entry: RecordEntry,
    assets: Vec<Asset>,
}

struct FileBuilder<'a> {
    ctx: &'a BuildContext,
    pipeline: &'a Pipeline,
    dest_root: &'a Path,
    /// Bundle parts are held back and written together.
    write: bool,
}

impl FileBuilder<'_> {
    fn build(&self, file: &SourceFile) -> std::result::Result<Built, FileError> {
        let fs = self.ctx.fs();
        let content = fs.read(&file.path).map_err(|cause| FileError::Read {
            path: file.path.clone(),
            cause,
        })?;
        let hash = hash_bytes(&content);

        let stage_ctx = StageContext {
            fs,
            production: self.ctx.production(),
        };
        let assets = self
            .pipeline
            .run(Asset::new(&file.path, &file.rel, content), &stage_ctx)?;

        let mut outputs = Vec::new();
        if self.write {
            for asset in &assets {
                let out = self.dest_root.join(&asset.rel_path);
                fs.write(&out, &asset.content).map_err(|cause| FileError::Write {
                    path: out.clone(),
                    cause,
                })?;
                outputs.push(out);
            }
        }

        let dependencies = assets
            .iter()
            .flat_map(|a| a.dependencies.iter())
            .filter(|dep| **dep != file.path)
            .map(|dep| (dep.clone(), self.dependency_hash(dep)))
            .collect::<BTreeMap<_, _>>();

        let globs = assets
            .iter()
            .flat_map(|a| a.globs.iter())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|glob| GlobRecord {
                dir: glob.dir.clone(),
                pattern: glob.pattern.clone(),
                // An unreadable glob records an empty signature, so the next
                // pass sees it as changed.
                signature: glob_signature(fs, &glob.dir, &glob.pattern, &file.path)
                    .unwrap_or_default(),
            })
            .collect();

        Ok(Built {
            entry: RecordEntry {
                hash,
                dependencies,
                outputs,
                globs,
            },
            assets,
        })
    }

    /// An unreadable dependency records an empty hash, so the next pass sees
    /// it as changed.
    fn dependency_hash(&self, dep: &Path) -> String {
        self.ctx
            .hashes()
            .get_or_compute(self.ctx.fs(), dep)
            .unwrap_or_default()
    }
}

fn write_bundle(
    ctx: &BuildContext,
    bundle_name: &str,
    dest_root: &Path,
    built: Vec<(PathBuf, Built)>,
    record: &mut BuildRecord,
    report: &mut TaskReport,
) {
    if built.is_empty() {
        return;
    }

    let parts: Vec<Asset> = built.iter().flat_map(|(_, b)| b.assets.iter().cloned()).collect();
    let bundle = concat_assets(bundle_name, dest_root.to_path_buf(), parts);
    let out = dest_root.join(&bundle.rel_path);

    if let Err(cause) = ctx.fs().write(&out, &bundle.content) {
        let err = FileError::Write { path: out, cause };
        warn!(task = %report.task, error = %err, "bundle write failed");
        report.failed = report.processed;
        report.errors.push(err);
        return;
    }

    for (source, mut done) in built {
        done.entry.outputs = vec![out.clone()];
        record.insert(source, done.entry);
    }
    report.written.push(out);
}

/// Notices owed to live-reload clients after a write phase.
///
/// Full-reload tasks produce one notice per pass; stylesheet and asset tasks
/// one per written output. Nothing written, nothing sent.
pub fn notices_for(kind: ReloadKind, output_root: &Path, written: &[PathBuf]) -> Vec<ReloadNotice> {
    match (kind, written) {
        (_, []) => Vec::new(),
        (ReloadKind::Full, [only]) => vec![ReloadNotice::new(kind, url_path(output_root, only))],
        (ReloadKind::Full, _) => vec![ReloadNotice::new(kind, "/")],
        (ReloadKind::Css | ReloadKind::Asset, outputs) => outputs
            .iter()
            .map(|out| ReloadNotice::new(kind, url_path(output_root, out)))
            .collect(),
    }
}

/// Server path of an output file: `/` plus its path below the output root.
fn url_path(output_root: &Path, output: &Path) -> String {
    let rel = output.strip_prefix(output_root).unwrap_or(output);
    let joined = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    format!("/{joined}")
}
