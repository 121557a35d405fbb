// src/pipeline/chain.rs

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::config::TaskConfig;
use crate::pipeline::command::CommandStage;
use crate::pipeline::images::ImageVariantsStage;
use crate::pipeline::include::FileIncludeStage;
use crate::pipeline::runner::Pipeline;
use crate::pipeline::styles::{
    AutoprefixStage, GroupMediaStage, ImportGlobStage, ImportInlineStage, RenameExtensionStage,
};
use crate::types::TaskKind;

/// Stage chain for a configured task.
///
/// | kind    | stages                                                                    |
/// |---------|---------------------------------------------------------------------------|
/// | html    | file-include                                                              |
/// | styles  | import-glob, import-inline, autoprefix, [preprocess], group-media, rename |
/// | images  | image-variants                                                            |
/// | copy    | (none)                                                                    |
/// | scripts | [preprocess]; bundling happens after all files are processed              |
pub fn pipeline_for(task: &TaskConfig) -> Result<Pipeline> {
    let pipeline = match task.kind {
        TaskKind::Html => Pipeline::new().with_stage(FileIncludeStage::new()?),
        TaskKind::Styles => {
            let mut p = Pipeline::new()
                .with_stage(ImportGlobStage::new()?)
                .with_stage(ImportInlineStage::new()?)
                .with_stage(AutoprefixStage);
            if let Some(cmd) = &task.preprocess {
                p = p.with_stage(CommandStage::new(cmd.clone()));
            }
            p.with_stage(GroupMediaStage)
                .with_stage(RenameExtensionStage { extension: "css" })
        }
        TaskKind::Images => Pipeline::new().with_stage(ImageVariantsStage),
        TaskKind::Copy => Pipeline::new(),
        TaskKind::Scripts => match &task.preprocess {
            Some(cmd) => Pipeline::new().with_stage(CommandStage::new(cmd.clone())),
            None => Pipeline::new(),
        },
    };
    Ok(pipeline)
}

/// The output a source is judged against when deciding whether to rebuild
/// it, relative to the task's destination directory.
pub fn primary_output(task: &TaskConfig, rel: &Path) -> PathBuf {
    if let Some(bundle) = &task.bundle {
        return PathBuf::from(bundle);
    }
    match task.kind {
        TaskKind::Styles => rel.with_extension("css"),
        _ => rel.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn styles_chain_groups_media_after_expansion() {
        let mut task = TaskConfig::new(TaskKind::Styles, &["scss/**/*.scss"], "css");
        task.preprocess = Some("sass --stdin".into());

        let names = pipeline_for(&task).unwrap().stage_names();
        assert_eq!(
            names,
            vec![
                "import-glob",
                "import-inline",
                "autoprefix",
                "preprocess",
                "group-media",
                "rename"
            ]
        );
    }

    #[test]
    fn primary_output_follows_kind_and_bundle() {
        let styles = TaskConfig::new(TaskKind::Styles, &["scss/*.scss"], "css");
        assert_eq!(primary_output(&styles, Path::new("main.scss")), PathBuf::from("main.css"));

        let mut scripts = TaskConfig::new(TaskKind::Scripts, &["js/*.js"], "js");
        assert_eq!(primary_output(&scripts, Path::new("a.js")), PathBuf::from("a.js"));
        scripts.bundle = Some("app.js".into());
        assert_eq!(primary_output(&scripts, Path::new("a.js")), PathBuf::from("app.js"));
    }
}
