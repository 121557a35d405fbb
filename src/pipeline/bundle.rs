// src/pipeline/bundle.rs

use std::path::PathBuf;

use crate::pipeline::asset::Asset;

/// Fan-in: concatenate processed assets into one output named `name`,
/// in the order given, separated by newlines.
///
/// Every input's source and dependencies become dependencies of the bundle.
pub fn concat_assets(name: &str, bundle_source: PathBuf, parts: Vec<Asset>) -> Asset {
    let mut bundle = Asset::new(bundle_source, name, Vec::new());

    for (idx, part) in parts.into_iter().enumerate() {
        if idx > 0 {
            bundle.content.push(b'\n');
        }
        bundle.content.extend_from_slice(&part.content);
        bundle.dependencies.insert(part.source);
        bundle.dependencies.extend(part.dependencies);
        bundle.globs.extend(part.globs);
    }

    bundle
}
