// src/pipeline/styles.rs

//! Stylesheet stages.
//!
//! The order matters: globbed imports are expanded first, then every local
//! import is inlined and vendor prefixes are added. Media queries are
//! grouped last, once the rule set is fully expanded.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use regex::{Captures, Regex};

use crate::fileset::glob_matches;
use crate::pipeline::asset::{Asset, GlobDependency};
use crate::pipeline::join_normalized;
use crate::pipeline::stage::{Stage, StageContext};

const MAX_IMPORT_DEPTH: usize = 32;

/// Expands `@import "dir/**/*.scss";` into one import per matching file,
/// sorted by path.
#[derive(Debug, Clone)]
pub struct ImportGlobStage {
    directive: Regex,
}

impl ImportGlobStage {
    pub fn new() -> Result<Self> {
        let directive = Regex::new(r#"@import\s+(['"])([^'"]*[*?\[{][^'"]*)['"]\s*;"#)?;
        Ok(Self { directive })
    }
}

impl Stage for ImportGlobStage {
    fn name(&self) -> &'static str {
        "import-glob"
    }

    fn apply(&self, mut asset: Asset, ctx: &StageContext<'_>) -> Result<Vec<Asset>> {
        let text = asset.text()?;
        if !self.directive.is_match(text) {
            return Ok(vec![asset]);
        }

        let dir = asset.source_dir().to_path_buf();
        let mut failure = None;
        let mut globs = Vec::new();
        let expanded = self.directive.replace_all(text, |caps: &Captures<'_>| {
            let quote = &caps[1];
            let pattern = &caps[2];
            globs.push(GlobDependency {
                dir: dir.clone(),
                pattern: pattern.to_string(),
            });
            match glob_matches(ctx.fs, &dir, pattern, &asset.source) {
                Ok(paths) => paths
                    .iter()
                    .map(|p| format!("@import {quote}{p}{quote};"))
                    .collect::<Vec<_>>()
                    .join("\n"),
                Err(err) => {
                    failure.get_or_insert(err);
                    String::new()
                }
            }
        });

        if let Some(err) = failure {
            return Err(err);
        }
        let expanded = expanded.into_owned();
        asset.globs.extend(globs);
        Ok(vec![asset.with_content(expanded)])
    }
}

/// Inlines local `@import`s (`name` resolves to `name.scss`, `_name.scss`,
/// `name.css`, ... next to the importing file).
///
/// Imports that cannot be found locally (packages, remote URLs) are left in
/// place for the preprocessor.
#[derive(Debug, Clone)]
pub struct ImportInlineStage {
    directive: Regex,
}

impl ImportInlineStage {
    pub fn new() -> Result<Self> {
        let directive = Regex::new(r#"@import\s+(?:'([^']+)'|"([^"]+)")\s*;"#)?;
        Ok(Self { directive })
    }

    fn inline(
        &self,
        text: &str,
        dir: &Path,
        ctx: &StageContext<'_>,
        stack: &mut Vec<PathBuf>,
        deps: &mut BTreeSet<PathBuf>,
    ) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;

        for caps in self.directive.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let target = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();

            let Some(resolved) = resolve_import(ctx, dir, target) else {
                continue;
            };

            out.push_str(&text[last..whole.start()]);
            last = whole.end();

            if stack.contains(&resolved) {
                bail!("import cycle through {}", resolved.display());
            }
            if stack.len() >= MAX_IMPORT_DEPTH {
                bail!("imports nested deeper than {MAX_IMPORT_DEPTH} at {}", resolved.display());
            }

            let imported = ctx
                .fs
                .read_to_string(&resolved)
                .with_context(|| format!("importing '{target}'"))?;
            deps.insert(resolved.clone());

            let nested_dir = resolved.parent().unwrap_or(dir).to_path_buf();
            stack.push(resolved);
            let expanded = self.inline(&imported, &nested_dir, ctx, stack, deps)?;
            stack.pop();

            out.push_str(expanded.trim_end());
        }

        out.push_str(&text[last..]);
        Ok(out)
    }
}

impl Stage for ImportInlineStage {
    fn name(&self) -> &'static str {
        "import-inline"
    }

    fn apply(&self, mut asset: Asset, ctx: &StageContext<'_>) -> Result<Vec<Asset>> {
        let dir = asset.source_dir().to_path_buf();
        let mut stack = vec![asset.source.clone()];
        let mut deps = BTreeSet::new();

        let inlined = self.inline(asset.text()?, &dir, ctx, &mut stack, &mut deps)?;

        asset.dependencies.extend(deps);
        Ok(vec![asset.with_content(inlined)])
    }
}

fn resolve_import(ctx: &StageContext<'_>, dir: &Path, target: &str) -> Option<PathBuf> {
    if target.contains("://") || target.starts_with("//") {
        return None;
    }

    let base = join_normalized(dir, Path::new(target));
    let parent = base.parent().map(Path::to_path_buf).unwrap_or_default();
    let stem = base.file_name()?.to_string_lossy().to_string();

    let mut candidates = vec![base.clone()];
    for ext in ["scss", "css"] {
        candidates.push(parent.join(format!("{stem}.{ext}")));
        candidates.push(parent.join(format!("_{stem}.{ext}")));
    }
    candidates.push(base.join("_index.scss"));
    candidates.push(base.join("index.scss"));

    candidates.into_iter().find(|c| ctx.fs.is_file(c))
}

/// Properties that still need prefixed copies for older engines.
const PROPERTY_PREFIXES: &[(&str, &[&str])] = &[
    ("appearance", &["-webkit-", "-moz-"]),
    ("backdrop-filter", &["-webkit-"]),
    ("backface-visibility", &["-webkit-"]),
    ("box-decoration-break", &["-webkit-"]),
    ("clip-path", &["-webkit-"]),
    ("hyphens", &["-webkit-", "-ms-"]),
    ("mask", &["-webkit-"]),
    ("mask-image", &["-webkit-"]),
    ("tab-size", &["-moz-"]),
    ("text-size-adjust", &["-webkit-", "-moz-", "-ms-"]),
    ("user-select", &["-webkit-", "-moz-", "-ms-"]),
];

/// `(property, value, prefixed values)` for values that changed name.
const VALUE_PREFIXES: &[(&str, &str, &[&str])] = &[
    ("display", "flex", &["-webkit-box", "-ms-flexbox"]),
    ("display", "inline-flex", &["-webkit-inline-box", "-ms-inline-flexbox"]),
    ("display", "grid", &["-ms-grid"]),
    ("display", "inline-grid", &["-ms-inline-grid"]),
    ("position", "sticky", &["-webkit-sticky"]),
];

/// Inserts vendor-prefixed copies ahead of declarations listed in
/// [`PROPERTY_PREFIXES`] and [`VALUE_PREFIXES`]. A prefixed form already
/// present in the same block is not added twice.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoprefixStage;

impl Stage for AutoprefixStage {
    fn name(&self) -> &'static str {
        "autoprefix"
    }

    fn apply(&self, asset: Asset, _ctx: &StageContext<'_>) -> Result<Vec<Asset>> {
        let prefixed = add_vendor_prefixes(asset.text()?);
        Ok(vec![asset.with_content(prefixed)])
    }
}

pub fn add_vendor_prefixes(css: &str) -> String {
    let bytes = css.as_bytes();
    let mut out = String::with_capacity(css.len() + css.len() / 8);
    let mut seg = 0;
    let mut block_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => i = skip_string(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*')
                || (bytes.get(i + 1) == Some(&b'/') && (i == 0 || bytes[i - 1] != b':')) =>
            {
                let end = if bytes[i + 1] == b'*' {
                    skip_comment(bytes, i)
                } else {
                    css[i..].find('\n').map_or(bytes.len(), |o| i + o)
                };
                // A comment leading a statement is copied through on its own
                // so the declaration after it still parses.
                if css[seg..i].trim().is_empty() {
                    out.push_str(&css[seg..end]);
                    seg = end;
                }
                i = end;
            }
            b'{' => {
                out.push_str(&css[seg..=i]);
                i += 1;
                seg = i;
                block_start = i;
            }
            b';' | b'}' => {
                let block_end = css[i..].find('}').map_or(css.len(), |o| i + o);
                out.push_str(&prefixed_copies(&css[seg..i], &css[block_start..block_end]));
                out.push_str(&css[seg..=i]);
                i += 1;
                seg = i;
            }
            _ => i += 1,
        }
    }

    out.push_str(&css[seg..]);
    out
}

/// Prefixed declarations to insert before `stmt`, each ending in `;`.
fn prefixed_copies(stmt: &str, block: &str) -> String {
    let body = stmt.trim();
    let lead = &stmt[..stmt.len() - stmt.trim_start().len()];
    let Some(colon) = body.find(':') else {
        return String::new();
    };
    let prop = body[..colon].trim();
    if prop.is_empty() || !prop.bytes().all(|b| b.is_ascii_alphabetic() || b == b'-') {
        return String::new();
    }
    let prop_lc = prop.to_ascii_lowercase();
    let after = &body[colon + 1..];
    let sep = &after[..after.len() - after.trim_start().len()];
    let value = after.trim();

    let mut out = String::new();
    if let Some((_, prefixes)) = PROPERTY_PREFIXES.iter().find(|(p, _)| *p == prop_lc) {
        for prefix in *prefixes {
            if !block.contains(&format!("{prefix}{prop_lc}")) {
                out.push_str(&format!("{lead}{prefix}{body};"));
            }
        }
    }
    for (p, v, replacements) in VALUE_PREFIXES {
        if *p != prop_lc || !value.eq_ignore_ascii_case(v) {
            continue;
        }
        for replacement in *replacements {
            if !block.contains(replacement) {
                out.push_str(&format!("{lead}{prop}:{sep}{replacement};"));
            }
        }
    }
    out
}

/// Moves every top-level `@media` block to the end of the sheet, merging
/// blocks with the same query in order of first appearance.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupMediaStage;

impl Stage for GroupMediaStage {
    fn name(&self) -> &'static str {
        "group-media"
    }

    fn apply(&self, asset: Asset, _ctx: &StageContext<'_>) -> Result<Vec<Asset>> {
        let grouped = group_media_queries(asset.text()?)?;
        Ok(vec![asset.with_content(grouped)])
    }
}

/// Changes the output extension (`.scss` to `.css`).
#[derive(Debug, Clone, Copy)]
pub struct RenameExtensionStage {
    pub extension: &'static str,
}

impl Stage for RenameExtensionStage {
    fn name(&self) -> &'static str {
        "rename"
    }

    fn apply(&self, asset: Asset, _ctx: &StageContext<'_>) -> Result<Vec<Asset>> {
        let mut rel = asset.rel_path.clone();
        rel.set_extension(self.extension);
        Ok(vec![asset.with_rel_path(rel)])
    }
}

pub fn group_media_queries(css: &str) -> Result<String> {
    let bytes = css.as_bytes();
    let mut rest = String::with_capacity(css.len());
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();

    let mut depth = 0usize;
    let mut segment_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => i = skip_string(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_comment(bytes, i),
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                depth = depth.saturating_sub(1);
                i += 1;
            }
            b'@' if depth == 0 && css[i..].starts_with("@media") => {
                let Some(open) = find_block_open(bytes, i) else {
                    i += 1;
                    continue;
                };
                let Some(close) = matching_brace(bytes, open) else {
                    bail!("unbalanced braces in @media block at byte {i}");
                };

                rest.push_str(&css[segment_start..i]);
                let query = normalize_whitespace(&css[i + "@media".len()..open]);
                let body = css[open + 1..close].trim().to_string();

                match groups.iter_mut().find(|(q, _)| *q == query) {
                    Some((_, bodies)) => bodies.push(body),
                    None => groups.push((query, vec![body])),
                }

                i = close + 1;
                segment_start = i;
            }
            _ => i += 1,
        }
    }

    if groups.is_empty() {
        return Ok(css.to_string());
    }

    rest.push_str(&css[segment_start..]);
    let mut out = rest.trim_end().to_string();
    for (query, bodies) in groups {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&format!("@media {query} {{\n"));
        let bodies: Vec<&str> = bodies.iter().map(String::as_str).filter(|b| !b.is_empty()).collect();
        out.push_str(&bodies.join("\n"));
        out.push_str("\n}");
    }
    out.push('\n');
    Ok(out)
}

fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn skip_comment(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 2;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            return i + 2;
        }
        i += 1;
    }
    bytes.len()
}

/// Index of the `{` opening the at-rule starting at `start`, or `None` for
/// a statement at-rule ending in `;`.
fn find_block_open(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => i = skip_string(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_comment(bytes, i),
            b'{' => return Some(i),
            b';' | b'}' => return None,
            _ => i += 1,
        }
    }
    None
}

fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = skip_comment(bytes, i);
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn ctx(fs: &MockFileSystem) -> StageContext<'_> {
        StageContext { fs, production: false }
    }

    #[test]
    fn groups_identical_queries_in_first_appearance_order() {
        let css = "a { color: red; }\n\
                   @media (max-width: 600px) { a { color: blue; } }\n\
                   b { margin: 0; }\n\
                   @media print { b { display: none; } }\n\
                   @media  (max-width:  600px) { b { color: green; } }\n";

        let out = group_media_queries(css).unwrap();

        assert_eq!(
            out,
            "a { color: red; }\n\nb { margin: 0; }\n\n\
             @media (max-width: 600px) {\na { color: blue; }\nb { color: green; }\n}\n\n\
             @media print {\nb { display: none; }\n}\n"
        );
    }

    #[test]
    fn braces_inside_strings_and_comments_are_ignored() {
        let css = "/* { */ @media screen { a::before { content: \"}\"; } }";
        let out = group_media_queries(css).unwrap();
        assert!(out.contains("content: \"}\";"));
        assert!(out.trim_end().ends_with('}'));
    }

    #[test]
    fn sheet_without_media_is_untouched() {
        let css = "a{b:c}";
        assert_eq!(group_media_queries(css).unwrap(), css);
    }

    #[test]
    fn unbalanced_media_block_fails() {
        assert!(group_media_queries("@media print { a { b: c; }").is_err());
    }

    #[test]
    fn inlines_underscore_partials_and_records_them() {
        let fs = MockFileSystem::new();
        fs.add_file("/s/scss/main.scss", "@import \"base/vars\";\nbody { x: $c; }");
        fs.add_file("/s/scss/base/_vars.scss", "$c: red;\n");

        let stage = ImportInlineStage::new().unwrap();
        let asset = Asset::new("/s/scss/main.scss", "main.scss", fs.contents("/s/scss/main.scss").unwrap());
        let out = stage.apply(asset, &ctx(&fs)).unwrap().remove(0);

        assert_eq!(out.text().unwrap(), "$c: red;\nbody { x: $c; }");
        assert!(out.dependencies.contains(Path::new("/s/scss/base/_vars.scss")));
    }

    #[test]
    fn unknown_imports_stay_for_the_preprocessor() {
        let fs = MockFileSystem::new();
        let stage = ImportInlineStage::new().unwrap();
        let asset = Asset::new("/s/scss/main.scss", "main.scss", b"@import \"bootstrap\";".to_vec());
        let out = stage.apply(asset, &ctx(&fs)).unwrap().remove(0);
        assert_eq!(out.text().unwrap(), "@import \"bootstrap\";");
    }

    #[test]
    fn glob_imports_expand_sorted() {
        let fs = MockFileSystem::new();
        fs.add_file("/s/scss/blocks/_b.scss", "");
        fs.add_file("/s/scss/blocks/_a.scss", "");
        let stage = ImportGlobStage::new().unwrap();
        let asset = Asset::new("/s/scss/main.scss", "main.scss", b"@import \"blocks/*.scss\";".to_vec());

        let out = stage.apply(asset, &ctx(&fs)).unwrap().remove(0);
        assert_eq!(
            out.text().unwrap(),
            "@import \"blocks/_a.scss\";\n@import \"blocks/_b.scss\";"
        );
    }

    #[test]
    fn prefixes_are_inserted_before_the_standard_declaration() {
        let out = add_vendor_prefixes("a { user-select: none; }");
        assert_eq!(
            out,
            "a { -webkit-user-select: none; -moz-user-select: none; -ms-user-select: none; user-select: none; }"
        );
    }

    #[test]
    fn prefixed_values_and_last_declaration_without_semicolon() {
        assert_eq!(
            add_vendor_prefixes(".row{display:flex}"),
            ".row{display:-webkit-box;display:-ms-flexbox;display:flex}"
        );
    }

    #[test]
    fn existing_prefixes_are_not_duplicated() {
        let out = add_vendor_prefixes("a{-webkit-user-select:none;user-select:none}");
        assert_eq!(
            out,
            "a{-webkit-user-select:none;-moz-user-select:none;-ms-user-select:none;user-select:none}"
        );
    }

    #[test]
    fn selectors_variables_and_comments_pass_through() {
        let css = "$w: 1px;\n// hyphens: auto;\na:hover { color: red; }\n/* x */ b { tab-size: 4 }";
        let out = add_vendor_prefixes(css);
        assert_eq!(
            out,
            "$w: 1px;\n// hyphens: auto;\na:hover { color: red; }\n/* x */ b { -moz-tab-size: 4; tab-size: 4 }"
        );
    }

    #[test]
    fn rename_switches_extension() {
        let fs = MockFileSystem::new();
        let stage = RenameExtensionStage { extension: "css" };
        let out = stage
            .apply(Asset::new("/s/scss/a/main.scss", "a/main.scss", vec![]), &ctx(&fs))
            .unwrap();
        assert_eq!(out[0].rel_path, PathBuf::from("a/main.css"));
    }
}
