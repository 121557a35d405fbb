// src/pipeline/include.rs

//! `@@include('path', {"key": "value"})` expansion for HTML.
//!
//! Paths resolve against the directory of the file containing the
//! directive. Parameters are substituted into the included file as
//! `@@key` before its own includes are expanded, and stay visible to those
//! nested includes.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde_json::{Map, Value};

use crate::pipeline::asset::Asset;
use crate::pipeline::join_normalized;
use crate::pipeline::stage::{Stage, StageContext};

const MAX_INCLUDE_DEPTH: usize = 32;

#[derive(Debug, Clone)]
pub struct FileIncludeStage {
    directive: Regex,
}

impl FileIncludeStage {
    pub fn new() -> Result<Self> {
        let directive = Regex::new(r#"@@include\(\s*(?:'([^']+)'|"([^"]+)")"#)?;
        Ok(Self { directive })
    }

    fn expand(
        &self,
        text: &str,
        dir: &Path,
        inherited: &Map<String, Value>,
        ctx: &StageContext<'_>,
        stack: &mut Vec<PathBuf>,
        deps: &mut BTreeSet<PathBuf>,
    ) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        let mut pos = 0;

        while let Some(caps) = self.directive.captures(&text[pos..]) {
            let Some(head) = caps.get(0) else {
                break;
            };
            let rel = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            out.push_str(&text[pos..pos + head.start()]);

            let (own, end) = directive_tail(text, pos + head.end())
                .with_context(|| format!("malformed @@include('{rel}')"))?;
            pos = end;

            let mut params = inherited.clone();
            params.extend(own);

            let target = join_normalized(dir, Path::new(rel));
            if stack.contains(&target) {
                bail!("include cycle through {}", target.display());
            }
            if stack.len() >= MAX_INCLUDE_DEPTH {
                bail!("includes nested deeper than {MAX_INCLUDE_DEPTH} at {}", target.display());
            }

            let included = ctx
                .fs
                .read_to_string(&target)
                .with_context(|| format!("including '{rel}'"))?;
            deps.insert(target.clone());

            let included = substitute_params(&included, &params);
            let nested_dir = target.parent().unwrap_or(dir).to_path_buf();

            stack.push(target);
            let expanded = self.expand(&included, &nested_dir, &params, ctx, stack, deps)?;
            stack.pop();

            out.push_str(&expanded);
        }

        out.push_str(&text[pos..]);
        Ok(out)
    }
}

impl Stage for FileIncludeStage {
    fn name(&self) -> &'static str {
        "file-include"
    }

    fn apply(&self, mut asset: Asset, ctx: &StageContext<'_>) -> Result<Vec<Asset>> {
        let dir = asset.source_dir().to_path_buf();
        let mut stack = vec![asset.source.clone()];
        let mut deps = BTreeSet::new();

        let expanded =
            self.expand(asset.text()?, &dir, &Map::new(), ctx, &mut stack, &mut deps)?;

        asset.dependencies.extend(deps);
        Ok(vec![asset.with_content(expanded)])
    }
}

/// Parses the rest of a directive after its path: an optional
/// `, {json}` followed by `)`. Returns the parameters and the offset just
/// past the closing parenthesis.
fn directive_tail(text: &str, start: usize) -> Result<(Map<String, Value>, usize)> {
    let mut pos = skip_whitespace(text, start);
    let mut params = Map::new();

    if text[pos..].starts_with(',') {
        pos = skip_whitespace(text, pos + 1);
        let mut stream =
            serde_json::Deserializer::from_str(&text[pos..]).into_iter::<Map<String, Value>>();
        match stream.next() {
            Some(Ok(map)) => params = map,
            Some(Err(err)) => return Err(err).context("invalid include parameters"),
            None => bail!("missing include parameters"),
        }
        pos = skip_whitespace(text, pos + stream.byte_offset());
    }

    if !text[pos..].starts_with(')') {
        bail!("expected ')' at byte {pos}");
    }
    Ok((params, pos + 1))
}

fn skip_whitespace(text: &str, from: usize) -> usize {
    let rest = &text[from..];
    from + (rest.len() - rest.trim_start().len())
}

/// Replace `@@key` with each parameter's value. Longer keys go first so
/// `@@title` never clobbers `@@titleSuffix`.
fn substitute_params(text: &str, params: &Map<String, Value>) -> String {
    if params.is_empty() {
        return text.to_string();
    }

    let mut keys: Vec<&String> = params.keys().collect();
    keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let mut out = text.to_string();
    for key in keys {
        let value = match &params[key.as_str()] {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        out = out.replace(&format!("@@{key}"), &value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn run(fs: &MockFileSystem, path: &str) -> Result<Asset> {
        let stage = FileIncludeStage::new()?;
        let ctx = StageContext { fs, production: false };
        let content = fs.contents(path).unwrap_or_default();
        let mut out = stage.apply(Asset::new(path, "out.html", content), &ctx)?;
        Ok(out.remove(0))
    }

    #[test]
    fn inlines_partial_relative_to_file() {
        let fs = MockFileSystem::new();
        fs.add_file("/s/html/a.html", "<body>@@include('./_partial.html')</body>");
        fs.add_file("/s/html/_partial.html", "<p>hi</p>");

        let out = run(&fs, "/s/html/a.html").unwrap();
        assert_eq!(out.text().unwrap(), "<body><p>hi</p></body>");
        assert!(out.dependencies.contains(Path::new("/s/html/_partial.html")));
    }

    #[test]
    fn substitutes_parameters_and_nests() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/s/html/a.html",
            r#"@@include("blocks/_head.html", {"title": "Home", "count": 3})"#,
        );
        fs.add_file("/s/html/blocks/_head.html", "<title>@@title</title>@@include('_meta.html')");
        fs.add_file("/s/html/blocks/_meta.html", "<meta n=@@count>");

        let out = run(&fs, "/s/html/a.html").unwrap();
        assert_eq!(out.text().unwrap(), "<title>Home</title><meta n=3>");
        assert_eq!(out.dependencies.len(), 2);
    }

    #[test]
    fn nested_parameter_objects_are_read_whole() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/s/a.html",
            r#"<p>@@include('_h.html', {"meta": {"lang": "en"}, "title": "Tea (hot)"})</p>"#,
        );
        fs.add_file("/s/_h.html", "@@title|@@meta");

        let out = run(&fs, "/s/a.html").unwrap();
        assert_eq!(out.text().unwrap(), r#"<p>Tea (hot)|{"lang":"en"}</p>"#);
    }

    #[test]
    fn unterminated_directive_fails() {
        let fs = MockFileSystem::new();
        fs.add_file("/s/_h.html", "x");
        fs.add_file("/s/a.html", r#"@@include('_h.html', {"x": 1}"#);
        assert!(run(&fs, "/s/a.html").is_err());

        fs.add_file("/s/b.html", r#"@@include('_h.html', {"x": )"#);
        assert!(run(&fs, "/s/b.html").is_err());
    }

    #[test]
    fn cycles_and_missing_files_fail() {
        let fs = MockFileSystem::new();
        fs.add_file("/s/a.html", "@@include('_b.html')");
        fs.add_file("/s/_b.html", "@@include('a.html')");
        assert!(run(&fs, "/s/a.html").is_err());

        fs.add_file("/s/c.html", "@@include('_missing.html')");
        assert!(run(&fs, "/s/c.html").is_err());
    }
}
