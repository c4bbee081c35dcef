//! Per-document content transformation.
//!
//! A synced document goes through an explicit, ordered list of [`Stage`]s.
//! Every stage is a pure `&str -> String` rewrite that can be exercised on
//! its own; [`ContentTransformer::transform`] simply folds the document
//! through [`Stage::PIPELINE`].
//!
//! Stages are best-effort: markup they do not recognise (unbalanced
//! comments, tab blocks without tabs, ...) passes through unchanged, and no
//! stage can fail.

mod links;
mod markup;

pub use links::{resolve_images, resolve_links};
pub use markup::{convert_callouts, convert_tabs, fix_comments, fix_html, TABS_IMPORTS};

use crate::internal_links::InternalLinkMapper;
use crate::path_resolver::source_dir_of;
use std::sync::Arc;
use tracing::debug;

/// Immutable per-document input for link resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformContext {
    pub repo_url: String,
    /// Branch or tag the document was fetched from.
    pub reference: String,
    /// Repository path of the document, e.g. `guides/QUICKSTART.md`.
    pub source_path: String,
}

impl TransformContext {
    pub fn new(
        repo_url: impl Into<String>,
        reference: impl Into<String>,
        source_path: impl Into<String>,
    ) -> Self {
        Self {
            repo_url: repo_url.into(),
            reference: reference.into(),
            source_path: source_path.into(),
        }
    }

    pub fn source_dir(&self) -> &str {
        source_dir_of(&self.source_path)
    }
}

/// Literal substring rewrite for an upstream link known to be broken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokenLinkFix {
    pub from: String,
    pub to: String,
}

/// Extra per-job rewrite applied after the standard pipeline.
pub type ContentHook = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Builds a hook that inserts `intro` right before the first top-level
/// heading, or at the top when the document has none.
pub fn insert_before_first_heading(intro: impl Into<String>) -> ContentHook {
    let intro = intro.into();
    Arc::new(move |content: &str| {
        let intro = intro.trim_end();
        if content.starts_with("# ") {
            return format!("{intro}\n\n{content}");
        }
        match content.find("\n# ") {
            Some(idx) => format!("{}\n{intro}\n\n{}", &content[..idx], &content[idx + 1..]),
            None => format!("{intro}\n\n{content}"),
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RepairBrokenLinks,
    ConvertTabs,
    ConvertCallouts,
    FixComments,
    FixHtml,
    ResolveImages,
    ResolveLinks,
}

impl Stage {
    /// The order stages are applied in; each stage's output feeds the next.
    pub const PIPELINE: [Stage; 7] = [
        Stage::RepairBrokenLinks,
        Stage::ConvertTabs,
        Stage::ConvertCallouts,
        Stage::FixComments,
        Stage::FixHtml,
        Stage::ResolveImages,
        Stage::ResolveLinks,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::RepairBrokenLinks => "repair_broken_links",
            Stage::ConvertTabs => "convert_tabs",
            Stage::ConvertCallouts => "convert_callouts",
            Stage::FixComments => "fix_comments",
            Stage::FixHtml => "fix_html",
            Stage::ResolveImages => "resolve_images",
            Stage::ResolveLinks => "resolve_links",
        }
    }
}

/// Runs the stage pipeline for one repository family.
#[derive(Debug, Clone, Default)]
pub struct ContentTransformer {
    link_fixes: Vec<BrokenLinkFix>,
    mapper: InternalLinkMapper,
}

impl ContentTransformer {
    pub fn new(mapper: InternalLinkMapper, link_fixes: Vec<BrokenLinkFix>) -> Self {
        Self { link_fixes, mapper }
    }

    /// Transformer for a project whose upstream docs still point at a retired
    /// `dev` branch of `repo_url`.
    pub fn with_retired_dev_branch(
        mapper: InternalLinkMapper,
        repo_url: &str,
        default_branch: &str,
    ) -> Self {
        let repo_url = repo_url.trim_end_matches('/');
        let link_fixes = ["tree", "blob"]
            .iter()
            .map(|view| BrokenLinkFix {
                from: format!("{repo_url}/{view}/dev/"),
                to: format!("{repo_url}/{view}/{default_branch}/"),
            })
            .collect();
        Self::new(mapper, link_fixes)
    }

    pub fn mapper(&self) -> &InternalLinkMapper {
        &self.mapper
    }

    pub fn transform(&self, raw: &str, ctx: &TransformContext) -> String {
        let out = Stage::PIPELINE
            .iter()
            .fold(raw.to_string(), |acc, stage| self.apply(*stage, &acc, ctx));
        debug!(
            source_path = %ctx.source_path,
            reference = %ctx.reference,
            input_len = raw.len(),
            output_len = out.len(),
            "Transformed document"
        );
        out
    }

    pub fn apply(&self, stage: Stage, content: &str, ctx: &TransformContext) -> String {
        match stage {
            Stage::RepairBrokenLinks => repair_known_broken_links(content, &self.link_fixes),
            Stage::ConvertTabs => convert_tabs(content),
            Stage::ConvertCallouts => convert_callouts(content),
            Stage::FixComments => fix_comments(content),
            Stage::FixHtml => fix_html(content),
            Stage::ResolveImages => resolve_images(content, ctx),
            Stage::ResolveLinks => resolve_links(content, ctx, &self.mapper),
        }
    }
}

pub fn repair_known_broken_links(content: &str, fixes: &[BrokenLinkFix]) -> String {
    fixes.iter().fold(content.to_string(), |acc, fix| {
        if fix.from.is_empty() {
            acc
        } else {
            acc.replace(&fix.from, &fix.to)
        }
    })
}

/// Applies `f` to every part of `content` outside fenced code blocks.
///
/// Fences open with at least three backticks or tildes and close with a run
/// of the same character that is at least as long. An unterminated fence
/// extends to the end of the document.
pub(crate) fn map_outside_fences(content: &str, f: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(content.len());
    let mut prose = String::new();
    let mut fence: Option<(char, usize)> = None;

    for line in content.split_inclusive('\n') {
        let marker = fence_marker(line);
        match (fence, marker) {
            (None, Some(open)) => {
                out.push_str(&f(&prose));
                prose.clear();
                fence = Some(open);
                out.push_str(line);
            }
            (None, None) => prose.push_str(line),
            (Some((ch, len)), Some((mch, mlen))) if ch == mch && mlen >= len => {
                fence = None;
                out.push_str(line);
            }
            (Some(_), _) => out.push_str(line),
        }
    }
    out.push_str(&f(&prose));
    out
}

fn fence_marker(line: &str) -> Option<(char, usize)> {
    let trimmed = line.trim_start_matches(' ');
    if line.len() - trimmed.len() > 3 {
        return None;
    }
    let ch = trimmed.chars().next()?;
    if ch != '`' && ch != '~' {
        return None;
    }
    let run = trimmed.chars().take_while(|c| *c == ch).count();
    (run >= 3).then_some((ch, run))
}
