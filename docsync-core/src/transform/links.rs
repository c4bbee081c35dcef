//! Image and link resolution stages.

use super::{map_outside_fences, TransformContext};
use crate::internal_links::InternalLinkMapper;
use crate::path_resolver::{is_external_or_anchor, resolve, resolve_asset};
use regex::{Captures, Regex};
use std::sync::LazyLock;

static MD_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)\s]+)([^)]*)\)").unwrap());
static IMG_SRC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)(<img\b[^>]*?\bsrc=)(["'])([^"']*)(["'])"#).unwrap());
static INLINE_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\]\(([^)\s]+)([^)]*)\)").unwrap());
static REFERENCE_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^( {0,3}\[([^\]]+)\]:)([ \t]*)(\S+)").unwrap());

/// Points relative images at the raw view of the source repository.
/// Fenced code blocks are left as written.
pub fn resolve_images(content: &str, ctx: &TransformContext) -> String {
    map_outside_fences(content, |prose| resolve_images_in(prose, ctx))
}

fn resolve_images_in(content: &str, ctx: &TransformContext) -> String {
    let dir = ctx.source_dir();
    let out = MD_IMAGE.replace_all(content, |caps: &Captures| {
        let target = &caps[2];
        if is_external_or_anchor(target) {
            return caps[0].to_string();
        }
        format!(
            "![{}]({}{})",
            &caps[1],
            resolve_asset(target, dir, &ctx.repo_url, &ctx.reference),
            &caps[3]
        )
    });
    IMG_SRC
        .replace_all(&out, |caps: &Captures| {
            let target = &caps[3];
            if target.is_empty() || is_external_or_anchor(target) {
                return caps[0].to_string();
            }
            format!(
                "{}{}{}{}",
                &caps[1],
                &caps[2],
                resolve_asset(target, dir, &ctx.repo_url, &ctx.reference),
                &caps[4]
            )
        })
        .into_owned()
}

/// Points relative links at the source repository, or at the local route
/// when the target file is synced into the site. Fenced code blocks are left
/// as written.
pub fn resolve_links(content: &str, ctx: &TransformContext, mapper: &InternalLinkMapper) -> String {
    map_outside_fences(content, |prose| resolve_links_in(prose, ctx, mapper))
}

fn resolve_links_in(content: &str, ctx: &TransformContext, mapper: &InternalLinkMapper) -> String {
    let out = INLINE_LINK.replace_all(content, |caps: &Captures| {
        match rewrite_target(&caps[1], ctx, mapper) {
            Some(target) => format!("]({}{})", target, &caps[2]),
            None => caps[0].to_string(),
        }
    });
    REFERENCE_LINK
        .replace_all(&out, |caps: &Captures| {
            // Footnote definitions share the syntax but carry prose, not a path.
            if caps[2].starts_with('^') {
                return caps[0].to_string();
            }
            match rewrite_target(&caps[4], ctx, mapper) {
                Some(target) => format!("{}{}{}", &caps[1], &caps[3], target),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// New target for a link, or `None` when it must stay as written.
fn rewrite_target(target: &str, ctx: &TransformContext, mapper: &InternalLinkMapper) -> Option<String> {
    if target.starts_with('<') || is_external_or_anchor(target) || mapper.is_local_route(target) {
        return None;
    }
    let (path, fragment) = match target.find('#') {
        Some(idx) => target.split_at(idx),
        None => (target, ""),
    };
    let resolved = resolve(path, ctx.source_dir(), &ctx.repo_url, &ctx.reference);
    match mapper.map_to_local_path(&resolved) {
        Some(local) => Some(format!("{local}{fragment}")),
        None => Some(format!("{resolved}{fragment}")),
    }
}
