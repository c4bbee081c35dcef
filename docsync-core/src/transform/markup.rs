//! Markup compatibility stages: tab blocks, callouts, comments and raw HTML.

use super::map_outside_fences;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Component imports required by converted tab blocks.
pub const TABS_IMPORTS: &str = "import Tabs from '@theme/Tabs';\nimport TabItem from '@theme/TabItem';\n\n";

static TAB_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!-- TABS:START -->\r?\n(.*?)<!-- TABS:END -->").unwrap());
static TAB_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^([^:\n]+?)(:default)?\s*-->\r?\n(.*)$").unwrap());
static CALLOUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^> \[!(NOTE|TIP|IMPORTANT|WARNING|CAUTION|REQUIREMENTS)\][ \t]*\r?\n((?:>[^\n]*(?:\n|$))*)",
    )
    .unwrap()
});
static QUOTE_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^> ?").unwrap());
static HTML_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--(.*?)-->").unwrap());
static BR_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br(\s[^/>]*?)?\s*>").unwrap());
static PICTURE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?picture(?:\s[^>]*)?>").unwrap());
static VOID_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(img|input|area|base|col|embed|hr|link|meta|param|source|track|wbr)\b([^>]*)>")
        .unwrap()
});
static OPEN_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([A-Za-z][\w-]*)(\s[^<>]*)>").unwrap());
static UNQUOTED_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\s[\w:-]+)=([^"'\s>{/][^"'\s>]*)"#).unwrap());
static AUTOLINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<(https?://[^>\s]+)>").unwrap());
static QUOTED_BRACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"'(\{[^{}\n]*\})'").unwrap());
// Single-line only: inline code spans cannot cross lines.
static BRACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{[^{}\n]*\}").unwrap());
static INLINE_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`[^`\n]*`").unwrap());
static DETAILS_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<details(?:\s[^>]*)?>").unwrap());
static SUMMARY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<summary(?:\s[^>]*)?>").unwrap());

struct Tab<'a> {
    label: &'a str,
    body: &'a str,
    is_default: bool,
}

/// Converts `<!-- TABS:START -->` marker blocks into `<Tabs>` markup.
///
/// The component imports are prepended once, and only if a block was
/// actually converted.
pub fn convert_tabs(content: &str) -> String {
    if !content.contains("<!-- TABS:START -->") {
        return content.to_string();
    }

    let mut converted = false;
    let out = TAB_BLOCK.replace_all(content, |caps: &Captures| {
        let tabs: Vec<Tab> = caps[1]
            .split("<!-- TAB:")
            .skip(1)
            .filter_map(|section| {
                let m = TAB_SECTION.captures(section)?;
                Some(Tab {
                    label: m.get(1).map_or("", |g| g.as_str()).trim(),
                    body: m.get(3).map_or("", |g| g.as_str()).trim(),
                    is_default: m.get(2).is_some(),
                })
            })
            .collect();

        if tabs.is_empty() {
            return caps[0].to_string();
        }
        converted = true;

        let mut block = String::from("<Tabs>\n");
        for tab in &tabs {
            let default_attr = if tab.is_default { " default" } else { "" };
            block.push_str(&format!(
                "<TabItem value=\"{}\" label=\"{}\"{}>\n\n{}\n\n</TabItem>\n",
                tab_value(tab.label),
                tab.label,
                default_attr,
                tab.body
            ));
        }
        block.push_str("</Tabs>");
        block
    });

    if converted && !out.contains("import Tabs from '@theme/Tabs';") {
        format!("{TABS_IMPORTS}{out}")
    } else {
        out.into_owned()
    }
}

fn tab_value(label: &str) -> String {
    label
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '-' })
        .collect()
}

fn admonition_kind(keyword: &str) -> &'static str {
    match keyword {
        "NOTE" => "note",
        "TIP" => "tip",
        "IMPORTANT" => "info",
        "WARNING" => "warning",
        "CAUTION" => "danger",
        "REQUIREMENTS" => "info",
        _ => "note",
    }
}

/// Converts `> [!KIND]` blockquote callouts into `:::kind` admonitions.
pub fn convert_callouts(content: &str) -> String {
    CALLOUT
        .replace_all(content, |caps: &Captures| {
            let kind = admonition_kind(&caps[1]);
            let body = QUOTE_PREFIX.replace_all(&caps[2], "");
            format!(":::{}\n{}\n:::\n", kind, body.trim())
        })
        .into_owned()
}

/// Rewrites HTML comments to `{/* ... */}` outside fenced code blocks.
///
/// Mermaid arrows (`-->`) are only touched when they close a `<!--`.
pub fn fix_comments(content: &str) -> String {
    map_outside_fences(content, |prose| {
        HTML_COMMENT
            .replace_all(prose, |caps: &Captures| {
                let inner = caps[1].trim();
                if inner.is_empty() {
                    "{/* */}".to_string()
                } else {
                    format!("{{/* {inner} */}}")
                }
            })
            .into_owned()
    })
}

/// Raw HTML and brace fixes for the MDX renderer, applied outside fenced code.
pub fn fix_html(content: &str) -> String {
    map_outside_fences(content, fix_html_prose)
}

fn fix_html_prose(prose: &str) -> String {
    let out = BR_TAG.replace_all(prose, |caps: &Captures| {
        let attrs = caps.get(1).map_or("", |m| m.as_str().trim_end());
        format!("<br{attrs} />")
    });
    let out = PICTURE_TAG.replace_all(&out, "");
    let out = VOID_TAG.replace_all(&out, |caps: &Captures| {
        let attrs = caps[2].trim_end();
        if attrs.ends_with('/') {
            caps[0].to_string()
        } else {
            format!("<{}{} />", &caps[1], attrs)
        }
    });
    let out = AUTOLINK.replace_all(&out, "`$1`");
    let out = OPEN_TAG.replace_all(&out, |caps: &Captures| {
        let attrs = UNQUOTED_ATTR.replace_all(&caps[2], "$1=\"$2\"");
        format!("<{}{}>", &caps[1], attrs)
    });
    let out = map_outside_inline_code(&out, escape_literal_braces);
    let out = DETAILS_TAG.replace_all(&out, "<details>");
    let out = SUMMARY_TAG.replace_all(&out, "<summary>");
    out.into_owned()
}

fn map_outside_inline_code(text: &str, f: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in INLINE_CODE.find_iter(text) {
        out.push_str(&f(&text[last..m.start()]));
        out.push_str(m.as_str());
        last = m.end();
    }
    out.push_str(&f(&text[last..]));
    out
}

/// Wraps brace expressions that are meant literally in code spans.
fn escape_literal_braces(text: &str) -> String {
    let quoted = QUOTED_BRACES.replace_all(text, "`$1`");
    // The quoted form above produced code spans; protect them from the
    // general rule below.
    map_outside_inline_code(&quoted, |part| {
        BRACES
            .replace_all(part, |caps: &Captures| {
                let expr = &caps[0];
                if expr.starts_with("{/*") && expr.ends_with("*/}") {
                    return expr.to_string();
                }
                let literal = expr.contains('"')
                    || expr.contains('\'')
                    || expr.contains('\\')
                    || expr.chars().any(|c| c.is_ascii_digit());
                if literal {
                    format!("`{expr}`")
                } else {
                    expr.to_string()
                }
            })
            .into_owned()
    })
}
