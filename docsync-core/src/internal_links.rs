//! Allow-list of repository files that are synced into the site.
//!
//! Only files listed here have their resolved repository URLs swapped for a
//! local route. Everything else stays an external link, even when it lives
//! next to a synced guide, so the site never links to a page it does not
//! actually contain.

use std::collections::BTreeMap;

/// Maps `{repo_url}/blob/{ref}/{file_path}` URLs to local site routes.
#[derive(Debug, Clone, Default)]
pub struct InternalLinkMapper {
    repo_url: String,
    entries: BTreeMap<String, String>,
}

const LLM_D_REPO_URL: &str = "https://github.com/llm-d/llm-d";

const LLM_D_GUIDES: &[(&str, &str)] = &[
    ("guides/README.md", "/docs/guide"),
    ("guides/QUICKSTART.md", "/docs/guide/Installation/quickstart"),
    (
        "guides/prereq/infrastructure/README.md",
        "/docs/guide/Installation/prerequisites",
    ),
    (
        "guides/inference-scheduling/README.md",
        "/docs/guide/Installation/inference-scheduling",
    ),
    (
        "guides/pd-disaggregation/README.md",
        "/docs/guide/Installation/pd-disaggregation",
    ),
    (
        "guides/precise-prefix-cache-aware/README.md",
        "/docs/guide/Installation/precise-prefix-cache-aware",
    ),
    (
        "guides/simulated-accelerators/README.md",
        "/docs/guide/Installation/simulated-accelerators",
    ),
    (
        "guides/wide-ep-lws/README.md",
        "/docs/guide/Installation/wide-ep-lws",
    ),
];

impl InternalLinkMapper {
    pub fn new<I, K, V>(repo_url: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            repo_url: repo_url.into().trim_end_matches('/').to_string(),
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// The guide table of the llm-d main repository.
    pub fn llm_d_guides() -> Self {
        Self::new(LLM_D_REPO_URL, LLM_D_GUIDES.iter().copied())
    }

    /// Adds or replaces entries, e.g. from a catalog's `internal_links` section.
    pub fn extend<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.entries
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
    }

    pub fn repo_url(&self) -> &str {
        &self.repo_url
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Local route for a resolved blob URL, if that exact file is synced.
    ///
    /// The lookup ignores the ref, so links pinned to a tag and links to the
    /// default branch map to the same page. Fragments are not part of the key.
    pub fn map_to_local_path(&self, resolved_url: &str) -> Option<&str> {
        let file_path = self.file_path_of(resolved_url)?;
        self.entries.get(file_path).map(String::as_str)
    }

    /// Whether `target` is already one of the local routes in the table.
    pub fn is_local_route(&self, target: &str) -> bool {
        let route = target.split('#').next().unwrap_or(target);
        self.entries.values().any(|v| v == route)
    }

    fn file_path_of<'a>(&self, resolved_url: &'a str) -> Option<&'a str> {
        if self.repo_url.is_empty() {
            return None;
        }
        let rest = resolved_url
            .strip_prefix(self.repo_url.as_str())?
            .strip_prefix("/blob/")?;
        let (_reference, path) = rest.split_once('/')?;
        let path = path.split(['#', '?']).next().unwrap_or(path);
        if path.is_empty() {
            None
        } else {
            Some(path)
        }
    }
}
