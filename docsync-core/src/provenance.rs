//! Frontmatter and "Content Source" banners for synced documents.
//!
//! The banner wording depends on whether a document was synced from a release
//! tag or from a moving branch. Release links are only emitted when the
//! reference itself is a version tag.

use crate::catalog::UmbrellaRepo;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static VERSION_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9_.-]+-)?v\d+\.\d+(?:\.\d+)?(?:[-+][0-9A-Za-z.-]+)?$").unwrap()
});

const BRANCH_NAMES: &[&str] = &["main", "master", "develop", "dev"];

/// Whether `reference` names a release tag rather than a branch.
///
/// ```
/// use docsync_core::provenance::is_version_tag;
/// assert!(is_version_tag("v0.3.0"));
/// assert!(is_version_tag("llm-d-modelservice-v0.2.10"));
/// assert!(!is_version_tag("main"));
/// ```
pub fn is_version_tag(reference: &str) -> bool {
    !BRANCH_NAMES.contains(&reference) && VERSION_TAG.is_match(reference)
}

/// Escapes a value for a double-quoted YAML scalar.
pub fn escape_front_matter(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Where the banner goes relative to the transformed body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BannerPlacement {
    #[default]
    Top,
    Bottom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frontmatter {
    pub title: String,
    pub description: String,
    pub sidebar_label: String,
    pub sidebar_position: u32,
}

impl Frontmatter {
    pub fn render(&self) -> String {
        format!(
            "---\ntitle: \"{}\"\ndescription: \"{}\"\nsidebar_label: \"{}\"\nsidebar_position: {}\n---\n\n",
            escape_front_matter(&self.title),
            escape_front_matter(&self.description),
            escape_front_matter(&self.sidebar_label),
            self.sidebar_position
        )
    }
}

/// Joins frontmatter, banner and body into the final document text.
pub fn assemble(frontmatter: &Frontmatter, banner: &str, body: &str, placement: BannerPlacement) -> String {
    let head = frontmatter.render();
    match placement {
        BannerPlacement::Top => format!("{head}{banner}{body}"),
        BannerPlacement::Bottom => {
            let sep = if body.ends_with('\n') { "\n" } else { "\n\n" };
            format!("{head}{body}{sep}{banner}")
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProvenanceAnnotator {
    umbrella: UmbrellaRepo,
    default_branch: String,
}

impl ProvenanceAnnotator {
    pub fn new(umbrella: UmbrellaRepo, default_branch: impl Into<String>) -> Self {
        Self {
            umbrella,
            default_branch: default_branch.into(),
        }
    }

    pub fn umbrella(&self) -> &UmbrellaRepo {
        &self.umbrella
    }

    /// Builds the `:::info Content Source` admonition for one synced file.
    pub fn build_banner(
        &self,
        filename: &str,
        repo_url: &str,
        reference: &str,
        main_release: Option<&str>,
    ) -> String {
        let repo_url = repo_url.trim_end_matches('/');
        let repo_name = short_repo_name(repo_url);
        let file_url = format!("{repo_url}/blob/{reference}/{filename}");
        let current_url = format!("{repo_url}/blob/{}/{filename}", self.default_branch);
        let issues_url = format!("{repo_url}/issues");

        let body = if !is_version_tag(reference) {
            let edit_url = format!("{repo_url}/edit/{reference}/{filename}");
            format!(
                "This content is automatically synced from [{filename}]({file_url}) in the {repo_name} repository.\n\n\
                 📝 To suggest changes, please [edit the source file]({edit_url}) or [create an issue]({issues_url})."
            )
        } else {
            let tag_url = format!("{repo_url}/releases/tag/{reference}");
            match main_release {
                Some(release) => {
                    let release_url =
                        format!("{}/releases/tag/{release}", self.umbrella.repo_url());
                    format!(
                        "This content is synced from [{filename}]({file_url}) in the {repo_name} repository \
                         at version [{reference}]({tag_url}), which ships with {} release [{release}]({release_url}).\n\n\
                         📝 For the most current version, see [{filename} on {}]({current_url}). \
                         To suggest changes, please [create an issue]({issues_url}).",
                        self.umbrella.name, self.default_branch
                    )
                }
                None => format!(
                    "This content reflects the latest public release of {}, synced from \
                     [{filename}]({file_url}) in the {repo_name} repository at [{reference}]({tag_url}).\n\n\
                     📝 For the most current version, see [{filename} on {}]({current_url}). \
                     To suggest changes, please [create an issue]({issues_url}).",
                    self.umbrella.name, self.default_branch
                ),
            }
        };
        format!(":::info Content Source\n{body}\n:::\n\n")
    }
}

/// `org/name` part of a repository URL.
fn short_repo_name(repo_url: &str) -> String {
    let parts: Vec<&str> = repo_url.rsplitn(3, '/').collect();
    match parts.as_slice() {
        [name, org, _] => format!("{org}/{name}"),
        _ => repo_url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotator() -> ProvenanceAnnotator {
        ProvenanceAnnotator::new(
            UmbrellaRepo {
                org: "llm-d".into(),
                name: "llm-d".into(),
                default_branch: "main".into(),
            },
            "main",
        )
    }

    const REPO: &str = "https://github.com/llm-d/llm-d-inference-scheduler";

    #[test]
    fn version_tags_are_detected() {
        for tag in ["v0.3.0", "v1.2", "llm-d-modelservice-v0.2.10", "v0.4.0-rc.1", "chart-v1.0.0+build.5"] {
            assert!(is_version_tag(tag), "{tag}");
        }
        for branch in ["main", "master", "develop", "dev", "release-1.0", "feature/v2", "v1"] {
            assert!(!is_version_tag(branch), "{branch}");
        }
    }

    #[test]
    fn branch_banner_links_edit_page() {
        let banner = annotator().build_banner("README.md", REPO, "main", Some("v0.3.0"));
        assert!(banner.starts_with(":::info Content Source\n"));
        assert!(banner.contains("[README.md](https://github.com/llm-d/llm-d-inference-scheduler/blob/main/README.md)"));
        assert!(banner.contains("llm-d/llm-d-inference-scheduler repository"));
        assert!(banner.contains("(https://github.com/llm-d/llm-d-inference-scheduler/edit/main/README.md)"));
        assert!(banner.contains("(https://github.com/llm-d/llm-d-inference-scheduler/issues)"));
        assert!(!banner.contains("/releases/"));
        assert!(banner.ends_with(":::\n\n"));
    }

    #[test]
    fn tagged_banner_names_component_and_umbrella_release() {
        let banner = annotator().build_banner("README.md", REPO, "v0.2.1", Some("v0.3.0"));
        assert!(banner.contains("/blob/v0.2.1/README.md"));
        assert!(banner.contains("[v0.2.1](https://github.com/llm-d/llm-d-inference-scheduler/releases/tag/v0.2.1)"));
        assert!(banner.contains("[v0.3.0](https://github.com/llm-d/llm-d/releases/tag/v0.3.0)"));
        assert!(banner.contains("/blob/main/README.md"));
        assert!(banner.contains("/issues)"));
        assert!(!banner.contains("/edit/"));
    }

    #[test]
    fn tagged_banner_without_umbrella_release() {
        let banner = annotator().build_banner("README.md", REPO, "v0.2.1", None);
        assert!(banner.contains("the latest public release of llm-d"));
        assert!(banner.contains("/blob/v0.2.1/README.md"));
        assert!(banner.contains("/blob/main/README.md"));
        assert!(!banner.contains("https://github.com/llm-d/llm-d/releases"));
    }

    #[test]
    fn description_is_escaped_backslashes_first() {
        assert_eq!(escape_front_matter(r#"a "b" \c"#), r#"a \"b\" \\c"#);
        let fm = Frontmatter {
            title: "Quickstart".into(),
            description: "Say \"hi\"".into(),
            sidebar_label: "Quickstart".into(),
            sidebar_position: 2,
        };
        assert_eq!(
            fm.render(),
            "---\ntitle: \"Quickstart\"\ndescription: \"Say \\\"hi\\\"\"\nsidebar_label: \"Quickstart\"\nsidebar_position: 2\n---\n\n"
        );
    }

    #[test]
    fn frontmatter_with_yaml_syntax_in_labels_parses() {
        let fm = Frontmatter {
            title: "Step 1: \"Install\"".into(),
            description: "C:\\models".into(),
            sidebar_label: "#1 Setup".into(),
            sidebar_position: 4,
        };
        let rendered = fm.render();
        let block = rendered
            .strip_prefix("---\n")
            .and_then(|r| r.strip_suffix("---\n\n"))
            .unwrap();
        let parsed: serde_yaml::Mapping = serde_yaml::from_str(block).unwrap();
        let field = |key: &str| parsed.get(key).and_then(|v| v.as_str()).unwrap().to_string();
        assert_eq!(field("title"), "Step 1: \"Install\"");
        assert_eq!(field("description"), "C:\\models");
        assert_eq!(field("sidebar_label"), "#1 Setup");
    }

    #[test]
    fn placement_orders_banner_and_body() {
        let fm = Frontmatter {
            title: "T".into(),
            description: "D".into(),
            sidebar_label: "T".into(),
            sidebar_position: 1,
        };
        let top = assemble(&fm, "BANNER\n\n", "body\n", BannerPlacement::Top);
        assert!(top.ends_with("---\n\nBANNER\n\nbody\n"));
        let bottom = assemble(&fm, "BANNER\n\n", "body\n", BannerPlacement::Bottom);
        assert!(bottom.ends_with("---\n\nbody\n\nBANNER\n\n"));
    }
}
