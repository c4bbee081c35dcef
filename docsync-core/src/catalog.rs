//! Declarative registry of the repositories and documents synced into the site.
//!
//! The catalog is plain YAML data. [`jobs_from_catalog`] derives the full list
//! of [`DocumentJob`]s from it without touching the network, so the same data
//! drives both fetching and the generated overview pages.

use crate::provenance::BannerPlacement;
use crate::release::ReleaseInfo;
use crate::transform::{insert_before_first_heading, ContentHook};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info};

pub const GITHUB_URL: &str = "https://github.com";
pub const RAW_BASE_URL: &str = "https://raw.githubusercontent.com";
pub const COMPONENTS_DIR: &str = "architecture/Components";
pub const OVERVIEW_FILENAME: &str = "index.md";
pub const LATEST_RELEASE_DIR: &str = "architecture";
pub const LATEST_RELEASE_FILENAME: &str = "latest-release.md";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("repository name '{0}' is declared more than once")]
    DuplicateName(String),
    #[error("output '{0}' is produced by more than one document")]
    DuplicateOutput(String),
    #[error("no repository named '{0}' in catalog")]
    UnknownRepo(String),
}

/// The project's main repository, whose releases version the whole site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UmbrellaRepo {
    pub org: String,
    pub name: String,
    #[serde(default = "default_branch")]
    pub default_branch: String,
}

impl UmbrellaRepo {
    pub fn repo_url(&self) -> String {
        format!("{GITHUB_URL}/{}/{}", self.org, self.name)
    }
}

fn default_branch() -> String {
    "main".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRepoConfig {
    pub name: String,
    pub org: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Release tag to sync from instead of `branch`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sidebar_position: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sidebar_label: Option<String>,
}

impl SourceRepoConfig {
    /// The ref documents are fetched at: `version` when pinned, else `branch`.
    pub fn reference(&self) -> &str {
        self.version.as_deref().unwrap_or(&self.branch)
    }

    pub fn repo_url(&self) -> String {
        format!("{GITHUB_URL}/{}/{}", self.org, self.name)
    }

    pub fn source_base_url(&self) -> String {
        self.source_base_url_on(RAW_BASE_URL, self.reference())
    }

    /// Raw-content base URL for `reference` on a given raw host.
    pub fn source_base_url_on(&self, raw_base_url: &str, reference: &str) -> String {
        format!(
            "{}/{}/{}/{}/",
            raw_base_url.trim_end_matches('/'),
            self.org,
            self.name,
            reference
        )
    }

    /// Name without the `llm-d-` prefix.
    pub fn clean_name(&self) -> &str {
        self.name.strip_prefix("llm-d-").unwrap_or(&self.name)
    }

    /// `sidebarLabel` when set, else the title-cased clean name.
    pub fn display_label(&self) -> String {
        if let Some(label) = &self.sidebar_label {
            return label.clone();
        }
        self.clean_name()
            .split('-')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<String>>()
            .join(" ")
    }
}

/// Which ref a catalog document is fetched at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefPolicy {
    /// The repository's own reference (pinned version or branch).
    #[default]
    Repo,
    /// Always the repository branch, ignoring a pinned version.
    Branch,
    /// The umbrella release version resolved for the run.
    Release,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSpec {
    pub repo: String,
    pub source: String,
    pub out_dir: String,
    pub output: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sidebar_label: Option<String>,
    pub sidebar_position: u32,
    #[serde(default, rename = "ref")]
    pub reference: RefPolicy,
    #[serde(default)]
    pub banner: BannerPlacement,
    /// Site text inserted before the first top-level heading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intro: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub umbrella: UmbrellaRepo,
    pub release: ReleaseInfo,
    #[serde(default)]
    pub components: Vec<SourceRepoConfig>,
    #[serde(default)]
    pub repos: Vec<SourceRepoConfig>,
    #[serde(default)]
    pub documents: Vec<DocumentSpec>,
    /// Extra `file_path: local_route` entries for the internal link table.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub internal_links: BTreeMap<String, String>,
}

impl Catalog {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = serde_yaml::from_str(yaml)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        info!(path = %path.display(), "Loading catalog");
        let raw = std::fs::read_to_string(path).map_err(|source| {
            error!(path = %path.display(), error = %source, "Failed to read catalog");
            CatalogError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let catalog = Self::from_yaml_str(&raw)?;
        info!(
            components = catalog.components.len(),
            repos = catalog.repos.len(),
            documents = catalog.documents.len(),
            release = %catalog.release.version,
            "Catalog loaded"
        );
        Ok(catalog)
    }

    /// Repository and output names must be unique.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut names = HashSet::new();
        for repo in self.components.iter().chain(&self.repos) {
            if !names.insert(repo.name.as_str()) {
                return Err(CatalogError::DuplicateName(repo.name.clone()));
            }
        }
        let mut outputs = HashSet::new();
        let component_outputs = self
            .components
            .iter()
            .map(|c| format!("{COMPONENTS_DIR}/{}.md", c.clean_name()));
        let document_outputs = self
            .documents
            .iter()
            .map(|d| format!("{}/{}", d.out_dir.trim_end_matches('/'), d.output));
        for output in component_outputs.chain(document_outputs) {
            if !outputs.insert(output.clone()) {
                return Err(CatalogError::DuplicateOutput(output));
            }
        }
        Ok(())
    }

    /// Components first, then common repositories.
    pub fn find_repo(&self, name: &str) -> Option<&SourceRepoConfig> {
        self.components
            .iter()
            .chain(&self.repos)
            .find(|repo| repo.name == name)
    }

    /// Components ordered by sidebar position; unpositioned entries go last.
    pub fn components_by_position(&self) -> Vec<&SourceRepoConfig> {
        let mut sorted: Vec<_> = self.components.iter().collect();
        sorted.sort_by_key(|c| c.sidebar_position.unwrap_or(u32::MAX));
        sorted
    }
}

/// Pages generated from the catalog instead of fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticPage {
    ComponentsOverview,
    LatestRelease,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobKind {
    Fetched,
    Synthetic(SyntheticPage),
}

/// One fetch-transform-emit unit.
#[derive(Clone)]
pub struct DocumentJob {
    pub repo: SourceRepoConfig,
    pub reference: String,
    /// Repository path of the document; also the filename the fetcher reports.
    pub source_path: String,
    pub out_dir: String,
    pub output_filename: String,
    pub title: String,
    pub description: String,
    pub sidebar_label: String,
    pub sidebar_position: u32,
    pub placement: BannerPlacement,
    pub main_release: Option<String>,
    /// Applied after the standard transform; `None` is the identity.
    pub custom_transform: Option<ContentHook>,
    pub kind: JobKind,
}

impl fmt::Debug for DocumentJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentJob")
            .field("repo", &self.repo.name)
            .field("reference", &self.reference)
            .field("source_path", &self.source_path)
            .field("out_dir", &self.out_dir)
            .field("output_filename", &self.output_filename)
            .field("placement", &self.placement)
            .field("main_release", &self.main_release)
            .field("custom_transform", &self.custom_transform.is_some())
            .field("kind", &self.kind)
            .finish()
    }
}

impl DocumentJob {
    pub fn repo_url(&self) -> String {
        self.repo.repo_url()
    }

    pub fn output_path(&self) -> String {
        format!("{}/{}", self.out_dir.trim_end_matches('/'), self.output_filename)
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self.kind, JobKind::Synthetic(_))
    }
}

/// Derives every job the catalog describes.
///
/// Yields the synthetic pages first, then one job per component README, then
/// one per `documents` entry. `release` is the umbrella release resolved for
/// this run; it is named in component banners and is the ref of every
/// `ref: release` document, so both always agree.
pub fn jobs_from_catalog(
    catalog: &Catalog,
    release: &ReleaseInfo,
) -> Result<Vec<DocumentJob>, CatalogError> {
    let main_release = Some(release.version.as_str());
    catalog.validate()?;
    let umbrella = umbrella_repo_config(catalog);
    let mut jobs = vec![
        synthetic_job(
            &umbrella,
            SyntheticPage::ComponentsOverview,
            COMPONENTS_DIR,
            OVERVIEW_FILENAME,
            "Components",
        ),
        synthetic_job(
            &umbrella,
            SyntheticPage::LatestRelease,
            LATEST_RELEASE_DIR,
            LATEST_RELEASE_FILENAME,
            "Latest Release",
        ),
    ];

    for component in &catalog.components {
        let label = component.display_label();
        jobs.push(DocumentJob {
            repo: component.clone(),
            reference: component.reference().to_string(),
            source_path: "README.md".to_string(),
            out_dir: COMPONENTS_DIR.to_string(),
            output_filename: format!("{}.md", component.clean_name()),
            title: label.clone(),
            description: component.description.clone(),
            sidebar_label: label,
            sidebar_position: component.sidebar_position.unwrap_or_default(),
            placement: BannerPlacement::Top,
            main_release: main_release.map(str::to_string),
            custom_transform: None,
            kind: JobKind::Fetched,
        });
    }

    for doc in &catalog.documents {
        let repo = catalog.find_repo(&doc.repo).ok_or_else(|| {
            error!(repo = %doc.repo, source = %doc.source, "Document references unknown repository");
            CatalogError::UnknownRepo(doc.repo.clone())
        })?;
        let reference = match doc.reference {
            RefPolicy::Repo => repo.reference().to_string(),
            RefPolicy::Branch => repo.branch.clone(),
            RefPolicy::Release => release.version.clone(),
        };
        // The umbrella banner already names its own release.
        let main_release = if repo.name == catalog.umbrella.name {
            None
        } else {
            main_release.map(str::to_string)
        };
        jobs.push(DocumentJob {
            repo: repo.clone(),
            reference,
            source_path: doc.source.clone(),
            out_dir: doc.out_dir.clone(),
            output_filename: doc.output.clone(),
            title: doc.title.clone(),
            description: doc.description.clone(),
            sidebar_label: doc.sidebar_label.clone().unwrap_or_else(|| doc.title.clone()),
            sidebar_position: doc.sidebar_position,
            placement: doc.banner,
            main_release,
            custom_transform: doc
                .intro
                .as_deref()
                .map(|intro| insert_before_first_heading(intro)),
            kind: JobKind::Fetched,
        });
    }

    debug!(jobs = jobs.len(), "Derived jobs from catalog");
    Ok(jobs)
}

fn umbrella_repo_config(catalog: &Catalog) -> SourceRepoConfig {
    catalog
        .find_repo(&catalog.umbrella.name)
        .cloned()
        .unwrap_or_else(|| SourceRepoConfig {
            name: catalog.umbrella.name.clone(),
            org: catalog.umbrella.org.clone(),
            branch: catalog.umbrella.default_branch.clone(),
            version: None,
            description: String::new(),
            sidebar_position: None,
            sidebar_label: None,
        })
}

fn synthetic_job(
    umbrella: &SourceRepoConfig,
    page: SyntheticPage,
    out_dir: &str,
    filename: &str,
    title: &str,
) -> DocumentJob {
    DocumentJob {
        repo: umbrella.clone(),
        reference: umbrella.branch.clone(),
        source_path: String::new(),
        out_dir: out_dir.to_string(),
        output_filename: filename.to_string(),
        title: title.to_string(),
        description: String::new(),
        sidebar_label: title.to_string(),
        sidebar_position: 1,
        placement: BannerPlacement::Top,
        main_release: None,
        custom_transform: None,
        kind: JobKind::Synthetic(page),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
umbrella:
  org: llm-d
  name: llm-d
release:
  version: v0.3.0
  releaseDate: "2025-10-10"
  releaseDateFormatted: October 10, 2025
  releaseUrl: https://github.com/llm-d/llm-d/releases/tag/v0.3.0
  releaseName: llm-d v0.3.0
components:
  - name: llm-d-inference-scheduler
    org: llm-d
    branch: main
    version: v0.3.1
    description: Inference scheduler
    sidebarPosition: 2
  - name: llm-d-kv-cache-manager
    org: llm-d
    description: KV cache manager
    sidebarPosition: 1
    sidebarLabel: KV Cache
repos:
  - name: llm-d
    org: llm-d
    description: Main repository
  - name: llm-d-infra
    org: llm-d-incubation
    description: Infrastructure
documents:
  - repo: llm-d
    source: guides/QUICKSTART.md
    out_dir: guide/Installation
    output: quickstart.md
    title: QuickStart
    description: QuickStart guide for llm-d
    sidebar_position: 2
  - repo: llm-d-infra
    source: quickstart/infra-providers/gke/README.md
    out_dir: guide/InfraProviders
    output: gke.md
    title: GKE
    description: Google Kubernetes Engine
    sidebar_position: 1
    ref: release
    banner: bottom
    intro: "**Provider notes**"
"#;

    fn catalog() -> Catalog {
        Catalog::from_yaml_str(CATALOG).unwrap()
    }

    #[test]
    fn repo_urls_prefer_version() {
        let c = catalog();
        let scheduler = c.find_repo("llm-d-inference-scheduler").unwrap();
        assert_eq!(scheduler.reference(), "v0.3.1");
        assert_eq!(scheduler.repo_url(), "https://github.com/llm-d/llm-d-inference-scheduler");
        assert_eq!(
            scheduler.source_base_url(),
            "https://raw.githubusercontent.com/llm-d/llm-d-inference-scheduler/v0.3.1/"
        );
        let cache = c.find_repo("llm-d-kv-cache-manager").unwrap();
        assert_eq!(cache.reference(), "main");
    }

    #[test]
    fn labels_drop_prefix_and_title_case() {
        let c = catalog();
        let scheduler = c.find_repo("llm-d-inference-scheduler").unwrap();
        assert_eq!(scheduler.clean_name(), "inference-scheduler");
        assert_eq!(scheduler.display_label(), "Inference Scheduler");
        assert_eq!(c.find_repo("llm-d-kv-cache-manager").unwrap().display_label(), "KV Cache");
        assert_eq!(c.find_repo("llm-d").unwrap().clean_name(), "llm-d");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let yaml = CATALOG.replace("name: llm-d-infra", "name: llm-d-kv-cache-manager");
        let err = Catalog::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateName(name) if name == "llm-d-kv-cache-manager"));
    }

    #[test]
    fn duplicate_outputs_are_rejected() {
        let yaml = CATALOG.replace("output: gke.md", "output: quickstart.md").replace(
            "out_dir: guide/InfraProviders",
            "out_dir: guide/Installation",
        );
        let err = Catalog::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateOutput(o) if o == "guide/Installation/quickstart.md"));
    }

    #[test]
    fn unknown_document_repo_is_a_configuration_error() {
        let mut c = catalog();
        c.documents[0].repo = "llm-d-missing".into();
        let err = jobs_from_catalog(&c, &c.release).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownRepo(name) if name == "llm-d-missing"));
    }

    #[test]
    fn jobs_cover_components_documents_and_synthetic_pages() {
        let c = catalog();
        let jobs = jobs_from_catalog(&c, &c.release).unwrap();
        assert_eq!(jobs.len(), 2 + 2 + 2);
        assert_eq!(jobs[0].kind, JobKind::Synthetic(SyntheticPage::ComponentsOverview));
        assert_eq!(jobs[0].output_path(), "architecture/Components/index.md");
        assert_eq!(jobs[1].kind, JobKind::Synthetic(SyntheticPage::LatestRelease));

        let scheduler = &jobs[2];
        assert_eq!(scheduler.output_path(), "architecture/Components/inference-scheduler.md");
        assert_eq!(scheduler.reference, "v0.3.1");
        assert_eq!(scheduler.source_path, "README.md");
        assert_eq!(scheduler.title, "Inference Scheduler");
        assert_eq!(scheduler.main_release.as_deref(), Some("v0.3.0"));

        let quickstart = &jobs[4];
        assert_eq!(quickstart.reference, "main");
        assert_eq!(quickstart.sidebar_label, "QuickStart");
        assert_eq!(quickstart.main_release, None);
        assert!(quickstart.custom_transform.is_none());

        let gke = &jobs[5];
        assert_eq!(gke.reference, "v0.3.0");
        assert_eq!(gke.placement, BannerPlacement::Bottom);
        let hook = gke.custom_transform.as_ref().unwrap();
        assert_eq!(hook("# GKE\n"), "**Provider notes**\n\n# GKE\n");
    }

    #[test]
    fn release_documents_follow_the_resolved_release() {
        let c = catalog();
        let live = ReleaseInfo {
            version: "v0.4.0".into(),
            ..c.release.clone()
        };
        let jobs = jobs_from_catalog(&c, &live).unwrap();
        let gke = jobs.iter().find(|j| j.output_filename == "gke.md").unwrap();
        assert_eq!(gke.reference, "v0.4.0");
        let scheduler = &jobs[2];
        assert_eq!(scheduler.main_release.as_deref(), Some("v0.4.0"));
        assert_eq!(scheduler.reference, "v0.3.1");
    }

    #[test]
    fn components_sort_by_position() {
        let c = catalog();
        let names: Vec<_> = c.components_by_position().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["llm-d-kv-cache-manager", "llm-d-inference-scheduler"]);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Catalog::load(Path::new("/nonexistent/catalog.yaml")).unwrap_err();
        assert!(matches!(err, CatalogError::Read { .. }));
    }
}
