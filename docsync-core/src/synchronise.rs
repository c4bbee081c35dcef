//! High-level pipeline: fetch → transform → annotate for every catalog job.
//!
//! [`run_sync`] drives all [`DocumentJob`]s concurrently. Each job is
//! independent: it fetches its own document, runs it through the
//! [`ContentTransformer`], wraps it in frontmatter and a provenance banner and
//! yields a [`RenderedDocument`]. Synthetic jobs skip the fetch and render
//! from the catalog instead.
//!
//! # Failure policy
//! - A fetched filename that differs from the job's source path is a
//!   configuration error in every mode.
//! - In [`SyncMode::Live`] any fetch failure aborts the run.
//! - In [`SyncMode::Snapshot`] a failed fetch is logged with its URL,
//!   repository and ref, and the job is reported as skipped; its previous
//!   output file is left as it was.
//!
//! Writing is a separate step ([`write_documents`]) so a dry run can render
//! without touching the output tree.

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::catalog::{
    Catalog, CatalogError, DocumentJob, JobKind, SyntheticPage, COMPONENTS_DIR, LATEST_RELEASE_DIR,
    LATEST_RELEASE_FILENAME, OVERVIEW_FILENAME, RAW_BASE_URL,
};
use crate::fetch::{FetchError, Fetcher};
use crate::provenance::{assemble, Frontmatter, ProvenanceAnnotator};
use crate::release::{ReleaseError, ReleaseInfo, ReleaseProvider};
use crate::transform::{ContentTransformer, TransformContext};

/// How upstream failures are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Live release metadata; any fetch failure fails the build.
    Live,
    /// Catalog snapshot release metadata; fetch failures skip the job.
    #[default]
    Snapshot,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("release metadata unavailable: {0}")]
    Release(#[from] ReleaseError),
    #[error("job {output} expects '{expected}' but the fetch host delivered '{actual}'")]
    FilenameMismatch {
        output: String,
        expected: String,
        actual: String,
    },
    #[error("failed to fetch {url} ({repo}@{reference}): {source}")]
    Fetch {
        url: String,
        repo: String,
        reference: String,
        #[source]
        source: FetchError,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Final output artifact, relative to the docs root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub out_dir: String,
    pub filename: String,
    pub content: String,
}

impl RenderedDocument {
    pub fn relative_path(&self) -> PathBuf {
        Path::new(&self.out_dir).join(&self.filename)
    }
}

/// A job whose fetch failed in snapshot mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedJob {
    pub output: String,
    pub url: String,
    pub repo: String,
    pub reference: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub documents: Vec<RenderedDocument>,
    pub skipped: Vec<SkippedJob>,
}

/// Everything needed to turn fetched text into a [`RenderedDocument`].
#[derive(Debug, Clone, Copy)]
pub struct Renderer<'a> {
    pub transformer: &'a ContentTransformer,
    pub annotator: &'a ProvenanceAnnotator,
    pub catalog: &'a Catalog,
    pub release: &'a ReleaseInfo,
}

impl Renderer<'_> {
    /// Content callback handed to the fetch host.
    ///
    /// Returns `None` when `filename` is not this job's document. Synthetic
    /// jobs ignore their input and always render.
    pub fn modify_content(
        &self,
        job: &DocumentJob,
        filename: &str,
        content: &str,
    ) -> Option<RenderedDocument> {
        if let JobKind::Synthetic(page) = job.kind {
            let mut doc = match page {
                SyntheticPage::ComponentsOverview => {
                    overview_page_from_catalog(self.catalog, self.release)
                }
                SyntheticPage::LatestRelease => latest_release_page(self.catalog, self.release),
            };
            doc.out_dir = job.out_dir.clone();
            doc.filename = job.output_filename.clone();
            return Some(doc);
        }
        if filename != job.source_path {
            return None;
        }

        let repo_url = job.repo_url();
        let ctx = TransformContext::new(&repo_url, &job.reference, &job.source_path);
        let body = self.transformer.transform(content, &ctx);
        let body = match &job.custom_transform {
            Some(hook) => hook(&body),
            None => body,
        };
        let banner = self.annotator.build_banner(
            &job.source_path,
            &repo_url,
            &job.reference,
            job.main_release.as_deref(),
        );
        let frontmatter = Frontmatter {
            title: job.title.clone(),
            description: job.description.clone(),
            sidebar_label: job.sidebar_label.clone(),
            sidebar_position: job.sidebar_position,
        };
        Some(RenderedDocument {
            out_dir: job.out_dir.clone(),
            filename: job.output_filename.clone(),
            content: assemble(&frontmatter, &banner, &body, job.placement),
        })
    }
}

pub struct SyncContext<'a, F: Fetcher> {
    pub fetcher: &'a F,
    pub renderer: Renderer<'a>,
    pub mode: SyncMode,
    /// Raw-content host, e.g. `https://raw.githubusercontent.com`.
    pub raw_base_url: &'a str,
}

impl<'a, F: Fetcher> SyncContext<'a, F> {
    pub fn new(fetcher: &'a F, renderer: Renderer<'a>, mode: SyncMode) -> Self {
        Self {
            fetcher,
            renderer,
            mode,
            raw_base_url: RAW_BASE_URL,
        }
    }
}

/// Release metadata for the run; a provider failure is fatal.
pub async fn resolve_release<P>(provider: &P) -> Result<ReleaseInfo, SyncError>
where
    P: ReleaseProvider + ?Sized,
{
    match provider.latest_release().await {
        Ok(release) => {
            info!(version = %release.version, url = %release.release_url, "[SYNC] Release metadata resolved");
            Ok(release)
        }
        Err(e) => {
            error!(error = %e, "[SYNC][ERROR] Release metadata unavailable");
            Err(e.into())
        }
    }
}

enum JobOutcome {
    Rendered(RenderedDocument),
    Skipped(SkippedJob),
}

/// Runs every job concurrently and collects the rendered documents.
pub async fn run_sync<F>(jobs: &[DocumentJob], ctx: &SyncContext<'_, F>) -> Result<SyncReport, SyncError>
where
    F: Fetcher + Sync,
{
    info!(jobs = jobs.len(), mode = ?ctx.mode, release = %ctx.renderer.release.version, "[SYNC] Starting document synchronisation");

    let outcomes = try_join_all(jobs.iter().map(|job| process_job(job, ctx))).await?;

    let mut report = SyncReport::default();
    for outcome in outcomes {
        match outcome {
            JobOutcome::Rendered(doc) => report.documents.push(doc),
            JobOutcome::Skipped(skip) => report.skipped.push(skip),
        }
    }
    info!(
        rendered = report.documents.len(),
        skipped = report.skipped.len(),
        "[SYNC] Synchronisation finished"
    );
    Ok(report)
}

async fn process_job<F>(job: &DocumentJob, ctx: &SyncContext<'_, F>) -> Result<JobOutcome, SyncError>
where
    F: Fetcher + Sync,
{
    let output = job.output_path();
    if job.is_synthetic() {
        debug!(output = %output, "[SYNC] Rendering synthetic page");
        return ctx
            .renderer
            .modify_content(job, "", "")
            .map(JobOutcome::Rendered)
            .ok_or_else(|| mismatch(job, ""));
    }

    let base_url = job.repo.source_base_url_on(ctx.raw_base_url, &job.reference);
    info!(repo = %job.repo.name, reference = %job.reference, source = %job.source_path, "[SYNC] Fetching document");
    let fetched = match ctx.fetcher.fetch(&base_url, &job.source_path).await {
        Ok(doc) => doc,
        Err(e) => {
            let url = e.url();
            return match ctx.mode {
                SyncMode::Live => {
                    error!(url = %url, repo = %job.repo.name, reference = %job.reference, error = %e, "[SYNC][ERROR] Fetch failed");
                    Err(SyncError::Fetch {
                        url,
                        repo: job.repo.name.clone(),
                        reference: job.reference.clone(),
                        source: e,
                    })
                }
                SyncMode::Snapshot => {
                    warn!(url = %url, repo = %job.repo.name, reference = %job.reference, error = %e, output = %output, "[SYNC] Fetch failed, keeping previous output");
                    Ok(JobOutcome::Skipped(SkippedJob {
                        output,
                        url,
                        repo: job.repo.name.clone(),
                        reference: job.reference.clone(),
                        reason: e.to_string(),
                    }))
                }
            };
        }
    };

    match ctx
        .renderer
        .modify_content(job, &fetched.filename, &fetched.content)
    {
        Some(doc) => {
            info!(output = %output, bytes = doc.content.len(), "[SYNC] Rendered document");
            Ok(JobOutcome::Rendered(doc))
        }
        None => {
            error!(output = %output, expected = %job.source_path, actual = %fetched.filename, "[SYNC][ERROR] Fetched filename does not match job");
            Err(mismatch(job, &fetched.filename))
        }
    }
}

fn mismatch(job: &DocumentJob, actual: &str) -> SyncError {
    SyncError::FilenameMismatch {
        output: job.output_path(),
        expected: job.source_path.clone(),
        actual: actual.to_string(),
    }
}

/// Components table ordered by sidebar position.
pub fn overview_page_from_catalog(catalog: &Catalog, release: &ReleaseInfo) -> RenderedDocument {
    let umbrella = &catalog.umbrella;
    let umbrella_url = umbrella.repo_url();
    let frontmatter = Frontmatter {
        title: format!("{} Components", umbrella.name),
        description: format!(
            "Overview of all {} ecosystem components and their documentation",
            umbrella.name
        ),
        sidebar_label: "Components".to_string(),
        sidebar_position: 1,
    };

    let mut content = frontmatter.render();
    content.push_str(&format!(
        "# {name} components\n\n\
         The {name} ecosystem consists of multiple interconnected components that work together to provide distributed inference capabilities for large language models.\n\n\
         ## Latest Release: [{version}]({url})\n\n\
         **Released**: {date}\n\n\
         ## Components\n\n\
         | Component | Description | Repository | Version | Documentation |\n\
         |-----------|-------------|------------|---------|---------------|\n",
        name = umbrella.name,
        version = release.version,
        url = release.release_url,
        date = release.release_date_formatted,
    ));

    for component in catalog.components_by_position() {
        let repo_url = component.repo_url();
        let version = component.version.as_deref().unwrap_or("latest");
        content.push_str(&format!(
            "| **[{label}]({repo_url})** | {description} | [{org}/{name}]({repo_url}) | [{version}]({repo_url}/releases/tag/{version}) | [View Docs](./Components/{clean}) |\n",
            label = component.display_label(),
            description = component.description,
            org = component.org,
            name = component.name,
            clean = component.clean_name(),
        ));
    }

    content.push_str(&format!(
        "\n## Getting Started\n\n\
         Each component has its own detailed documentation page accessible from the links above.\n\n\
         ### Quick Links\n\n\
         - [Main {name} Repository]({umbrella_url}) - Core platform and orchestration\n\
         - [Latest Release]({release_url}) - {release_name}\n\
         - [All Releases]({umbrella_url}/releases) - Complete release history\n\n\
         ## Contributing\n\n\
         To contribute to any of these components, visit their respective repositories and follow their contribution guidelines.\n",
        name = umbrella.name,
        release_url = release.release_url,
        release_name = release.release_name,
    ));

    RenderedDocument {
        out_dir: COMPONENTS_DIR.to_string(),
        filename: OVERVIEW_FILENAME.to_string(),
        content,
    }
}

/// Release summary page with the component versions it ships.
pub fn latest_release_page(catalog: &Catalog, release: &ReleaseInfo) -> RenderedDocument {
    let umbrella = &catalog.umbrella;
    let frontmatter = Frontmatter {
        title: "Latest Release".to_string(),
        description: format!("{} {} release information", umbrella.name, release.version),
        sidebar_label: "Latest Release".to_string(),
        sidebar_position: 2,
    };

    let mut content = frontmatter.render();
    content.push_str(&format!(
        "# {release_name}\n\n\
         **Version**: [{version}]({url})\n\n\
         **Released**: {date}\n\n\
         ## Component versions\n\n\
         | Component | Version |\n\
         |-----------|---------|\n",
        release_name = release.release_name,
        version = release.version,
        url = release.release_url,
        date = release.release_date_formatted,
    ));
    for component in catalog.components_by_position() {
        let repo_url = component.repo_url();
        let version = match &component.version {
            Some(v) => format!("[{v}]({repo_url}/releases/tag/{v})"),
            None => format!("`{}`", component.branch),
        };
        content.push_str(&format!(
            "| [{}]({repo_url}) | {version} |\n",
            component.display_label()
        ));
    }
    content.push_str(&format!(
        "\nFor previous versions, see the [GitHub Releases page]({}/releases).\n",
        umbrella.repo_url()
    ));

    RenderedDocument {
        out_dir: LATEST_RELEASE_DIR.to_string(),
        filename: LATEST_RELEASE_FILENAME.to_string(),
        content,
    }
}

/// Writes each document under `root`, replacing any previous file in full.
pub async fn write_documents(root: &Path, docs: &[RenderedDocument]) -> Result<Vec<PathBuf>, SyncError> {
    let mut written = Vec::with_capacity(docs.len());
    for doc in docs {
        let path = root.join(doc.relative_path());
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| SyncError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(&path, &doc.content)
            .await
            .map_err(|source| {
                error!(path = %path.display(), error = %source, "[SYNC][ERROR] Write failed");
                SyncError::Write {
                    path: path.clone(),
                    source,
                }
            })?;
        debug!(path = %path.display(), "[SYNC] Wrote document");
        written.push(path);
    }
    info!(count = written.len(), root = %root.display(), "[SYNC] Documents written");
    Ok(written)
}
