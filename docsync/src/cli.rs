//! Command-line interface for docsync.
//!
//! All pipeline logic lives in `docsync-core`; this module parses arguments,
//! builds the HTTP collaborators and wires them into the core entrypoints.
//!
//! - `sync`: fetch, transform and write every catalog document
//! - `overview`: print the generated components overview page
//! - `release-sync`: refresh the catalog's release snapshot from GitHub

use crate::load_config::load_config;
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use docsync_core::catalog::{jobs_from_catalog, Catalog};
use docsync_core::fetch::HttpFetcher;
use docsync_core::internal_links::InternalLinkMapper;
use docsync_core::provenance::ProvenanceAnnotator;
use docsync_core::release::{
    GithubReleaseClient, ReleaseProvider, SnapshotReleaseProvider, GITHUB_API_URL,
};
use docsync_core::release_sync::{apply_release, extract_components, render_catalog};
use docsync_core::synchronise::{
    overview_page_from_catalog, resolve_release, run_sync, write_documents, Renderer,
    SyncContext, SyncMode,
};
use docsync_core::transform::ContentTransformer;
use std::path::PathBuf;

#[derive(Parser)]
#[clap(
    name = "docsync",
    version,
    about = "Sync documentation from external repositories into the site docs tree"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch, transform and write every document in the catalog
    Sync {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Override the failure policy from the config file
        #[clap(long, value_enum)]
        mode: Option<ModeArg>,
        /// Render everything but write nothing
        #[clap(long)]
        dry_run: bool,
    },
    /// Print the generated components overview page
    Overview {
        #[clap(long)]
        catalog: PathBuf,
    },
    /// Refresh the catalog's release snapshot from the latest GitHub release
    ReleaseSync {
        #[clap(long)]
        catalog: PathBuf,
        /// Print the updated catalog instead of writing it
        #[clap(long)]
        dry_run: bool,
        #[clap(long, default_value = GITHUB_API_URL)]
        github_api_url: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Live,
    Snapshot,
}

impl From<ModeArg> for SyncMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Live => SyncMode::Live,
            ModeArg::Snapshot => SyncMode::Snapshot,
        }
    }
}

/// Async entrypoint shared by `main` and the integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync {
            config,
            mode,
            dry_run,
        } => sync(config, mode.map(SyncMode::from), dry_run).await,
        Commands::Overview { catalog } => {
            let catalog = Catalog::load(&catalog)?;
            let page = overview_page_from_catalog(&catalog, &catalog.release);
            print!("{}", page.content);
            Ok(())
        }
        Commands::ReleaseSync {
            catalog,
            dry_run,
            github_api_url,
        } => release_sync(catalog, dry_run, &github_api_url).await,
    }
}

async fn sync(config_path: PathBuf, mode: Option<SyncMode>, dry_run: bool) -> Result<()> {
    let config = load_config(&config_path)?;
    let mode = mode.unwrap_or(config.mode);
    let catalog = Catalog::load(&config.catalog)
        .with_context(|| format!("loading catalog {}", config.catalog.display()))?;
    tracing::info!(command = "sync", mode = ?mode, dry_run, "Starting synchronisation process");

    let umbrella = &catalog.umbrella;
    let provider: Box<dyn ReleaseProvider> = match mode {
        SyncMode::Live => Box::new(GithubReleaseClient::new(
            &config.github_api_url,
            &umbrella.org,
            &umbrella.name,
        )?),
        SyncMode::Snapshot => Box::new(SnapshotReleaseProvider::new(catalog.release.clone())),
    };
    let release = resolve_release(provider.as_ref())
        .await
        .context("resolving umbrella release metadata")?;

    let jobs = jobs_from_catalog(&catalog, &release)?;
    let transformer = ContentTransformer::with_retired_dev_branch(
        link_mapper(&catalog),
        &umbrella.repo_url(),
        &umbrella.default_branch,
    );
    let annotator = ProvenanceAnnotator::new(umbrella.clone(), umbrella.default_branch.clone());
    let fetcher = HttpFetcher::new()?;
    let renderer = Renderer {
        transformer: &transformer,
        annotator: &annotator,
        catalog: &catalog,
        release: &release,
    };
    let mut ctx = SyncContext::new(&fetcher, renderer, mode);
    ctx.raw_base_url = &config.raw_base_url;

    let report = match run_sync(&jobs, &ctx).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(command = "sync", error = %e, "Synchronisation failed");
            return Err(e.into());
        }
    };
    for skipped in &report.skipped {
        tracing::warn!(
            output = %skipped.output,
            url = %skipped.url,
            repo = %skipped.repo,
            reference = %skipped.reference,
            reason = %skipped.reason,
            "Kept previous output for skipped document"
        );
    }

    if dry_run {
        for doc in &report.documents {
            println!("{} ({} bytes)", doc.relative_path().display(), doc.content.len());
        }
    } else {
        write_documents(&config.output_root, &report.documents).await?;
    }
    println!(
        "Synchronised {} documents, skipped {}",
        report.documents.len(),
        report.skipped.len()
    );
    Ok(())
}

/// The built-in guide table when the catalog describes its project, extended
/// by the catalog's own `internal_links`.
fn link_mapper(catalog: &Catalog) -> InternalLinkMapper {
    let umbrella_url = catalog.umbrella.repo_url();
    let mut mapper = InternalLinkMapper::llm_d_guides();
    if mapper.repo_url() != umbrella_url {
        mapper = InternalLinkMapper::new(umbrella_url, Vec::<(String, String)>::new());
    }
    mapper.extend(catalog.internal_links.clone());
    mapper
}

async fn release_sync(catalog_path: PathBuf, dry_run: bool, github_api_url: &str) -> Result<()> {
    let mut catalog = Catalog::load(&catalog_path)?;
    let client = GithubReleaseClient::new(
        github_api_url,
        &catalog.umbrella.org,
        &catalog.umbrella.name,
    )?;
    let release = client
        .latest()
        .await
        .context("fetching latest umbrella release")?;
    tracing::info!(
        version = %release.info.version,
        name = %release.info.release_name,
        published = ?release.published_at,
        url = %release.info.release_url,
        "Latest release fetched"
    );

    let components = extract_components(&release.body, &catalog.umbrella.org);
    if components.is_empty() {
        tracing::warn!("No components found in release notes");
    }
    let summary = apply_release(&mut catalog, &release.info, &components);
    let rendered = render_catalog(&catalog, &release.info.release_url, Utc::now())?;

    if dry_run {
        print!("{rendered}");
    } else {
        std::fs::write(&catalog_path, &rendered)
            .with_context(|| format!("writing catalog {}", catalog_path.display()))?;
    }
    println!(
        "Release {}: {} components updated, {} not in catalog",
        summary.version,
        summary.updated.len(),
        summary.unknown.len()
    );
    Ok(())
}
