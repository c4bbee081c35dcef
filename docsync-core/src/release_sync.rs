//! Refreshes the catalog's release snapshot from the umbrella release notes.

use crate::catalog::{Catalog, CatalogError};
use crate::release::ReleaseInfo;
use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{info, warn};

static DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[-*]\s*\*\*Description\*\*:?\s*(.+?)\r?\n").unwrap()
});
static DIFF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[-*]\s*\*\*Diff\*\*:?\s*\[?([^\]\r\n]+)").unwrap());
static DIFF_VERSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"→\s*(v[\d.]+)").unwrap());

/// A component section found in release notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseComponent {
    /// `org/name` as written in the section header.
    pub full_name: String,
    pub org: String,
    pub name: String,
    pub description: String,
    pub version: Option<String>,
    pub diff: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseSyncSummary {
    pub version: String,
    pub updated: Vec<String>,
    /// Components named in the notes but absent from the catalog.
    pub unknown: Vec<String>,
}

/// Reads `## <org>/<name>` (or `## <org>-incubation/<name>`) sections.
///
/// Sections without a `**Description**` bullet are skipped.
pub fn extract_components(release_body: &str, umbrella_org: &str) -> Vec<ReleaseComponent> {
    let header = match Regex::new(&format!(
        r"^## [^\n]*?({}(?:-incubation)?)/(\S+)",
        regex::escape(umbrella_org)
    )) {
        Ok(re) => re,
        Err(e) => {
            warn!(org = %umbrella_org, error = %e, "Cannot build release header pattern");
            return Vec::new();
        }
    };

    split_sections(release_body)
        .into_iter()
        .filter_map(|section| {
            let caps = header.captures(&section)?;
            let org = caps[1].to_string();
            let name = caps[2].to_string();
            let description = DESCRIPTION.captures(&section)?[1].trim().to_string();
            let diff = DIFF.captures(&section).map(|c| c[1].trim().to_string());
            let version = diff.as_deref().and_then(|d| {
                DIFF_VERSION
                    .captures(d)
                    .map(|c| c[1].trim_end_matches('.').to_string())
            });
            Some(ReleaseComponent {
                full_name: format!("{org}/{name}"),
                org,
                name,
                description,
                version,
                diff,
            })
        })
        .collect()
}

/// Sections start at each `## ` line; every section ends with a newline.
fn split_sections(body: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current = String::new();
    for line in body.lines() {
        if line.starts_with("## ") && !current.is_empty() {
            sections.push(std::mem::take(&mut current));
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.is_empty() {
        sections.push(current);
    }
    sections
}

/// Replaces the release snapshot and refreshes descriptions of known
/// components. Unknown components are reported, never added.
pub fn apply_release(
    catalog: &mut Catalog,
    release: &ReleaseInfo,
    components: &[ReleaseComponent],
) -> ReleaseSyncSummary {
    catalog.release = release.clone();
    let mut summary = ReleaseSyncSummary {
        version: release.version.clone(),
        ..Default::default()
    };
    for found in components {
        match catalog.components.iter_mut().find(|c| c.name == found.name) {
            Some(existing) => {
                info!(
                    component = %found.name,
                    version = ?found.version,
                    "Updating component description from release notes"
                );
                existing.description = found.description.clone();
                summary.updated.push(found.name.clone());
            }
            None => {
                warn!(
                    component = %found.full_name,
                    description = %found.description,
                    "Component found in release notes but not in catalog"
                );
                summary.unknown.push(found.full_name.clone());
            }
        }
    }
    summary
}

/// Serialises the catalog with a header naming where the snapshot came from.
pub fn render_catalog(
    catalog: &Catalog,
    source_url: &str,
    synced_at: DateTime<Utc>,
) -> Result<String, CatalogError> {
    let body = serde_yaml::to_string(catalog)?;
    Ok(format!(
        "# Repositories, documents and release snapshot synced into the site.\n\
         # Refresh with `docsync release-sync` when a new release ships.\n\
         #\n\
         # Last synced from: {source_url}\n\
         # Sync date: {}\n\n{body}",
        synced_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    ))
}
