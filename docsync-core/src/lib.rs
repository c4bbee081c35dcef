#![doc = "docsync-core: pipeline library for docsync."]

//! Syncs Markdown documents from external repositories into a documentation
//! site: every catalog entry is fetched, rewritten so its links and markup work
//! inside the site, wrapped in frontmatter and a provenance banner, and written
//! to the docs tree.
//!
//! # Layout
//! - [`catalog`]: the declarative source list and the jobs derived from it
//! - [`fetch`] and [`release`]: the network collaborators, behind mockable traits
//! - [`transform`], [`path_resolver`], [`internal_links`]: the pure rewrite pipeline
//! - [`provenance`]: frontmatter and source banners
//! - [`synchronise`]: orchestration and file emission
//! - [`release_sync`]: refreshing the catalog's release snapshot
//! - [`analytics`]: page-view de-duplication for client-side navigation

pub mod analytics;
pub mod catalog;
pub mod fetch;
pub mod internal_links;
pub mod path_resolver;
pub mod provenance;
pub mod release;
pub mod release_sync;
pub mod synchronise;
pub mod transform;
