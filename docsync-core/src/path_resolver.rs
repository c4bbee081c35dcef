//! Resolution of relative paths found in synced documents into absolute
//! repository URLs.
//!
//! Links resolve to the `blob` view of the repository host, assets (images
//! and other raw files) resolve to the `raw` view. Callers are expected to
//! filter out absolute URLs, anchors and `mailto:` targets beforehand.

/// Directory portion of a repository file path (`a/b/README.md` -> `a/b`).
pub fn source_dir_of(source_path: &str) -> &str {
    match source_path.rfind('/') {
        Some(idx) => &source_path[..idx],
        None => "",
    }
}

/// Resolves a document link against `repo_url` at `reference`.
pub fn resolve(path: &str, source_dir: &str, repo_url: &str, reference: &str) -> String {
    format!(
        "{}/blob/{}/{}",
        repo_url,
        reference,
        resolve_repo_path(path, source_dir)
    )
}

/// Resolves an image or other raw asset against `repo_url` at `reference`.
pub fn resolve_asset(path: &str, source_dir: &str, repo_url: &str, reference: &str) -> String {
    format!(
        "{}/raw/{}/{}",
        repo_url,
        reference,
        resolve_repo_path(path, source_dir)
    )
}

/// Resolves `path` to a repository-root-relative path (no leading slash).
pub fn resolve_repo_path(path: &str, source_dir: &str) -> String {
    let clean = path.strip_prefix("./").unwrap_or(path);

    if let Some(root_relative) = clean.strip_prefix('/') {
        return root_relative.to_string();
    }

    if has_parent_traversal(clean) {
        let mut parts: Vec<&str> = source_dir.split('/').filter(|s| !s.is_empty()).collect();
        for segment in clean.split('/') {
            match segment {
                // Popping past the repository root clamps at the root.
                ".." => {
                    parts.pop();
                }
                "." | "" => {}
                other => parts.push(other),
            }
        }
        return parts.join("/");
    }

    if source_dir.is_empty() {
        clean.to_string()
    } else {
        format!("{}/{}", source_dir, clean)
    }
}

fn has_parent_traversal(path: &str) -> bool {
    path.split('/').any(|segment| segment == "..")
}

/// True for targets the resolver must never see: absolute and
/// protocol-relative URLs, in-page anchors, mail links and data URIs.
pub fn is_external_or_anchor(target: &str) -> bool {
    let lower = target.trim_start().to_ascii_lowercase();
    lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.starts_with("//")
        || lower.starts_with('#')
        || lower.starts_with("mailto:")
        || lower.starts_with("data:")
}

#[cfg(test)]
mod tests {
    use super::*;

    const R: &str = "R";

    #[test]
    fn parent_traversal_pops_source_dir() {
        assert_eq!(resolve("../c.md", "a/b", R, "main"), "R/blob/main/a/c.md");
    }

    #[test]
    fn root_relative_ignores_source_dir() {
        assert_eq!(resolve("/root.md", "a/b", R, "main"), "R/blob/main/root.md");
    }

    #[test]
    fn simple_relative_with_empty_source_dir() {
        assert_eq!(resolve("x.md", "", R, "main"), "R/blob/main/x.md");
    }

    #[test]
    fn simple_relative_joins_source_dir() {
        assert_eq!(
            resolve("./docs/setup.md", "guides/topicA", R, "v0.3.0"),
            "R/blob/v0.3.0/guides/topicA/docs/setup.md"
        );
    }

    #[test]
    fn traversal_past_root_clamps() {
        assert_eq!(resolve("../../../x.md", "a", R, "main"), "R/blob/main/x.md");
        assert_eq!(resolve("..", "", R, "main"), "R/blob/main/");
    }

    #[test]
    fn mixed_traversal_is_left_to_right() {
        assert_eq!(
            resolve("../sibling/./deep/../file.md", "guides/topicA", R, "main"),
            "R/blob/main/guides/sibling/file.md"
        );
    }

    #[test]
    fn assets_use_raw_view() {
        assert_eq!(
            resolve_asset("images/arch.svg", "docs", R, "main"),
            "R/raw/main/docs/images/arch.svg"
        );
        assert_eq!(
            resolve_asset("../assets/logo.png", "docs/monitoring", R, "main"),
            "R/raw/main/docs/assets/logo.png"
        );
    }

    #[test]
    fn source_dir_of_strips_file_name() {
        assert_eq!(source_dir_of("guides/topicA/README.md"), "guides/topicA");
        assert_eq!(source_dir_of("README.md"), "");
    }

    #[test]
    fn external_targets_are_detected() {
        for target in ["https://x.io", "HTTP://x.io", "#anchor", "mailto:a@b.c", "//cdn/x.png"] {
            assert!(is_external_or_anchor(target), "{target}");
        }
        assert!(!is_external_or_anchor("docs/x.md"));
        assert!(!is_external_or_anchor("/docs/x.md"));
    }
}
