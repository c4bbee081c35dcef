//! Page-view de-duplication for client-side navigation.
//!
//! A [`NavigationTracker`] lives for one page load. Route updates and
//! same-page anchor clicks can both report the same navigation in either
//! order, so an anchor click records a [`VirtualView`] and a route update for
//! the same URL inside [`SUPPRESSION_WINDOW_MS`] is dropped.
//!
//! Nothing here can fail: an unknown host, a missing tracker queue or an
//! unparseable href all turn the handler into a no-op.

use serde_json::{json, Value};
use tracing::debug;
use url::Url;

pub const TRACKER_BASE_URL: &str = "//analytics.ossupstream.org/";
pub const SUPPRESSION_WINDOW_MS: u64 = 1500;
pub const REBIND_DELAY_MS: u64 = 100;

const PREVIEW_SITE_ID: &str = "6";
const PRODUCTION_SITE_ID: &str = "7";

/// One entry of the tracker's command queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerCommand {
    DisableCookies,
    AlwaysUseSendBeacon(bool),
    EnableLinkTracking,
    SetTrackerUrl(String),
    SetSiteId(String),
    SetReferrerUrl(String),
    SetCustomUrl(String),
    SetDocumentTitle(String),
    TrackPageView,
}

impl TrackerCommand {
    /// The queue entry as the tracker script expects it, e.g. `["setSiteId", "7"]`.
    pub fn to_json(&self) -> Value {
        match self {
            TrackerCommand::DisableCookies => json!(["disableCookies"]),
            TrackerCommand::AlwaysUseSendBeacon(on) => json!(["alwaysUseSendBeacon", on]),
            TrackerCommand::EnableLinkTracking => json!(["enableLinkTracking"]),
            TrackerCommand::SetTrackerUrl(url) => json!(["setTrackerUrl", url]),
            TrackerCommand::SetSiteId(id) => json!(["setSiteId", id]),
            TrackerCommand::SetReferrerUrl(url) => json!(["setReferrerUrl", url]),
            TrackerCommand::SetCustomUrl(url) => json!(["setCustomUrl", url]),
            TrackerCommand::SetDocumentTitle(title) => json!(["setDocumentTitle", title]),
            TrackerCommand::TrackPageView => json!(["trackPageView"]),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub pathname: String,
    pub search: String,
    pub hash: String,
}

impl Location {
    pub fn new(pathname: &str, search: &str, hash: &str) -> Self {
        Self {
            pathname: pathname.to_string(),
            search: search.to_string(),
            hash: hash.to_string(),
        }
    }

    /// `pathname + search + hash`.
    pub fn url(&self) -> String {
        format!("{}{}{}", self.pathname, self.search, self.hash)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualView {
    pub url: String,
    pub timestamp_ms: u64,
}

/// The browser surface the tracker needs.
pub trait BrowserHost {
    /// `None` outside a DOM.
    fn hostname(&self) -> Option<String>;
    /// Absolute URL of the current page.
    fn href(&self) -> String;
    fn document_title(&self) -> String;
    fn now_ms(&self) -> u64;
    /// The tracker's command queue; `None` when the global is missing.
    fn tracker_queue(&mut self) -> Option<&mut Vec<TrackerCommand>>;
    /// Adds an async `<script src=..>`; `false` when the DOM refused it.
    fn inject_script(&mut self, src: &str) -> bool;
    /// Re-attaches anchor click listeners after `delay_ms`.
    fn schedule_rebind(&mut self, delay_ms: u64);
}

/// Tracker site id for a hostname, or `None` when the host must not be tracked.
pub fn resolve_site_id(hostname: &str) -> Option<&'static str> {
    let host = hostname.to_ascii_lowercase();
    if host.is_empty() {
        return None;
    }
    if host == "localhost" || host.contains("netlify.app") || host.contains("netlify.com") {
        return Some(PREVIEW_SITE_ID);
    }
    if host == "llm-d.ai" || host.ends_with(".llm-d.ai") {
        return Some(PRODUCTION_SITE_ID);
    }
    None
}

#[derive(Debug, Default)]
pub struct NavigationTracker {
    initialized: bool,
    site_id: Option<&'static str>,
    last_virtual: Option<VirtualView>,
    /// The ` - anchor` suffix this tracker last appended to a title.
    last_suffix: Option<String>,
}

impl NavigationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn site_id(&self) -> Option<&'static str> {
        self.site_id
    }

    pub fn last_virtual(&self) -> Option<&VirtualView> {
        self.last_virtual.as_ref()
    }

    pub fn on_route_did_update<H: BrowserHost>(
        &mut self,
        host: &mut H,
        location: &Location,
        previous: Option<&Location>,
    ) {
        if !self.ensure_initialized(host) {
            return;
        }
        let url = location.url();
        let now = host.now_ms();
        let duplicate = self
            .last_virtual
            .as_ref()
            .is_some_and(|v| v.url == url && now.saturating_sub(v.timestamp_ms) <= SUPPRESSION_WINDOW_MS);

        if duplicate {
            debug!(url = %url, "Route update duplicates anchor view, suppressed");
            self.last_virtual = None;
        } else {
            let title = self.anchored_title(&host.document_title(), &location.hash);
            let Some(queue) = host.tracker_queue() else {
                return;
            };
            if let Some(prev) = previous {
                queue.push(TrackerCommand::SetReferrerUrl(prev.url()));
            }
            queue.push(TrackerCommand::SetCustomUrl(url));
            queue.push(TrackerCommand::SetDocumentTitle(title));
            queue.push(TrackerCommand::TrackPageView);
        }
        host.schedule_rebind(REBIND_DELAY_MS);
    }

    /// Handles a click on a link with `href`; only same-page anchors count.
    pub fn on_anchor_click<H: BrowserHost>(&mut self, host: &mut H, href: &str) {
        if !self.initialized {
            return;
        }
        let current = match Url::parse(&host.href()) {
            Ok(url) => url,
            Err(e) => {
                debug!(error = %e, "Current page URL unparseable, click ignored");
                return;
            }
        };
        let target = match current.join(href) {
            Ok(url) => url,
            Err(e) => {
                debug!(href = %href, error = %e, "Anchor href unparseable, click ignored");
                return;
            }
        };
        if !matches!(target.scheme(), "http" | "https") || target.path() != current.path() {
            return;
        }
        let Some(fragment) = target.fragment().filter(|f| !f.is_empty()) else {
            return;
        };

        let url = match target.query() {
            Some(query) => format!("{}?{query}#{fragment}", target.path()),
            None => format!("{}#{fragment}", target.path()),
        };
        let title = self.anchored_title(&host.document_title(), &format!("#{fragment}"));
        let now = host.now_ms();
        let Some(queue) = host.tracker_queue() else {
            return;
        };
        queue.push(TrackerCommand::SetCustomUrl(url.clone()));
        queue.push(TrackerCommand::SetDocumentTitle(title));
        queue.push(TrackerCommand::TrackPageView);
        self.last_virtual = Some(VirtualView {
            url,
            timestamp_ms: now,
        });
    }

    fn ensure_initialized<H: BrowserHost>(&mut self, host: &mut H) -> bool {
        if self.initialized {
            return true;
        }
        let Some(site_id) = host.hostname().as_deref().and_then(resolve_site_id) else {
            return false;
        };
        let Some(queue) = host.tracker_queue() else {
            return false;
        };
        queue.push(TrackerCommand::DisableCookies);
        queue.push(TrackerCommand::AlwaysUseSendBeacon(true));
        queue.push(TrackerCommand::EnableLinkTracking);
        queue.push(TrackerCommand::SetTrackerUrl(format!("{TRACKER_BASE_URL}matomo.php")));
        queue.push(TrackerCommand::SetSiteId(site_id.to_string()));
        if !host.inject_script(&format!("{TRACKER_BASE_URL}matomo.js")) {
            debug!("Tracker script injection failed");
        }
        self.initialized = true;
        self.site_id = Some(site_id);
        true
    }

    /// `base - anchor` for a non-empty hash, else the base title.
    fn anchored_title(&mut self, title: &str, hash: &str) -> String {
        let base = self.base_title(title);
        match hash.strip_prefix('#').filter(|a| !a.is_empty()) {
            Some(anchor) => {
                let suffix = format!(" - {anchor}");
                let out = format!("{base}{suffix}");
                self.last_suffix = Some(suffix);
                out
            }
            None => {
                self.last_suffix = None;
                base
            }
        }
    }

    fn base_title(&self, title: &str) -> String {
        if let Some(suffix) = &self.last_suffix {
            return title.strip_suffix(suffix.as_str()).unwrap_or(title).to_string();
        }
        match title.rsplit_once(" - ") {
            Some((base, slug)) if !slug.is_empty() && !slug.contains(char::is_whitespace) => {
                base.to_string()
            }
            _ => title.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeHost {
        hostname: Option<String>,
        href: String,
        title: String,
        now: u64,
        queue: Option<Vec<TrackerCommand>>,
        scripts: Vec<String>,
        rebinds: Vec<u64>,
    }

    impl FakeHost {
        fn on(hostname: &str) -> Self {
            Self {
                hostname: Some(hostname.to_string()),
                href: format!("http://{hostname}/docs/guide"),
                title: "Docs".to_string(),
                now: 0,
                queue: Some(Vec::new()),
                scripts: Vec::new(),
                rebinds: Vec::new(),
            }
        }

        fn queue(&self) -> &[TrackerCommand] {
            self.queue.as_deref().unwrap_or_default()
        }

        fn page_views(&self) -> usize {
            self.queue()
                .iter()
                .filter(|c| **c == TrackerCommand::TrackPageView)
                .count()
        }

        fn titles(&self) -> Vec<&str> {
            self.queue()
                .iter()
                .filter_map(|c| match c {
                    TrackerCommand::SetDocumentTitle(t) => Some(t.as_str()),
                    _ => None,
                })
                .collect()
        }
    }

    impl BrowserHost for FakeHost {
        fn hostname(&self) -> Option<String> {
            self.hostname.clone()
        }
        fn href(&self) -> String {
            self.href.clone()
        }
        fn document_title(&self) -> String {
            self.title.clone()
        }
        fn now_ms(&self) -> u64 {
            self.now
        }
        fn tracker_queue(&mut self) -> Option<&mut Vec<TrackerCommand>> {
            self.queue.as_mut()
        }
        fn inject_script(&mut self, src: &str) -> bool {
            self.scripts.push(src.to_string());
            true
        }
        fn schedule_rebind(&mut self, delay_ms: u64) {
            self.rebinds.push(delay_ms);
        }
    }

    #[test]
    fn site_ids_follow_host_allow_list() {
        assert_eq!(resolve_site_id("localhost"), Some("6"));
        assert_eq!(resolve_site_id("deploy-preview-12--llm-d.netlify.app"), Some("6"));
        assert_eq!(resolve_site_id("llm-d.ai"), Some("7"));
        assert_eq!(resolve_site_id("www.LLM-D.ai"), Some("7"));
        assert_eq!(resolve_site_id("evil-llm-d.ai"), None);
        assert_eq!(resolve_site_id("example.com"), None);
        assert_eq!(resolve_site_id(""), None);
    }

    #[test]
    fn first_event_initializes_tracker() {
        let mut host = FakeHost::on("llm-d.ai");
        let mut tracker = NavigationTracker::new();
        tracker.on_route_did_update(&mut host, &Location::new("/docs/guide", "", ""), None);
        assert!(tracker.is_initialized());
        assert_eq!(tracker.site_id(), Some("7"));
        assert_eq!(
            &host.queue()[..5],
            &[
                TrackerCommand::DisableCookies,
                TrackerCommand::AlwaysUseSendBeacon(true),
                TrackerCommand::EnableLinkTracking,
                TrackerCommand::SetTrackerUrl("//analytics.ossupstream.org/matomo.php".into()),
                TrackerCommand::SetSiteId("7".into()),
            ]
        );
        assert_eq!(host.scripts, ["//analytics.ossupstream.org/matomo.js"]);
        assert_eq!(host.rebinds, [REBIND_DELAY_MS]);
    }

    #[test]
    fn route_update_sets_referrer_url_and_title() {
        let mut host = FakeHost::on("localhost");
        let mut tracker = NavigationTracker::new();
        let prev = Location::new("/docs/guide", "", "");
        tracker.on_route_did_update(&mut host, &Location::new("/docs/install", "?v=1", ""), Some(&prev));
        assert_eq!(
            &host.queue()[5..],
            &[
                TrackerCommand::SetReferrerUrl("/docs/guide".into()),
                TrackerCommand::SetCustomUrl("/docs/install?v=1".into()),
                TrackerCommand::SetDocumentTitle("Docs".into()),
                TrackerCommand::TrackPageView,
            ]
        );
    }

    #[test]
    fn unknown_host_never_sends() {
        let mut host = FakeHost::on("example.com");
        let mut tracker = NavigationTracker::new();
        tracker.on_route_did_update(&mut host, &Location::new("/docs/guide", "", "#x"), None);
        tracker.on_anchor_click(&mut host, "#y");
        assert!(!tracker.is_initialized());
        assert!(host.queue().is_empty());
        assert!(host.scripts.is_empty());
    }

    #[test]
    fn missing_tracker_global_is_a_no_op() {
        let mut host = FakeHost::on("llm-d.ai");
        host.queue = None;
        let mut tracker = NavigationTracker::new();
        tracker.on_route_did_update(&mut host, &Location::new("/docs/guide", "", ""), None);
        tracker.on_anchor_click(&mut host, "#x");
        assert!(!tracker.is_initialized());
    }

    #[test]
    fn route_update_shortly_after_anchor_click_is_suppressed() {
        let mut host = FakeHost::on("localhost");
        let mut tracker = NavigationTracker::new();
        let page = Location::new("/docs/guide", "", "");
        tracker.on_route_did_update(&mut host, &page, None);
        assert_eq!(host.page_views(), 1);

        host.now = 10_000;
        tracker.on_anchor_click(&mut host, "#install");
        assert_eq!(host.page_views(), 2);
        assert_eq!(
            tracker.last_virtual(),
            Some(&VirtualView {
                url: "/docs/guide#install".into(),
                timestamp_ms: 10_000
            })
        );

        host.now = 11_000;
        tracker.on_route_did_update(&mut host, &Location::new("/docs/guide", "", "#install"), Some(&page));
        assert_eq!(host.page_views(), 2);
        assert_eq!(host.rebinds.len(), 2);
    }

    #[test]
    fn route_update_after_window_is_tracked() {
        let mut host = FakeHost::on("localhost");
        let mut tracker = NavigationTracker::new();
        let page = Location::new("/docs/guide", "", "");
        tracker.on_route_did_update(&mut host, &page, None);

        host.now = 10_000;
        tracker.on_anchor_click(&mut host, "#install");
        host.now = 12_000;
        tracker.on_route_did_update(&mut host, &Location::new("/docs/guide", "", "#install"), Some(&page));
        assert_eq!(host.page_views(), 3);
    }

    #[test]
    fn cross_page_and_malformed_links_are_ignored() {
        let mut host = FakeHost::on("localhost");
        let mut tracker = NavigationTracker::new();
        tracker.on_route_did_update(&mut host, &Location::new("/docs/guide", "", ""), None);
        let before = host.queue().len();
        for href in ["/docs/install#setup", "http://[::1", "mailto:a@b.c#x", "/docs/guide", "#"] {
            tracker.on_anchor_click(&mut host, href);
        }
        assert_eq!(host.queue().len(), before);
        assert!(tracker.last_virtual().is_none());
    }

    #[test]
    fn hash_titles_do_not_compound() {
        let mut host = FakeHost::on("localhost");
        host.title = "Docs Page - first".into();
        let mut tracker = NavigationTracker::new();
        tracker.on_route_did_update(&mut host, &Location::new("/docs/guide", "", "#second"), None);
        host.title = "Docs Page - second".into();
        host.now = 5_000;
        tracker.on_anchor_click(&mut host, "#third");
        assert_eq!(host.titles(), ["Docs Page - second", "Docs Page - third"]);
    }

    #[test]
    fn commands_serialize_as_queue_entries() {
        assert_eq!(
            TrackerCommand::SetSiteId("7".into()).to_json(),
            json!(["setSiteId", "7"])
        );
        assert_eq!(
            TrackerCommand::AlwaysUseSendBeacon(true).to_json(),
            json!(["alwaysUseSendBeacon", true])
        );
    }
}
