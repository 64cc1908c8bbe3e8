use std::collections::BTreeMap;

use pretty_assertions::assert_eq;
use rai_ai::fetch::{prep_sources, PageFetcher, PrepStatus};
use rai_core::cache::DocumentCache;
use rai_core::domain::Source;
use rai_core::error::{codes, AppError};

struct MapFetcher {
    pages: BTreeMap<String, Result<String, AppError>>,
}

impl PageFetcher for MapFetcher {
    fn fetch(&self, url: &str) -> Result<String, AppError> {
        self.pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(AppError::new(codes::FETCH_FAILED, "Failed to reach page")))
    }
}

fn source(name: &str) -> Source {
    Source {
        name: name.to_string(),
        url: format!("https://intranet.example/{}", name.to_lowercase()),
        description: String::new(),
    }
}

fn fetcher() -> MapFetcher {
    let mut pages = BTreeMap::new();
    pages.insert(
        "https://intranet.example/vpn".to_string(),
        Ok("<html><body><h1>VPN</h1><p>Connect &amp; sign in.</p><script>x()</script></body></html>".to_string()),
    );
    pages.insert(
        "https://intranet.example/private".to_string(),
        Err(AppError::new(codes::FETCH_DENIED, "Page requires authorization")),
    );
    pages.insert(
        "https://intranet.example/printing".to_string(),
        Ok("<p>Printers   are on floor 2.</p>".to_string()),
    );
    MapFetcher { pages }
}

#[test]
fn unreachable_source_does_not_block_the_others() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cache = DocumentCache::open(tmp.path().to_path_buf());
    let sources = vec![source("VPN"), source("Private"), source("Offline"), source("Printing")];

    let report = prep_sources(&sources, &fetcher(), &cache).expect("prep");
    assert_eq!(report.outcomes.len(), 4);
    assert_eq!(report.cached_count(), 2);

    let failed: Vec<(&str, &str)> = report
        .failures()
        .map(|o| match &o.status {
            PrepStatus::Failed { code, .. } => (o.source_name.as_str(), code.as_str()),
            PrepStatus::Cached { .. } => unreachable!(),
        })
        .collect();
    assert_eq!(
        failed,
        vec![("Private", codes::FETCH_DENIED), ("Offline", codes::FETCH_FAILED)]
    );

    assert_eq!(cache.get("VPN").expect("vpn").raw_text, "VPN Connect & sign in.");
    assert_eq!(cache.get("Printing").expect("printing").raw_text, "Printers are on floor 2.");
    assert!(cache.load("Private").is_none());
}

#[test]
fn prep_twice_on_unchanged_pages_caches_identical_text() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cache = DocumentCache::open(tmp.path().to_path_buf());
    let sources = vec![source("VPN"), source("Printing")];

    prep_sources(&sources, &fetcher(), &cache).expect("first");
    let first: Vec<String> = sources
        .iter()
        .map(|s| cache.get(&s.name).expect("get").raw_text)
        .collect();
    prep_sources(&sources, &fetcher(), &cache).expect("second");
    let second: Vec<String> = sources
        .iter()
        .map(|s| cache.get(&s.name).expect("get").raw_text)
        .collect();
    assert_eq!(first, second);
}
