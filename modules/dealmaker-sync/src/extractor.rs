//! Pull LinkedIn profile URLs out of free-text deal fields and group them
//! into per-URL candidates.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use dealmaker_common::{ProfileCandidate, SourceRecord};

const CANONICAL_ORIGIN: &str = "https://www.linkedin.com";

/// Profile path families, in match order.
const PROFILE_PATHS: &[&str] = &["in", "company", "school", "pub", "people"];

static PROFILE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    PROFILE_PATHS
        .iter()
        .map(|path| {
            Regex::new(&format!(
                r#"(?i)https?://(?:[a-z0-9-]+\.)?linkedin\.com/{path}/[^/\s<>"'?#]+"#
            ))
            .expect("profile pattern is valid")
        })
        .collect()
});

static LABELED_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:Profile URL|URL del perfil):\s*(https?://(?:[a-z0-9-]+\.)?linkedin\.com/[^\s<>"']+)"#)
        .expect("labeled pattern is valid")
});

static POST_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://(?:[a-z0-9-]+\.)?linkedin\.com/posts/([^/\s<>"'?#]+)"#)
        .expect("post pattern is valid")
});

/// Canonical form of a LinkedIn URL: https, `www.linkedin.com`, lowercase
/// path, no trailing slash, no query or fragment.
///
/// Returns `None` for anything that is not a LinkedIn URL with a path.
pub fn normalize_profile_url(raw: &str) -> Option<String> {
    let trimmed = raw
        .trim()
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | ')' | ']' | '}'));
    let url = Url::parse(trimmed).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();
    if host != "linkedin.com" && !host.ends_with(".linkedin.com") {
        return None;
    }

    let path = url.path().to_lowercase();
    let path = path.trim_end_matches('/');
    if path.is_empty() {
        return None;
    }
    Some(format!("{CANONICAL_ORIGIN}{path}"))
}

/// Username embedded in a post slug: text before the first `_`, else before
/// the first `-`.
///
/// Splitting on `-` alone would cut hyphenated usernames such as
/// `jane-doe_hiring-activity-1` down to `jane`, so `_` takes precedence.
fn username_from_post_slug(slug: &str) -> Option<String> {
    let username = match slug.split_once('_') {
        Some((head, _)) => head,
        None => slug.split_once('-').map(|(head, _)| head).unwrap_or(slug),
    };
    let username = username.trim();
    if username.is_empty() {
        None
    } else {
        Some(username.to_lowercase())
    }
}

/// Every normalized profile URL in `text`, in discovery order, without
/// duplicates. Direct profile links come first, then labeled URLs, then
/// profiles derived from post links.
pub fn profile_urls_in(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut push = |url: Option<String>| {
        if let Some(url) = url {
            if !found.contains(&url) {
                found.push(url);
            }
        }
    };

    for pattern in PROFILE_PATTERNS.iter() {
        for m in pattern.find_iter(text) {
            push(normalize_profile_url(m.as_str()));
        }
    }
    for caps in LABELED_URL.captures_iter(text) {
        push(caps.get(1).and_then(|m| normalize_profile_url(m.as_str())));
    }
    for caps in POST_URL.captures_iter(text) {
        let derived = caps
            .get(1)
            .and_then(|m| username_from_post_slug(m.as_str()))
            .and_then(|user| normalize_profile_url(&format!("{CANONICAL_ORIGIN}/in/{user}")));
        push(derived);
    }

    found
}

/// Whether a record carries anything the extractor can use.
pub fn has_profile_links(record: &SourceRecord) -> bool {
    !record_urls(record).is_empty()
}

fn record_urls(record: &SourceRecord) -> Vec<String> {
    let mut urls = profile_urls_in(&record.description);
    if let Some(link) = &record.link {
        for url in profile_urls_in(link) {
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    }
    urls
}

/// Group the profile URLs of `records` into candidates keyed by normalized
/// URL. Candidates keep first-discovery order; each lists its referencing
/// records in input order.
pub fn extract(records: &[SourceRecord]) -> Vec<ProfileCandidate> {
    let mut candidates: Vec<ProfileCandidate> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        let urls = record_urls(record);
        if urls.is_empty() {
            tracing::debug!(record_id = %record.id, "No profile links in record");
            continue;
        }
        for url in urls {
            match index.get(&url) {
                Some(&i) => {
                    candidates[i].add_record(record);
                }
                None => {
                    index.insert(url.clone(), candidates.len());
                    candidates.push(ProfileCandidate::new(url, record));
                }
            }
        }
    }

    candidates
}
