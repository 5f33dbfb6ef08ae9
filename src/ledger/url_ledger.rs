use std::collections::{HashMap, HashSet};

use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use url::Url;

use crate::core::errors::UrlError;

/// Tracking/session query parameters dropped during normalization (§4.1).
const TRACKING_PARAMS: &[&str] = &[
    "ref", "fbclid", "gclid", "msclkid", "mc_cid", "mc_eid", "_hsenc", "_hsmi", "igshid",
    "ref_src", "spm", "sessionid", "session_id", "sid", "phpsessid", "jsessionid",
];

const SENTINEL_HOSTS: &[&str] = &["example.com", "www.example.com", "example.org"];

/// Deterministic, pure URL normalizer (§4.1). Returns the canonical ledger key.
pub fn normalize_url(raw: &str) -> Result<String, UrlError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlError::Empty);
    }

    let parsed = Url::parse(raw).map_err(|_| UrlError::Unparseable(raw.to_string()))?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(UrlError::UnsupportedScheme(scheme.to_string()));
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| UrlError::Unparseable(raw.to_string()))?
        .to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();

    if SENTINEL_HOSTS.contains(&host.as_str()) {
        return Err(UrlError::Sentinel(raw.to_string()));
    }
    if (host == "google.com" || host.ends_with(".google.com")) && parsed.path().starts_with("/search")
    {
        return Err(UrlError::Sentinel(raw.to_string()));
    }

    let default_port = match scheme {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    };
    let port_suffix = match parsed.port() {
        Some(p) if Some(p) != default_port => format!(":{}", p),
        _ => String::new(),
    };

    let path = normalize_path(parsed.path(), &host);

    let query = normalize_query(parsed.query());

    let fragment = normalize_fragment(parsed.fragment());

    let mut out = format!("{}://{}{}{}", scheme, host, port_suffix, path);
    if !query.is_empty() {
        out.push('?');
        out.push_str(&query);
    }
    if let Some(frag) = fragment {
        out.push('#');
        out.push_str(&frag);
    }
    Ok(out)
}

fn normalize_path(raw_path: &str, host: &str) -> String {
    // Collapse repeated slashes.
    let collapsed = collapse_slashes(raw_path);

    // Percent-decode each segment only when the re-encoded decoded form matches
    // the input segment (avoids ambiguity from a non-round-tripping encoding).
    let segments: Vec<String> = collapsed
        .split('/')
        .map(|seg| {
            let decoded = percent_decode_str(seg).decode_utf8_lossy().to_string();
            let reencoded: String =
                utf8_percent_encode(&decoded, NON_ALPHANUMERIC_PATH_SAFE).to_string();
            if reencoded.eq_ignore_ascii_case(seg) {
                decoded
            } else {
                seg.to_string()
            }
        })
        .collect();
    let mut path = segments.join("/");

    if path.is_empty() {
        path = "/".to_string();
    }

    // Drop trailing slash except root.
    if path.len() > 1 && path.ends_with('/') {
        path.pop();
    }

    // X/Twitter: /status/{id}/analytics -> /status/{id}
    if host == "twitter.com" || host == "x.com" {
        if let Some(stripped) = path.strip_suffix("/analytics") {
            if stripped.contains("/status/") {
                path = stripped.to_string();
            }
        }
    }

    path
}

/// Percent-encoding set that treats path-safe punctuation (`/`, `-`, `_`, `.`, `~`)
/// as not requiring encoding, matching common path segment conventions.
const NON_ALPHANUMERIC_PATH_SAFE: &percent_encoding::AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut last_was_slash = false;
    for ch in path.chars() {
        if ch == '/' {
            if last_was_slash {
                continue;
            }
            last_was_slash = true;
        } else {
            last_was_slash = false;
        }
        out.push(ch);
    }
    out
}

fn normalize_query(query: Option<&str>) -> String {
    let Some(query) = query else {
        return String::new();
    };
    let mut pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .filter(|(k, _)| !is_tracking_param(k))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

fn is_tracking_param(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    lower.starts_with("utm_") || TRACKING_PARAMS.contains(&lower.as_str())
}

fn normalize_fragment(fragment: Option<&str>) -> Option<String> {
    let fragment = fragment?;
    let trimmed = fragment.trim().trim_start_matches('/');
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("top") {
        return None;
    }
    // Drop fragments by default (§4.1).
    None
}

/// Given either string contains the other, keep the superset; else splice the
/// longest suffix-of-A == prefix-of-B; else concatenate (§4.1 "smart string merge").
pub fn smart_merge_strings(a: &str, b: &str) -> String {
    if a.is_empty() {
        return b.to_string();
    }
    if b.is_empty() {
        return a.to_string();
    }
    if a.contains(b) {
        return a.to_string();
    }
    if b.contains(a) {
        return b.to_string();
    }

    let max_overlap = a.len().min(b.len());
    for overlap in (1..=max_overlap).rev() {
        if a.ends_with(&b[..overlap]) {
            return format!("{}{}", &a[..a.len() - overlap], b);
        }
    }

    format!("{} {}", a, b)
}

/// Initial weight assigned on first observation of a URL.
pub const WEIGHT_SEARCH_RESULT: f64 = 1.0;
pub const WEIGHT_IN_PAGE_LINK: f64 = 0.1;

#[derive(Debug, Clone, Default)]
pub struct UrlRecord {
    pub url: String,
    pub title: String,
    pub description: String,
    pub weight: f64,
    pub first_seen: Option<chrono::DateTime<chrono::Utc>>,
    pub visited: bool,
}

#[derive(Debug, Clone)]
pub struct RankedUrl {
    pub url: String,
    pub title: String,
    pub description: String,
    pub score: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct RankingConfig {
    pub freq_factor: f64,
    pub hostname_factor: f64,
    pub path_factor: f64,
    pub path_decay: f64,
    pub rerank_factor: f64,
    pub min_boost: f64,
    pub max_boost: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            freq_factor: 0.5,
            hostname_factor: 0.5,
            path_factor: 0.4,
            path_decay: 0.8,
            rerank_factor: 0.8,
            min_boost: 0.0,
            max_boost: 5.0,
        }
    }
}

/// URL Ledger (C1): normalize, deduplicate, score, diversify, track lifecycle.
#[derive(Debug, Default)]
pub struct UrlLedger {
    records: HashMap<String, UrlRecord>,
    insertion_order: Vec<String>,
    visited: HashSet<String>,
    bad_urls: HashSet<String>,
    bad_hostnames: HashSet<String>,
}

impl UrlLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, normalized_url: &str) -> Option<&UrlRecord> {
        self.records.get(normalized_url)
    }

    pub fn contains(&self, normalized_url: &str) -> bool {
        self.records.contains_key(normalized_url)
    }

    pub fn is_visited(&self, normalized_url: &str) -> bool {
        self.visited.contains(normalized_url)
    }

    pub fn is_bad(&self, normalized_url: &str) -> bool {
        self.bad_urls.contains(normalized_url)
    }

    pub fn visited_urls(&self) -> Vec<String> {
        self.visited.iter().cloned().collect()
    }

    pub fn read_urls(&self) -> Vec<String> {
        self.visited.difference(&self.bad_urls).cloned().collect()
    }

    pub fn all_urls(&self) -> Vec<String> {
        self.insertion_order.clone()
    }

    /// Insert or merge a raw URL observation (§4.1 "Insertion").
    /// Returns the normalized key on success.
    pub fn insert(
        &mut self,
        raw_url: &str,
        title: &str,
        description: &str,
        weight_delta: f64,
    ) -> Result<String, UrlError> {
        let key = normalize_url(raw_url)?;
        if self.bad_hostnames.contains(&hostname_of(&key)) {
            return Err(UrlError::Sentinel(key));
        }

        match self.records.get_mut(&key) {
            Some(existing) => {
                existing.weight += weight_delta;
                existing.description = smart_merge_strings(&existing.description, description);
                if existing.title.is_empty() {
                    existing.title = title.to_string();
                }
            }
            None => {
                self.records.insert(
                    key.clone(),
                    UrlRecord {
                        url: key.clone(),
                        title: title.to_string(),
                        description: description.to_string(),
                        weight: weight_delta,
                        first_seen: Some(chrono::Utc::now()),
                        visited: false,
                    },
                );
                self.insertion_order.push(key.clone());
            }
        }
        Ok(key)
    }

    pub fn mark_visited(&mut self, normalized_url: &str) {
        self.visited.insert(normalized_url.to_string());
        if let Some(record) = self.records.get_mut(normalized_url) {
            record.visited = true;
        }
    }

    pub fn mark_bad(&mut self, normalized_url: &str) {
        self.visited.insert(normalized_url.to_string());
        self.bad_urls.insert(normalized_url.to_string());
    }

    /// Add a hostname to the bad set and evict every ledger record under it (§4.1).
    pub fn evict_hostname(&mut self, hostname: &str) {
        let hostname = hostname.to_ascii_lowercase();
        self.bad_hostnames.insert(hostname.clone());
        let to_remove: Vec<String> = self
            .records
            .keys()
            .filter(|k| hostname_of(k) == hostname)
            .cloned()
            .collect();
        for key in to_remove {
            self.records.remove(&key);
            self.insertion_order.retain(|k| k != &key);
        }
    }

    pub fn is_bad_hostname(&self, hostname: &str) -> bool {
        self.bad_hostnames.contains(hostname)
    }

    /// Rank all records against `question`, optionally boosting some hostnames (§4.1 "Ranking").
    /// `rerank_scores` maps a normalized URL to a pre-computed semantic relevance in [0,1];
    /// URLs absent from the map degrade rerank_boost to 0 (rerank collaborator failure never
    /// fails the step).
    pub fn rank(
        &self,
        boosted_hostnames: &[String],
        rerank_scores: &HashMap<String, f32>,
        config: &RankingConfig,
    ) -> Vec<RankedUrl> {
        if self.records.is_empty() {
            return Vec::new();
        }

        let total: f64 = self.records.len() as f64;
        let mut hostname_counts: HashMap<String, usize> = HashMap::new();
        let mut path_prefix_counts: HashMap<String, usize> = HashMap::new();
        for key in self.records.keys() {
            *hostname_counts.entry(hostname_of(key)).or_insert(0) += 1;
            for prefix in path_prefixes(key) {
                *path_prefix_counts.entry(prefix).or_insert(0) += 1;
            }
        }

        let boosted: HashSet<&String> = boosted_hostnames.iter().collect();

        let mut scored: Vec<(usize, RankedUrl)> = self
            .insertion_order
            .iter()
            .enumerate()
            .filter_map(|(idx, key)| {
                let record = self.records.get(key)?;
                let hostname = hostname_of(key);

                let freq_boost =
                    ((record.weight / total) * config.freq_factor).clamp(config.min_boost, config.max_boost);

                let hostname_count = *hostname_counts.get(&hostname).unwrap_or(&0) as f64;
                let hostname_multiplier = if boosted.contains(&hostname) { 2.0 } else { 1.0 };
                let hostname_boost = ((hostname_count / total)
                    * config.hostname_factor
                    * hostname_multiplier)
                    .clamp(config.min_boost, config.max_boost);

                let mut path_boost = 0.0;
                for (i, prefix) in path_prefixes(key).into_iter().enumerate() {
                    let count = *path_prefix_counts.get(&prefix).unwrap_or(&0) as f64;
                    path_boost += (count / total) * config.path_decay.powi(i as i32) * config.path_factor;
                }
                let path_boost = path_boost.clamp(config.min_boost, config.max_boost);

                let rerank_boost = rerank_scores
                    .get(key)
                    .map(|s| ((*s as f64) * config.rerank_factor).clamp(config.min_boost, config.max_boost))
                    .unwrap_or(0.0);

                let score = freq_boost + hostname_boost + path_boost + rerank_boost;

                Some((
                    idx,
                    RankedUrl {
                        url: key.clone(),
                        title: record.title.clone(),
                        description: record.description.clone(),
                        score,
                    },
                ))
            })
            .collect();

        // Stable sort by score desc, ties broken by insertion order (ascending idx).
        scored.sort_by(|(ia, a), (ib, b)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(ia.cmp(ib))
        });

        scored.into_iter().map(|(_, r)| r).collect()
    }

    /// Keep at most `k` records per hostname, preserving relative order (§4.1 "Diversification").
    pub fn diversify(ranked: Vec<RankedUrl>, k: usize) -> Vec<RankedUrl> {
        let mut per_host: HashMap<String, usize> = HashMap::new();
        let mut out = Vec::new();
        for candidate in ranked {
            let host = hostname_of(&candidate.url);
            let count = per_host.entry(host).or_insert(0);
            if *count < k {
                *count += 1;
                out.push(candidate);
            }
        }
        out
    }
}

fn hostname_of(normalized_url: &str) -> String {
    Url::parse(normalized_url)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_string()))
        .unwrap_or_default()
}

/// All path prefixes of increasing depth, e.g. `/a/b/c` -> [`/a`, `/a/b`, `/a/b/c`].
fn path_prefixes(normalized_url: &str) -> Vec<String> {
    let Ok(parsed) = Url::parse(normalized_url) else {
        return Vec::new();
    };
    let path = parsed.path();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let mut prefixes = Vec::new();
    let mut acc = String::new();
    for seg in segments {
        acc.push('/');
        acc.push_str(seg);
        prefixes.push(acc.clone());
    }
    prefixes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        let cases = [
            "https://WWW.Example.com:443/a//b/../c/?utm_source=x&b=2&a=1#top",
            "http://docs.rs/tokio/latest/tokio/",
            "https://x.com/someone/status/123/analytics",
        ];
        for case in cases {
            if let Ok(once) = normalize_url(case) {
                let twice = normalize_url(&once).unwrap();
                assert_eq!(once, twice, "not idempotent for {case}");
            }
        }
    }

    #[test]
    fn strips_www_and_default_port_and_sorts_query() {
        let out = normalize_url("https://www.example.org:443/path/?b=2&a=1&utm_source=news").unwrap();
        assert_eq!(out, "https://example.org/path?a=1&b=2");
    }

    #[test]
    fn rejects_sentinel_hosts() {
        assert!(normalize_url("https://example.com/").is_err());
        assert!(normalize_url("https://www.google.com/search?q=rust").is_err());
    }

    #[test]
    fn collapses_trailing_slash_except_root() {
        assert_eq!(normalize_url("https://a.com/").unwrap(), "https://a.com/");
        assert_eq!(normalize_url("https://a.com/foo/").unwrap(), "https://a.com/foo");
    }

    #[test]
    fn collapses_twitter_status_analytics() {
        let out = normalize_url("https://x.com/jdoe/status/42/analytics").unwrap();
        assert_eq!(out, "https://x.com/jdoe/status/42");
    }

    #[test]
    fn smart_merge_superset_containment() {
        assert_eq!(smart_merge_strings("hello world", "world"), "hello world");
        assert_eq!(smart_merge_strings("world", "hello world"), "hello world");
    }

    #[test]
    fn smart_merge_splices_overlap() {
        assert_eq!(smart_merge_strings("the quick brown", "brown fox jumps"), "the quick brown fox jumps");
    }

    #[test]
    fn smart_merge_concatenates_when_disjoint() {
        assert_eq!(smart_merge_strings("abc", "xyz"), "abc xyz");
    }

    #[test]
    fn smart_merge_self_is_identity() {
        assert_eq!(smart_merge_strings("repeat", "repeat"), "repeat");
    }

    #[test]
    fn diversification_caps_per_hostname() {
        let ranked = vec![
            RankedUrl { url: "https://a.com/1".into(), title: "".into(), description: "".into(), score: 3.0 },
            RankedUrl { url: "https://a.com/2".into(), title: "".into(), description: "".into(), score: 2.0 },
            RankedUrl { url: "https://a.com/3".into(), title: "".into(), description: "".into(), score: 1.0 },
            RankedUrl { url: "https://b.com/1".into(), title: "".into(), description: "".into(), score: 0.5 },
        ];
        let kept = UrlLedger::diversify(ranked, 2);
        assert_eq!(kept.len(), 3);
        assert_eq!(kept.iter().filter(|r| r.url.contains("a.com")).count(), 2);
    }

    #[test]
    fn eviction_removes_all_hostname_records() {
        let mut ledger = UrlLedger::new();
        ledger.insert("https://bad.example/a", "t", "d", 1.0).unwrap();
        ledger.insert("https://bad.example/b", "t", "d", 1.0).unwrap();
        ledger.insert("https://good.example/a", "t", "d", 1.0).unwrap();
        ledger.evict_hostname("bad.example");
        assert_eq!(ledger.len(), 1);
        assert!(ledger.is_bad_hostname("bad.example"));
    }
}
