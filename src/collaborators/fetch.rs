use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use super::CResult;
use crate::core::errors::CollaboratorError;
use crate::model::TokenUsage;

#[derive(Debug, Clone)]
pub struct FetchResult {
    pub title: String,
    pub description: String,
    pub url: String,
    pub content: String,
    /// (anchor text, href) pairs, per §6.
    pub links: Vec<(String, String)>,
    pub usage: TokenUsage,
}

/// **Fetch** (§6): `(url, with_links) -> {title, description, url, content, links, usage}`.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str, with_links: bool) -> CResult<FetchResult>;
}

/// Default HTML-fetching implementation, grounded in the teacher's
/// `scraping::rust_scraper` extraction pipeline (`scraper` for DOM queries,
/// `readability` + `html2md` for clean-content extraction) but stripped of the
/// browser-automation/anti-bot/SPA-hydration machinery, which has no
/// counterpart in this core — a plain `reqwest::Client` GET is sufficient here.
/// Caches by URL the way the teacher's `AppState.scrape_cache` does, since the
/// same reference or shortlist URL is often fetched more than once per run.
pub struct DefaultFetch {
    client: reqwest::Client,
    cache: moka::future::Cache<String, FetchResult>,
}

impl DefaultFetch {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent("Mozilla/5.0 (compatible; deepcrawl-agent/0.1)")
            .build()
            .expect("failed to build HTTP client");
        let cache = moka::future::Cache::builder()
            .max_capacity(10_000)
            .time_to_live(std::time::Duration::from_secs(60 * 30))
            .build();
        Self { client, cache }
    }

    fn extract_title(document: &Html) -> String {
        let selector = Selector::parse("title").unwrap();
        document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default()
    }

    fn extract_meta_description(document: &Html) -> String {
        let selector = Selector::parse(r#"meta[name="description"]"#).unwrap();
        document
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .unwrap_or_default()
            .trim()
            .to_string()
    }

    fn extract_links(document: &Html, base: &Url) -> Vec<(String, String)> {
        let selector = Selector::parse("a[href]").unwrap();
        document
            .select(&selector)
            .filter_map(|el| {
                let href = el.value().attr("href")?;
                let resolved = base.join(href).ok()?;
                if resolved.scheme() != "http" && resolved.scheme() != "https" {
                    return None;
                }
                let anchor = el.text().collect::<String>().trim().to_string();
                Some((anchor, resolved.to_string()))
            })
            .collect()
    }
}

impl Default for DefaultFetch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetch for DefaultFetch {
    async fn fetch(&self, url: &str, with_links: bool) -> CResult<FetchResult> {
        let cache_key = format!("{url}|{with_links}");
        if let Some(cached) = self.cache.get(&cache_key).await {
            return Ok(cached);
        }

        let parsed_url = Url::parse(url)
            .map_err(|e| CollaboratorError::Other(anyhow::anyhow!("invalid URL '{url}': {e}")))?;

        let response = tokio::time::timeout(std::time::Duration::from_secs(60), self.client.get(url).send())
            .await
            .map_err(|_| CollaboratorError::Timeout(std::time::Duration::from_secs(60)))?
            .map_err(|e| {
                if CollaboratorError::looks_like_host_resolution_failure(&e.to_string()) {
                    CollaboratorError::HostResolution {
                        hostname: parsed_url.host_str().unwrap_or("").to_string(),
                        message: e.to_string(),
                    }
                } else {
                    CollaboratorError::Http(e)
                }
            })?;

        let html = response.text().await.map_err(CollaboratorError::Http)?;

        // `scraper::Html` holds non-`Send` internals (`tendril::StrTendril`); all
        // DOM work happens in this block and only owned `String`/`Vec` data
        // escapes it, so nothing non-`Send` is held across the later `.await`.
        let (title, description, links) = {
            let document = Html::parse_document(&html);
            let title = Self::extract_title(&document);
            let description = Self::extract_meta_description(&document);
            let links = if with_links {
                Self::extract_links(&document, &parsed_url)
            } else {
                Vec::new()
            };
            (title, description, links)
        };

        let clean_content = collapse_whitespace(
            &extract_readable_markdown(&html, url).unwrap_or_else(|| html2md::parse_html(&html)),
        );

        let result = FetchResult {
            title,
            description,
            url: url.to_string(),
            content: clean_content,
            links,
            usage: TokenUsage::default(),
        };
        self.cache.insert(cache_key, result.clone()).await;
        Ok(result)
    }
}

/// Collapses runs of blank lines and trailing whitespace left behind by
/// `html2md`/`readability`, grounded in the teacher's
/// `scraping::rust_scraper::clean` whitespace-normalization regexes.
fn collapse_whitespace(text: &str) -> String {
    static RE_TRAILING_SPACE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    static RE_MULTI_NEWLINE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();

    let re_trailing = RE_TRAILING_SPACE.get_or_init(|| regex::Regex::new(r"[ \t]+\n").unwrap());
    let re_multi_nl = RE_MULTI_NEWLINE.get_or_init(|| regex::Regex::new(r"\n{3,}").unwrap());

    let trimmed = re_trailing.replace_all(text, "\n");
    re_multi_nl.replace_all(&trimmed, "\n\n").trim().to_string()
}

fn extract_readable_markdown(html: &str, url: &str) -> Option<String> {
    let mut cursor = std::io::Cursor::new(html.as_bytes());
    let base_url = Url::parse(url).ok();
    let product = readability::extractor::extract(&mut cursor, base_url.as_ref()?).ok()?;
    Some(html2md::parse_html(&product.content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_trailing_whitespace_and_blank_lines() {
        let text = "line one   \n\n\n\nline two\n";
        assert_eq!(collapse_whitespace(text), "line one\n\nline two");
    }

    #[test]
    fn extracts_title_and_description() {
        let html = r#"<html><head><title>Hi</title>
            <meta name="description" content="a page"></head><body></body></html>"#;
        let document = Html::parse_document(html);
        assert_eq!(DefaultFetch::extract_title(&document), "Hi");
        assert_eq!(DefaultFetch::extract_meta_description(&document), "a page");
    }

    #[test]
    fn resolves_relative_links_against_base() {
        let html = r#"<html><body><a href="/foo">Foo</a><a href="mailto:x@y.com">Mail</a></body></html>"#;
        let document = Html::parse_document(html);
        let base = Url::parse("https://example.org/bar/").unwrap();
        let links = DefaultFetch::extract_links(&document, &base);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].1, "https://example.org/foo");
    }
}
