//! HTTP-backed listing and detail sources.
//!
//! Site-specific selectors stay out of the core: callers implement
//! [`ListingParser`]/[`DetailParser`] (or configure a
//! [`RegexDetailParser`]) and the sources here handle the transport.

use async_trait::async_trait;
use indexmap::IndexMap;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{FetchError, FetchResult, PageError, PageResult};
use crate::traits::{DetailSource, ListingSource};
use crate::types::{ListingPage, RecordStub, SeedRecord};

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/122.0.0.0 Safari/537.36";

/// Turns a listing page body into record stubs.
///
/// The parser is where site selectors live; it also classifies each
/// entry's placement so the walker can drop sponsored results.
pub trait ListingParser: Send + Sync {
    fn parse(&self, seed: &SeedRecord, page: u32, body: &str) -> PageResult<ListingPage>;
}

impl<F> ListingParser for F
where
    F: Fn(&SeedRecord, u32, &str) -> PageResult<ListingPage> + Send + Sync,
{
    fn parse(&self, seed: &SeedRecord, page: u32, body: &str) -> PageResult<ListingPage> {
        self(seed, page, body)
    }
}

/// Turns a detail page body into the record's detail fields.
pub trait DetailParser: Send + Sync {
    fn parse(&self, stub: &RecordStub, body: &str) -> FetchResult<IndexMap<String, String>>;
}

impl<F> DetailParser for F
where
    F: Fn(&RecordStub, &str) -> FetchResult<IndexMap<String, String>> + Send + Sync,
{
    fn parse(&self, stub: &RecordStub, body: &str) -> FetchResult<IndexMap<String, String>> {
        self(stub, body)
    }
}

fn default_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .expect("Failed to create HTTP client")
}

/// Listing source for HTTP-paginated directories.
///
/// The URL template substitutes `{seed}` (URL-encoded seed term) and
/// `{page}` (1-based page number), e.g.
/// `https://example.com/search?term={seed}&page={page}`.
pub struct PagedListingSource<P: ListingParser> {
    client: reqwest::Client,
    url_template: String,
    user_agent: String,
    parser: P,
}

impl<P: ListingParser> PagedListingSource<P> {
    pub fn new(url_template: impl Into<String>, parser: P) -> Self {
        Self {
            client: default_client(),
            url_template: url_template.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            parser,
        }
    }

    /// Set a custom user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set a custom HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn page_url(&self, seed: &SeedRecord, page: u32) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(seed.term().as_bytes()).collect();
        self.url_template
            .replace("{seed}", &encoded)
            .replace("{page}", &page.to_string())
    }
}

#[async_trait]
impl<P: ListingParser> ListingSource for PagedListingSource<P> {
    async fn fetch_page(&self, seed: &SeedRecord, page: u32) -> PageResult<ListingPage> {
        let url = self.page_url(seed, page);
        url::Url::parse(&url).map_err(|_| PageError::InvalidUrl { url: url.clone() })?;
        debug!(url = %url, page, "Fetching listing page");

        let response = self
            .client
            .get(&url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PageError::Timeout {
                        seed: seed.label(),
                        page,
                    }
                } else {
                    PageError::Http(Box::new(e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PageError::Http(Box::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("HTTP {status}"),
            ))));
        }

        let body = response.text().await.map_err(|e| PageError::Http(Box::new(e)))?;
        self.parser.parse(seed, page, &body)
    }

    fn name(&self) -> &str {
        "http-listing"
    }
}

/// Detail source fetching each stub's `detail_ref` over HTTP.
pub struct HttpDetailSource<P: DetailParser> {
    client: reqwest::Client,
    user_agent: String,
    parser: P,
}

impl<P: DetailParser> HttpDetailSource<P> {
    pub fn new(parser: P) -> Self {
        Self {
            client: default_client(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            parser,
        }
    }

    /// Set a custom user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set a custom HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl<P: DetailParser> DetailSource for HttpDetailSource<P> {
    async fn fetch_detail(&self, stub: &RecordStub) -> FetchResult<IndexMap<String, String>> {
        debug!(key = %stub.key, url = %stub.detail_ref, "Fetching detail page");

        let response = self
            .client
            .get(&stub.detail_ref)
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout {
                        key: stub.key.clone(),
                    }
                } else {
                    FetchError::Http {
                        key: stub.key.clone(),
                        source: Box::new(e),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(key = %stub.key, status = %status, "Detail page returned error status");
            return Err(FetchError::Http {
                key: stub.key.clone(),
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("HTTP {status}"),
                )),
            });
        }

        let body = response.text().await.map_err(|e| FetchError::Http {
            key: stub.key.clone(),
            source: Box::new(e),
        })?;

        self.parser.parse(stub, &body)
    }

    fn name(&self) -> &str {
        "http-detail"
    }
}

/// Detail parser driven by per-field regex rules.
///
/// Each rule's first capture group becomes the field value. Fields marked
/// required produce a [`FetchError::MissingField`] when absent; optional
/// fields are simply omitted.
pub struct RegexDetailParser {
    rules: Vec<FieldRule>,
}

struct FieldRule {
    name: String,
    pattern: Regex,
    required: bool,
}

impl RegexDetailParser {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Add an optional field rule.
    pub fn field(mut self, name: impl Into<String>, pattern: Regex) -> Self {
        self.rules.push(FieldRule {
            name: name.into(),
            pattern,
            required: false,
        });
        self
    }

    /// Add a required field rule.
    pub fn required_field(mut self, name: impl Into<String>, pattern: Regex) -> Self {
        self.rules.push(FieldRule {
            name: name.into(),
            pattern,
            required: true,
        });
        self
    }
}

impl Default for RegexDetailParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DetailParser for RegexDetailParser {
    fn parse(&self, stub: &RecordStub, body: &str) -> FetchResult<IndexMap<String, String>> {
        let mut fields = IndexMap::new();
        for rule in &self.rules {
            let value = rule
                .pattern
                .captures(body)
                .and_then(|cap| cap.get(1))
                .map(|m| normalize_whitespace(m.as_str()));

            match value {
                Some(v) if !v.is_empty() => {
                    fields.insert(rule.name.clone(), v);
                }
                _ if rule.required => {
                    return Err(FetchError::MissingField {
                        key: stub.key.clone(),
                        field: rule.name.clone(),
                    });
                }
                _ => {}
            }
        }
        Ok(fields)
    }
}

/// Collapse runs of whitespace into single spaces.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_parser(_: &SeedRecord, _: u32, _: &str) -> PageResult<ListingPage> {
        Ok(ListingPage::empty())
    }

    #[test]
    fn test_page_url_substitution() {
        let source = PagedListingSource::new(
            "https://example.com/search?term={seed}&page={page}",
            empty_parser,
        );

        let seed = SeedRecord::Query("plow dealers".to_string());
        assert_eq!(
            source.page_url(&seed, 3),
            "https://example.com/search?term=plow+dealers&page=3"
        );
    }

    #[test]
    fn test_regex_parser_extracts_fields() {
        let parser = RegexDetailParser::new()
            .required_field("Name", Regex::new(r"<h1>([^<]+)</h1>").unwrap())
            .field("Phone", Regex::new(r"Phone:\s*([\d-]+)").unwrap())
            .field("Email", Regex::new(r"mailto:([^\x22]+)").unwrap());

        let body = "<h1>Acme  Plows</h1>\n<p>Phone: 555-0100</p>";
        let stub = RecordStub::new("k1");
        let fields = parser.parse(&stub, body).unwrap();

        assert_eq!(fields.get("Name").unwrap(), "Acme Plows");
        assert_eq!(fields.get("Phone").unwrap(), "555-0100");
        assert!(!fields.contains_key("Email"));
    }

    #[test]
    fn test_regex_parser_missing_required() {
        let parser = RegexDetailParser::new()
            .required_field("Name", Regex::new(r"<h1>([^<]+)</h1>").unwrap());

        let stub = RecordStub::new("k1");
        let result = parser.parse(&stub, "<p>no heading here</p>");

        assert!(matches!(
            result,
            Err(FetchError::MissingField { ref field, .. }) if field == "Name"
        ));
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a \n b\t c  "), "a b c");
    }
}
