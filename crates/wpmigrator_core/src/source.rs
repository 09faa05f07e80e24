use std::collections::VecDeque;
use std::thread::sleep;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{HeaderValue, USER_AGENT};
use tracing::{debug, info, warn};

use crate::config::MigratorConfig;
use crate::error::{MigrateError, Result};
use crate::record::Record;

pub const PER_PAGE: u64 = 100;
pub const TOTAL_ITEMS_HEADER: &str = "x-wp-total";
pub const TOTAL_PAGES_HEADER: &str = "x-wp-totalpages";

pub type QueryParams = Vec<(String, String)>;

/// One page of a collection plus the totals the source reported alongside it.
#[derive(Debug, Clone, Default)]
pub struct PageResponse {
    pub total_items: Option<u64>,
    pub total_pages: Option<u64>,
    pub items: Vec<Record>,
}

/// A single collection request against the content source.
pub trait PageSource {
    fn fetch_page(&mut self, collection: &str, params: &[(String, String)]) -> Result<PageResponse>;
    fn request_count(&self) -> usize;
}

/// Lazily walk every page of `collection`.
pub fn fetch_all<'a, S: PageSource + ?Sized>(
    source: &'a mut S,
    collection: &str,
    extra_params: QueryParams,
) -> PagedFetch<'a, S> {
    PagedFetch {
        source,
        collection: collection.to_string(),
        extra_params,
        total_pages: None,
        next_page: 1,
        buffer: VecDeque::new(),
        finished: false,
    }
}

/// Iterator over all records of a collection.
///
/// The first call to `next` issues the discovery request; each later page is
/// requested only once the previous one has been drained. After an error the
/// iterator is fused.
pub struct PagedFetch<'a, S: PageSource + ?Sized> {
    source: &'a mut S,
    collection: String,
    extra_params: QueryParams,
    total_pages: Option<u64>,
    next_page: u64,
    buffer: VecDeque<Record>,
    finished: bool,
}

impl<S: PageSource + ?Sized> PagedFetch<'_, S> {
    fn advance(&mut self) -> Result<()> {
        let Some(total_pages) = self.total_pages else {
            return self.discover();
        };
        if self.next_page > total_pages {
            self.finished = true;
            return Ok(());
        }

        let mut params = vec![
            ("page".to_string(), self.next_page.to_string()),
            ("per_page".to_string(), PER_PAGE.to_string()),
            ("order_by".to_string(), "id".to_string()),
        ];
        params.extend(self.extra_params.iter().cloned());

        let response = self.source.fetch_page(&self.collection, &params)?;
        debug!(
            collection = %self.collection,
            page = self.next_page,
            items = response.items.len(),
            "fetched page"
        );
        self.buffer.extend(response.items);
        self.next_page += 1;
        Ok(())
    }

    fn discover(&mut self) -> Result<()> {
        let mut params = vec![("per_page".to_string(), PER_PAGE.to_string())];
        params.extend(self.extra_params.iter().cloned());

        let response = self.source.fetch_page(&self.collection, &params)?;
        let total_items = response.total_items.ok_or_else(|| {
            MigrateError::malformed(&self.collection, format!("missing {TOTAL_ITEMS_HEADER}"))
        })?;
        let total_pages = response.total_pages.ok_or_else(|| {
            MigrateError::malformed(&self.collection, format!("missing {TOTAL_PAGES_HEADER}"))
        })?;
        info!(
            collection = %self.collection,
            total_items,
            total_pages,
            "fetch_all"
        );

        if total_items == 0 {
            self.finished = true;
        }
        self.total_pages = Some(total_pages);
        Ok(())
    }
}

impl<S: PageSource + ?Sized> Iterator for PagedFetch<'_, S> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                debug!(collection = %self.collection, id = %item.id_or_unknown(), "fetched record");
                return Some(Ok(item));
            }
            if self.finished {
                return None;
            }
            if let Err(error) = self.advance() {
                self.finished = true;
                return Some(Err(error));
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct WordPressClientConfig {
    pub api_url: String,
    pub user_agent: String,
    pub timeout_ms: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
    pub rate_limit_ms: u64,
}

impl WordPressClientConfig {
    pub fn from_config(config: &MigratorConfig) -> Self {
        Self {
            api_url: config.api_url(),
            user_agent: config.user_agent(),
            timeout_ms: config.timeout_ms(),
            max_retries: config.retries(),
            retry_delay_ms: config.retry_delay_ms(),
            rate_limit_ms: config.rate_limit_ms(),
        }
    }
}

/// Blocking client for the WordPress REST API (`/wp-json/wp/v2`).
pub struct WordPressClient {
    client: Client,
    config: WordPressClientConfig,
    last_request_at: Option<Instant>,
    request_count: usize,
}

impl WordPressClient {
    pub fn new(config: WordPressClientConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("failed to build WordPress HTTP client")?;

        Ok(Self {
            client,
            config,
            last_request_at: None,
            request_count: 0,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.config.api_url
    }

    fn apply_rate_limit(&mut self) {
        let delay = Duration::from_millis(self.config.rate_limit_ms);
        if let Some(last) = self.last_request_at {
            let elapsed = last.elapsed();
            if elapsed < delay {
                sleep(delay - elapsed);
            }
        }
        self.last_request_at = Some(Instant::now());
        self.request_count += 1;
    }

    fn wait_before_retry(&self, attempt: usize) {
        let exponent = u32::try_from(attempt).unwrap_or(16);
        let base = self
            .config
            .retry_delay_ms
            .saturating_mul(2u64.saturating_pow(exponent));
        let jitter = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| u64::from(duration.subsec_millis() % 100))
            .unwrap_or(0);
        sleep(Duration::from_millis(base.saturating_add(jitter)));
    }
}

impl PageSource for WordPressClient {
    fn fetch_page(&mut self, collection: &str, params: &[(String, String)]) -> Result<PageResponse> {
        let url = format!("{}/{collection}", self.config.api_url);

        for attempt in 0..=self.config.max_retries {
            self.apply_rate_limit();
            let response = self
                .client
                .get(&url)
                .header(USER_AGENT, self.config.user_agent.clone())
                .query(params)
                .send();

            match response {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        if attempt < self.config.max_retries && is_retryable_status(status) {
                            warn!(collection, %status, attempt, "retrying request");
                            self.wait_before_retry(attempt);
                            continue;
                        }
                        return Err(MigrateError::transport(collection, format!("HTTP {status}")));
                    }

                    let total_items = parse_total(response.headers().get(TOTAL_ITEMS_HEADER));
                    let total_pages = parse_total(response.headers().get(TOTAL_PAGES_HEADER));
                    let items: Vec<Record> = response.json().map_err(|error| {
                        MigrateError::malformed(collection, format!("expected JSON array: {error}"))
                    })?;
                    return Ok(PageResponse {
                        total_items,
                        total_pages,
                        items,
                    });
                }
                Err(error) => {
                    if attempt < self.config.max_retries && is_retryable_error(&error) {
                        warn!(collection, %error, attempt, "retrying request");
                        self.wait_before_retry(attempt);
                        continue;
                    }
                    return Err(MigrateError::transport(collection, error.to_string()));
                }
            }
        }

        Err(MigrateError::transport(collection, "retry budget exhausted"))
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}

fn parse_total(value: Option<&HeaderValue>) -> Option<u64> {
    value
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}
