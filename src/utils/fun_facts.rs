#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use thiserror::Error;

use crate::utils::config::Config;
use crate::utils::errors::Errors;

// ***************************************************************************
//                                Constants
// ***************************************************************************
pub const FETCH_FAILED_FACT : &str = "Could not fetch fun fact";
pub const READ_FAILED_FACT  : &str = "Error reading fun fact";

// Replaced with the integer in the configured URL template.
pub const NUMBER_PLACEHOLDER : &str = "{number}";

// ***************************************************************************
//                                 Errors
// ***************************************************************************
/// Failures of the upstream fun fact lookup.  None of these ever fail a
/// request; they select the fallback text instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FactError {
    #[error("Unable to fetch fun fact: {}", .0)]
    Fetch(String),

    #[error("Unable to read fun fact response: {}", .0)]
    Read(String),
}

impl FactError {
    pub fn fallback_text(&self) -> &'static str {
        match self {
            FactError::Fetch(_) => FETCH_FAILED_FACT,
            FactError::Read(_) => READ_FAILED_FACT,
        }
    }
}

// ***************************************************************************
//                              FactProvider
// ***************************************************************************
/// A fact as returned by the upstream.  Only facts that came back with a
/// success status may be remembered; error pages are shown once and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fact {
    pub text: String,
    pub cacheable: bool,
}

impl Fact {
    pub fn new(text: String, cacheable: bool) -> Self {
        Self {text, cacheable}
    }
}

/// Source of human readable facts about integers.
#[async_trait]
pub trait FactProvider: Send + Sync {
    async fn fetch_fact(&self, number: i64) -> Result<Fact, FactError>;
}

// ---------------------------------------------------------------------------
// fun_fact:
// ---------------------------------------------------------------------------
/** Best effort lookup.  Errors are logged and replaced by the fixed fallback
 * text so the caller always gets a string.
 */
pub async fn fun_fact(provider: &dyn FactProvider, number: i64) -> String {
    match provider.fetch_fact(number).await {
        Ok(fact) => fact.text,
        Err(e) => {
            warn!("{}", e);
            e.fallback_text().to_string()
        }
    }
}

// ---------------------------------------------------------------------------
// init_fact_provider:
// ---------------------------------------------------------------------------
/** Build the provider described by the configuration: the Numbers API client,
 * wrapped in a cache unless the cache size is zero.
 */
pub fn init_fact_provider(config: &Config) -> Result<Arc<dyn FactProvider>> {
    let api = NumbersApiProvider::new(&config.fun_fact_url,
                                      Duration::from_millis(config.fun_fact_timeout_ms))?;
    if config.fun_fact_cache_size == 0 {
        Ok(Arc::new(api))
    } else {
        Ok(Arc::new(CachingFactProvider::new(api, config.fun_fact_cache_size)))
    }
}

// ***************************************************************************
//                           NumbersApiProvider
// ***************************************************************************
/// Fetches facts over HTTP.  The response body is used verbatim whatever
/// the status code, but only 2xx bodies are marked cacheable.
pub struct NumbersApiProvider {
    client: Client,
    url_template: String,
}

impl NumbersApiProvider {
    pub fn new(url_template: &str, timeout: Duration) -> Result<Self> {
        if !url_template.contains(NUMBER_PLACEHOLDER) {
            return Err(anyhow!(Errors::FactClientError(
                format!("URL template {} has no {} placeholder", url_template, NUMBER_PLACEHOLDER))));
        }
        let client = match Client::builder().timeout(timeout).build() {
            Ok(c) => c,
            Err(e) => return Err(anyhow!(Errors::FactClientError(e.to_string()))),
        };
        Ok(Self {client, url_template: url_template.to_string()})
    }

    fn url_for(&self, number: i64) -> String {
        self.url_template.replace(NUMBER_PLACEHOLDER, &number.to_string())
    }
}

#[async_trait]
impl FactProvider for NumbersApiProvider {
    async fn fetch_fact(&self, number: i64) -> Result<Fact, FactError> {
        let url = self.url_for(number);
        debug!("Fetching fun fact from {}", url);

        let resp = self.client.get(&url).send().await
            .map_err(|e| FactError::Fetch(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            warn!("Fun fact upstream returned {} for {}", status, number);
        }
        let text = resp.text().await.map_err(|e| FactError::Read(e.to_string()))?;
        Ok(Fact::new(text, status.is_success()))
    }
}

// ***************************************************************************
//                           CachingFactProvider
// ***************************************************************************
/// Remembers successful lookups so repeated requests for the same number
/// skip the upstream call.  Failures and facts not marked cacheable are not
/// stored.  Once capacity entries are held, new facts are returned but not
/// stored either.
pub struct CachingFactProvider<P> {
    inner: P,
    capacity: usize,
    cache: Mutex<HashMap<i64, String>>,
}

impl<P: FactProvider> CachingFactProvider<P> {
    pub fn new(inner: P, capacity: usize) -> Self {
        Self {inner, capacity, cache: Mutex::new(HashMap::new())}
    }

    fn lookup(&self, number: i64) -> Option<String> {
        match self.cache.lock() {
            Ok(cache) => cache.get(&number).cloned(),
            Err(_) => None,
        }
    }

    fn store(&self, number: i64, fact: &Fact) {
        if !fact.cacheable {
            return;
        }
        if let Ok(mut cache) = self.cache.lock() {
            if cache.len() < self.capacity {
                cache.insert(number, fact.text.clone());
            }
        }
    }
}

#[async_trait]
impl<P: FactProvider> FactProvider for CachingFactProvider<P> {
    async fn fetch_fact(&self, number: i64) -> Result<Fact, FactError> {
        if let Some(text) = self.lookup(number) {
            debug!("Fun fact cache hit for {}", number);
            return Ok(Fact::new(text, true));
        }
        let fact = self.inner.fetch_fact(number).await?;
        self.store(number, &fact);
        Ok(fact)
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // Counts upstream calls and fails for negative numbers.
    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FactProvider for CountingProvider {
        async fn fetch_fact(&self, number: i64) -> Result<Fact, FactError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if number < 0 {
                Err(FactError::Fetch("refused".to_string()))
            } else {
                Ok(Fact::new(format!("{} is a number.", number), true))
            }
        }
    }

    fn counting() -> CountingProvider {
        CountingProvider {calls: AtomicUsize::new(0)}
    }

    fn template(server: &MockServer) -> String {
        format!("{}/{}/math", server.uri(), NUMBER_PLACEHOLDER)
    }

    #[tokio::test]
    async fn body_is_used_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/371/math"))
            .respond_with(ResponseTemplate::new(200)
                .set_body_string("371 is a narcissistic number."))
            .expect(1)
            .mount(&server)
            .await;

        let provider = NumbersApiProvider::new(&template(&server), Duration::from_secs(2)).unwrap();
        assert_eq!(fun_fact(&provider, 371).await, "371 is a narcissistic number.");
    }

    #[tokio::test]
    async fn error_status_body_is_still_the_fact() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/-5/math"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no fact"))
            .mount(&server)
            .await;

        let provider = NumbersApiProvider::new(&template(&server), Duration::from_secs(2)).unwrap();
        assert_eq!(provider.fetch_fact(-5).await, Ok(Fact::new("no fact".to_string(), false)));
    }

    #[tokio::test]
    async fn slow_upstream_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200)
                .set_body_string("too late")
                .set_delay(Duration::from_millis(1500)))
            .mount(&server)
            .await;

        let provider = NumbersApiProvider::new(&template(&server), Duration::from_millis(100)).unwrap();
        assert_eq!(fun_fact(&provider, 6).await, FETCH_FAILED_FACT);
    }

    #[tokio::test]
    async fn unreachable_upstream_falls_back() {
        let provider = NumbersApiProvider::new("http://127.0.0.1:1/{number}/math",
                                               Duration::from_millis(500)).unwrap();
        assert_eq!(fun_fact(&provider, 28).await, FETCH_FAILED_FACT);
    }

    #[test]
    fn template_needs_placeholder() {
        assert!(NumbersApiProvider::new("http://numbersapi.com/math", Duration::from_secs(1)).is_err());
        let p = NumbersApiProvider::new("http://numbersapi.com/{number}/math", Duration::from_secs(1)).unwrap();
        assert_eq!(p.url_for(-12), "http://numbersapi.com/-12/math");
    }

    #[test]
    fn fallback_texts() {
        assert_eq!(FactError::Fetch("x".to_string()).fallback_text(), "Could not fetch fun fact");
        assert_eq!(FactError::Read("x".to_string()).fallback_text(), "Error reading fun fact");
    }

    #[tokio::test]
    async fn cache_hits_skip_upstream() {
        let cached = CachingFactProvider::new(counting(), 8);
        assert_eq!(fun_fact(&cached, 6).await, "6 is a number.");
        assert_eq!(fun_fact(&cached, 6).await, "6 is a number.");
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cached = CachingFactProvider::new(counting(), 8);
        assert_eq!(fun_fact(&cached, -1).await, FETCH_FAILED_FACT);
        assert_eq!(fun_fact(&cached, -1).await, FETCH_FAILED_FACT);
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn full_cache_stops_storing() {
        let cached = CachingFactProvider::new(counting(), 1);
        cached.fetch_fact(1).await.unwrap();
        cached.fetch_fact(2).await.unwrap();
        cached.fetch_fact(2).await.unwrap();
        cached.fetch_fact(1).await.unwrap();
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn error_pages_are_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/6/math"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/6/math"))
            .respond_with(ResponseTemplate::new(200).set_body_string("6 is perfect."))
            .expect(1)
            .mount(&server)
            .await;

        let api = NumbersApiProvider::new(&template(&server), Duration::from_secs(2)).unwrap();
        let cached = CachingFactProvider::new(api, 8);
        assert_eq!(fun_fact(&cached, 6).await, "Service Unavailable");
        assert_eq!(fun_fact(&cached, 6).await, "6 is perfect.");
        // Served from the cache; the 200 mock expects exactly one call.
        assert_eq!(fun_fact(&cached, 6).await, "6 is perfect.");
    }

    #[tokio::test]
    async fn uncacheable_facts_are_refetched() {
        struct Flaky;

        #[async_trait]
        impl FactProvider for Flaky {
            async fn fetch_fact(&self, number: i64) -> Result<Fact, FactError> {
                Ok(Fact::new(format!("upstream busy for {}", number), false))
            }
        }

        let cached = CachingFactProvider::new(Flaky, 8);
        cached.fetch_fact(3).await.unwrap();
        assert_eq!(cached.lookup(3), None);
    }

    #[test]
    fn zero_cache_size_builds_plain_client() {
        let config = Config {fun_fact_cache_size: 0, ..Config::default()};
        assert!(init_fact_provider(&config).is_ok());
    }
}
