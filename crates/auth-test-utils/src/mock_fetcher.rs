//! Scripted `HttpFetch` implementation for unit-level tests.
//!
//! `MockFetcher` answers every call from a script instead of the network,
//! counts calls, and can delay responses (honouring tokio's paused clock).

use async_trait::async_trait;
use auth_gateway::http_client::{FetchError, HttpFetch, HttpResponse};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type Scripted = Result<HttpResponse, FetchError>;

/// Mock identity-provider transport.
///
/// Queued responses are served first, in order; afterwards every call gets
/// the fallback response.
///
/// # Example
/// ```rust,ignore
/// let fetcher = Arc::new(MockFetcher::serving_json(200, &jwks_json(&[&key])));
/// let cache = KeySetCache::new("http://idp/certs", fetcher.clone());
/// cache.force_refresh().await?;
/// assert_eq!(fetcher.get_calls(), 1);
/// ```
pub struct MockFetcher {
    queued: Mutex<VecDeque<Scripted>>,
    fallback: Mutex<Scripted>,
    delay: Mutex<Option<Duration>>,
    get_calls: AtomicUsize,
    post_calls: AtomicUsize,
    last_url: Mutex<Option<String>>,
    last_form: Mutex<Vec<(String, String)>>,
}

impl MockFetcher {
    /// A fetcher that fails every call with a transport error.
    pub fn new() -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Err(FetchError::Transport("no response scripted".to_string()))),
            delay: Mutex::new(None),
            get_calls: AtomicUsize::new(0),
            post_calls: AtomicUsize::new(0),
            last_url: Mutex::new(None),
            last_form: Mutex::new(Vec::new()),
        }
    }

    /// A fetcher that answers every call with `status` and `body`.
    pub fn serving_json(status: u16, body: &Value) -> Self {
        let fetcher = Self::new();
        fetcher.respond_with(Ok(HttpResponse::new(status, body.to_string())));
        fetcher
    }

    /// Replace the fallback response.
    pub fn respond_with(&self, response: Scripted) {
        *self.fallback.lock().unwrap() = response;
    }

    /// Replace the fallback with a JSON body.
    pub fn respond_with_json(&self, status: u16, body: &Value) {
        self.respond_with(Ok(HttpResponse::new(status, body.to_string())));
    }

    /// Queue a one-shot response ahead of the fallback.
    pub fn push_response(&self, response: Scripted) {
        self.queued.lock().unwrap().push_back(response);
    }

    /// Delay every response by `delay`.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn post_calls(&self) -> usize {
        self.post_calls.load(Ordering::SeqCst)
    }

    /// URL of the most recent call.
    pub fn last_url(&self) -> Option<String> {
        self.last_url.lock().unwrap().clone()
    }

    /// Form fields of the most recent POST.
    pub fn last_form(&self) -> Vec<(String, String)> {
        self.last_form.lock().unwrap().clone()
    }

    async fn answer(&self, url: &str) -> Scripted {
        *self.last_url.lock().unwrap() = Some(url.to_string());

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self.queued.lock().unwrap().pop_front();
        match queued {
            Some(response) => response,
            None => self.fallback.lock().unwrap().clone(),
        }
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpFetch for MockFetcher {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.answer(url).await
    }

    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<HttpResponse, FetchError> {
        self.post_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_form.lock().unwrap() = form
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        self.answer(url).await
    }
}
