//! Scraper adapter: issues the periodic GET against each discovered
//! target, decodes the response, tags spans with the target's labels, and
//! appends them to a store.
//!
//! Scheduling and service discovery are ordinarily an external scrape
//! framework's job; this crate defines only the adapter's interface
//! (`Appender`, `Offset`, `NeedsThrottling`) plus a minimal scheduler
//! (`spawn_scrape_loops`) good enough to run standalone.

use crate::core::config::Target;
use crate::core::error::{LokiError, Result};
use crate::model::codec::decode_spans;
use crate::model::{Span, Tag};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Cap on a single scrape response body, so a misbehaving agent can't make
/// the scraper buffer unbounded memory.
pub const MAX_SCRAPE_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Anything a scraped span can be handed to. Implemented by
/// [`crate::storage::SpanStore`]; a trait so tests can substitute a fake.
pub trait Appender: Send + Sync {
    /// Append one decoded, tagged span.
    fn append(&self, span: Span);
}

impl Appender for crate::storage::SpanStore {
    fn append(&self, span: Span) {
        crate::storage::SpanStore::append(self, span)
    }
}

/// Per-target scraper: one `GET`, one decode, one batch of appends.
pub struct Scraper {
    client: reqwest::Client,
    target: Target,
    label_tags: Vec<Tag>,
}

impl Scraper {
    /// Build a scraper for `target`.
    pub fn new(target: Target) -> Self {
        let mut label_tags = vec![
            Tag::string(crate::model::JOB_LABEL, target.job_name.clone()),
            Tag::string(crate::model::INSTANCE_LABEL, target.instance.clone()),
        ];
        for (k, v) in &target.labels {
            label_tags.push(Tag::string(k.clone(), v.clone()));
        }
        Scraper {
            client: reqwest::Client::new(),
            target,
            label_tags,
        }
    }

    /// Scheduling offset within `interval`; this scheduler applies none.
    pub fn offset(&self, interval: Duration) -> Duration {
        interval
    }

    /// Whether the scheduler should back off before the next round. Flow
    /// control lives in the HTTP client's timeout, so always `false`.
    pub fn needs_throttling(&self) -> bool {
        false
    }

    /// One scrape round: GET, assert 200, decode, tag, append. Any error
    /// aborts this round only.
    pub async fn scrape(&self, appender: &dyn Appender) -> Result<usize> {
        let response = self
            .client
            .get(&self.target.url)
            .timeout(self.target.scrape_timeout)
            .send()
            .await
            .map_err(|e| LokiError::scrape(format!("{}: {e}", self.target.url)))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(LokiError::scrape(format!(
                "{}: server returned HTTP status {}",
                self.target.url,
                response.status()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| LokiError::scrape(format!("{}: {e}", self.target.url)))?;
        if body.len() > MAX_SCRAPE_BODY_BYTES {
            return Err(LokiError::scrape(format!(
                "{}: response exceeds max scrape body size",
                self.target.url
            )));
        }

        let mut spans = decode_spans(&body)
            .map_err(|e| LokiError::decode(format!("{}: {e}", self.target.url)))?;
        let count = spans.len();
        for mut span in spans.drain(..) {
            span.tags.extend(self.label_tags.clone());
            appender.append(span);
        }
        Ok(count)
    }
}

/// Spawn one scheduling task per target; each runs a `tokio::time::interval`
/// loop at the target's configured cadence until `shutdown` fires.
pub fn spawn_scrape_loops(
    targets: Vec<Target>,
    appender: Arc<dyn Appender>,
    shutdown: watch::Receiver<bool>,
) -> Vec<tokio::task::JoinHandle<()>> {
    targets
        .into_iter()
        .map(|target| {
            let appender = appender.clone();
            let mut shutdown = shutdown.clone();
            tokio::spawn(async move {
                let scraper = Scraper::new(target);
                let mut ticker = tokio::time::interval(scraper.offset(scraper.target.scrape_interval));
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            match scraper.scrape(appender.as_ref()).await {
                                Ok(n) => tracing::info!(target = %scraper.target.url, spans = n, "scraped"),
                                Err(e) => tracing::error!(target = %scraper.target.url, error = %e, "scrape failed"),
                            }
                        }
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() {
                                break;
                            }
                        }
                    }
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct CollectingAppender(Mutex<Vec<Span>>);

    impl Appender for CollectingAppender {
        fn append(&self, span: Span) {
            self.0.lock().push(span);
        }
    }

    fn target(url: String) -> Target {
        Target {
            job_name: "frontend".into(),
            url,
            instance: "10.0.0.1:8080".into(),
            labels: std::collections::HashMap::new(),
            scrape_interval: Duration::from_secs(15),
            scrape_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn scrape_tags_spans_with_job_and_instance() {
        let server = MockServer::start().await;
        let span = Span::new(
            1,
            1,
            0,
            "op",
            std::time::SystemTime::UNIX_EPOCH,
            std::time::SystemTime::UNIX_EPOCH + Duration::from_micros(1),
        )
        .unwrap();
        let body = crate::model::codec::encode_spans(std::slice::from_ref(&span)).to_vec();

        Mock::given(method("GET"))
            .and(path("/debug/spans"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&server)
            .await;

        let scraper = Scraper::new(target(format!("{}/debug/spans", server.uri())));
        let appender = CollectingAppender(Mutex::new(Vec::new()));
        let n = scraper.scrape(&appender).await.unwrap();
        assert_eq!(n, 1);

        let stored = appender.0.lock();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].job(), Some("frontend"));
        assert_eq!(stored[0].instance(), Some("10.0.0.1:8080"));
    }

    #[tokio::test]
    async fn scrape_aborts_on_non_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/debug/spans"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let scraper = Scraper::new(target(format!("{}/debug/spans", server.uri())));
        let appender = CollectingAppender(Mutex::new(Vec::new()));
        assert!(scraper.scrape(&appender).await.is_err());
        assert!(appender.0.lock().is_empty());
    }

    #[tokio::test]
    async fn scrape_aborts_on_corrupt_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/debug/spans"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1, 2, 3]))
            .mount(&server)
            .await;

        let scraper = Scraper::new(target(format!("{}/debug/spans", server.uri())));
        let appender = CollectingAppender(Mutex::new(Vec::new()));
        assert!(scraper.scrape(&appender).await.is_err());
    }

    #[test]
    fn offset_and_throttling_are_fixed_values() {
        let scraper = Scraper::new(target("http://example.com".into()));
        assert_eq!(scraper.offset(Duration::from_secs(15)), Duration::from_secs(15));
        assert!(!scraper.needs_throttling());
    }
}
