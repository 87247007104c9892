// Article summary panel
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::events::{EventBus, ReaderEvent};
use crate::providers::Summarizer;

#[derive(Default)]
struct SummaryInner {
    summary: Option<String>,
    loading: bool,
}

pub struct SummaryPanel {
    article_id: String,
    text: String,
    summarizer: Arc<dyn Summarizer>,
    events: EventBus,
    inner: Mutex<SummaryInner>,
}

impl SummaryPanel {
    pub fn new(
        article_id: impl Into<String>,
        text: impl Into<String>,
        summarizer: Arc<dyn Summarizer>,
        events: EventBus,
    ) -> Self {
        Self {
            article_id: article_id.into(),
            text: text.into(),
            summarizer,
            events,
            inner: Mutex::new(SummaryInner::default()),
        }
    }

    pub fn summary(&self) -> Option<String> {
        self.inner.lock().summary.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.lock().loading
    }

    /// Produce the summary once. Failures leave the panel empty and are not
    /// reported to the reader.
    pub async fn request(&self) -> Option<String> {
        {
            let mut inner = self.inner.lock();
            if let Some(summary) = &inner.summary {
                return Some(summary.clone());
            }
            if inner.loading {
                debug!(article_id = %self.article_id, "Summary already in progress");
                return None;
            }
            inner.loading = true;
        }
        self.events.emit(ReaderEvent::SummaryLoading {
            article_id: self.article_id.clone(),
            loading: true,
        });

        let summary = match self.summarizer.summarize(&self.text).await {
            Ok(summary) if !summary.trim().is_empty() => Some(summary),
            Ok(_) => {
                warn!(article_id = %self.article_id, "Summarizer returned nothing");
                None
            }
            Err(e) => {
                warn!(article_id = %self.article_id, error = %e, "Summarizer failed");
                None
            }
        };

        {
            let mut inner = self.inner.lock();
            inner.loading = false;
            inner.summary = summary.clone();
        }
        self.events.emit(ReaderEvent::SummaryLoading {
            article_id: self.article_id.clone(),
            loading: false,
        });
        if let Some(summary) = &summary {
            self.events.emit(ReaderEvent::SummaryReady {
                article_id: self.article_id.clone(),
                summary: summary.clone(),
            });
        }
        summary
    }
}


#[cfg(test)]
mod tests {
    use super::testing::CannedSummary;
    use super::*;

    #[tokio::test]
    async fn test_summary_is_memoized() {
        let summarizer = Arc::new(CannedSummary::new(Some("In short: things happened.")));
        let panel = SummaryPanel::new("a1", "long text", summarizer.clone(), EventBus::new(8));
        assert_eq!(panel.request().await.as_deref(), Some("In short: things happened."));
        assert_eq!(panel.request().await.as_deref(), Some("In short: things happened."));
        assert_eq!(summarizer.calls(), 1);
        assert!(!panel.is_loading());
    }

    #[tokio::test]
    async fn test_failure_is_tolerated_and_retryable() {
        let summarizer = Arc::new(CannedSummary::new(None));
        let panel = SummaryPanel::new("a1", "long text", summarizer.clone(), EventBus::new(8));
        assert_eq!(panel.request().await, None);
        assert_eq!(panel.summary(), None);
        assert!(!panel.is_loading());
        assert_eq!(panel.request().await, None);
        assert_eq!(summarizer.calls(), 2);
    }

    #[tokio::test]
    async fn test_blank_summary_counts_as_none() {
        let summarizer = Arc::new(CannedSummary::new(Some("  ")));
        let panel = SummaryPanel::new("a1", "long text", summarizer, EventBus::new(8));
        assert_eq!(panel.request().await, None);
    }
}
