// Reading progress tracking
// Persists the most recently dominant block of an article and restores the
// scroll position when the article is opened again.

pub mod visibility;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::db::KeyValueStore;
use crate::events::{EventBus, ReaderEvent};
use crate::settings::settings::ProgressSettings;
use visibility::{Crossing, Span, VisibilityObserver};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingMark {
    pub article_id: String,
    pub block_index: usize,
}

/// Storage key for an article's mark
pub fn storage_key(namespace: &str, article_id: &str) -> String {
    format!("{}_{}", namespace, article_id)
}

pub struct ReadingTracker {
    article_id: String,
    key: String,
    block_count: usize,
    store: Arc<dyn KeyValueStore>,
    events: EventBus,
    observer: VisibilityObserver,
    restore_delay: Duration,
    highlighted: Option<usize>,
    pending_restore: Option<JoinHandle<()>>,
}

impl ReadingTracker {
    pub fn new(
        article_id: impl Into<String>,
        block_count: usize,
        namespace: &str,
        settings: &ProgressSettings,
        store: Arc<dyn KeyValueStore>,
        events: EventBus,
    ) -> Self {
        let article_id = article_id.into();
        let mut observer = VisibilityObserver::new(settings.dominance_threshold);
        observer.observe_range(block_count);
        Self {
            key: storage_key(namespace, &article_id),
            article_id,
            block_count,
            store,
            events,
            observer,
            restore_delay: settings.restore_delay(),
            highlighted: None,
            pending_restore: None,
        }
    }

    pub fn article_id(&self) -> &str {
        &self.article_id
    }

    /// Block shown as "where you left off", if any
    pub fn highlighted(&self) -> Option<usize> {
        self.highlighted
    }

    /// Read the persisted mark. Storage failures read as "no mark".
    pub fn saved_mark(&self) -> Option<ReadingMark> {
        let value = match self.store.get(&self.key) {
            Ok(value) => value?,
            Err(e) => {
                warn!(article_id = %self.article_id, error = %e, "Reading progress unavailable");
                return None;
            }
        };
        match value.trim().parse::<usize>() {
            Ok(block_index) => Some(ReadingMark {
                article_id: self.article_id.clone(),
                block_index,
            }),
            Err(_) => {
                debug!(article_id = %self.article_id, %value, "Ignoring unreadable reading mark");
                None
            }
        }
    }

    /// Highlight the saved block and schedule one smooth scroll to it once
    /// layout has settled.
    pub fn restore(&mut self) -> Option<usize> {
        let mark = self.saved_mark()?;
        if mark.block_index >= self.block_count {
            debug!(
                article_id = %self.article_id,
                block_index = mark.block_index,
                "Saved block no longer exists"
            );
            return None;
        }

        let block_index = mark.block_index;
        self.highlighted = Some(block_index);
        self.events.emit(ReaderEvent::ProgressHighlight {
            article_id: self.article_id.clone(),
            block_index: Some(block_index),
        });

        self.cancel_pending_restore();
        let scroll = ReaderEvent::ScrollToBlock {
            article_id: self.article_id.clone(),
            block_index,
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let events = self.events.clone();
                let delay = self.restore_delay;
                self.pending_restore = Some(handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    events.emit(scroll);
                }));
            }
            Err(_) => self.events.emit(scroll),
        }

        debug!(article_id = %self.article_id, block_index, "Restoring reading position");
        Some(block_index)
    }

    /// Feed a block's visible ratio. Returns the mark written when the block
    /// just became dominant.
    pub fn on_visibility(&mut self, block_index: usize, ratio: f32) -> Option<ReadingMark> {
        match self.observer.update(block_index, ratio)? {
            Crossing::Entered(index) => Some(self.mark_dominant(index)),
            Crossing::Left(_) => None,
        }
    }

    /// Feed the whole viewport geometry. The last block to become dominant wins.
    pub fn on_viewport(&mut self, viewport: Span, blocks: &[(usize, Span)]) -> Option<ReadingMark> {
        let mut written = None;
        for crossing in self.observer.measure(viewport, blocks) {
            if let Crossing::Entered(index) = crossing {
                written = Some(self.mark_dominant(index));
            }
        }
        written
    }

    fn mark_dominant(&mut self, block_index: usize) -> ReadingMark {
        if let Err(e) = self.store.set(&self.key, &block_index.to_string()) {
            warn!(article_id = %self.article_id, block_index, error = %e, "Failed to save reading progress");
        }
        if self.highlighted.is_some_and(|h| h != block_index) {
            self.highlighted = None;
            self.events.emit(ReaderEvent::ProgressHighlight {
                article_id: self.article_id.clone(),
                block_index: None,
            });
        }
        ReadingMark {
            article_id: self.article_id.clone(),
            block_index,
        }
    }

    /// Forget the mark and go back to the top. Safe to call repeatedly.
    pub fn reset_progress(&mut self) {
        self.cancel_pending_restore();
        if let Err(e) = self.store.remove(&self.key) {
            warn!(article_id = %self.article_id, error = %e, "Failed to clear reading progress");
        }
        self.highlighted = None;
        self.events.emit(ReaderEvent::ProgressHighlight {
            article_id: self.article_id.clone(),
            block_index: None,
        });
        self.events.emit(ReaderEvent::ScrollToTop {
            article_id: self.article_id.clone(),
        });
    }

    /// Stop observing; called when the view goes away
    pub fn close(&mut self) {
        self.cancel_pending_restore();
        self.observer.disconnect();
        self.highlighted = None;
    }

    fn cancel_pending_restore(&mut self) {
        if let Some(pending) = self.pending_restore.take() {
            pending.abort();
        }
    }
}

impl Drop for ReadingTracker {
    fn drop(&mut self) {
        self.cancel_pending_restore();
    }
}
