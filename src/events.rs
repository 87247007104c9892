// Reader events pushed to the front end
use serde::Serialize;
use tokio::sync::broadcast;

use crate::audio::player::PlaybackState;
use crate::selection::SelectionAnchor;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReaderEvent {
    /// Emitted every frame while playing; drives the scrubber
    PlaybackProgress {
        article_id: String,
        position_seconds: f64,
        duration_seconds: f64,
    },
    PlaybackStateChanged {
        article_id: String,
        state: PlaybackState,
    },
    PlaybackEnded {
        article_id: String,
    },
    AudioLoading {
        article_id: String,
        loading: bool,
    },
    /// User-visible notice, shown as an alert
    Notice {
        message: String,
    },
    /// Smoothly scroll so the block is centered in the viewport
    ScrollToBlock {
        article_id: String,
        block_index: usize,
    },
    ScrollToTop {
        article_id: String,
    },
    ProgressHighlight {
        article_id: String,
        block_index: Option<usize>,
    },
    SelectionChanged {
        anchor: Option<SelectionAnchor>,
    },
    /// Remove the live text selection from the document
    ClearSelection,
    SummaryLoading {
        article_id: String,
        loading: bool,
    },
    SummaryReady {
        article_id: String,
        summary: String,
    },
    FocusModeChanged {
        enabled: bool,
    },
}

/// One-to-many event broadcasting
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ReaderEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReaderEvent> {
        self.tx.subscribe()
    }

    /// Emit to all subscribers. Nobody listening is fine.
    pub fn emit(&self, event: ReaderEvent) {
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
pub(crate) fn drain(rx: &mut broadcast::Receiver<ReaderEvent>) -> Vec<ReaderEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(4);
        bus.emit(ReaderEvent::ClearSelection);
    }

    #[test]
    fn test_subscriber_receives_events_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.emit(ReaderEvent::FocusModeChanged { enabled: true });
        bus.emit(ReaderEvent::ScrollToTop { article_id: "a".to_string() });
        assert_eq!(
            drain(&mut rx),
            vec![
                ReaderEvent::FocusModeChanged { enabled: true },
                ReaderEvent::ScrollToTop { article_id: "a".to_string() },
            ]
        );
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_value(ReaderEvent::ScrollToBlock {
            article_id: "a".to_string(),
            block_index: 3,
        })
        .unwrap();
        assert_eq!(json["type"], "scroll_to_block");
        assert_eq!(json["block_index"], 3);
    }
}
