// Selection-to-quote detection
// Turns text selections inside the article body into a floating
// "share quote" anchor.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::events::{EventBus, ReaderEvent};
use crate::providers::ShareTarget;

/// Screen-space bounding box of a selection range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

/// What the document reports on a selection change
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionSnapshot {
    pub text: String,
    /// Whether the selection's anchor node lies inside the content container
    pub inside_content: bool,
    /// Bounding box of the first range, absent when there is no range
    pub bounds: Option<Rect>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionAnchor {
    pub top_px: f64,
    pub left_px: f64,
    pub text: String,
}

pub struct SelectionDetector {
    anchor: Option<SelectionAnchor>,
    offset_px: f64,
    share_target: Arc<dyn ShareTarget>,
    events: EventBus,
}

impl SelectionDetector {
    pub fn new(offset_px: f64, share_target: Arc<dyn ShareTarget>, events: EventBus) -> Self {
        Self {
            anchor: None,
            offset_px,
            share_target,
            events,
        }
    }

    pub fn anchor(&self) -> Option<&SelectionAnchor> {
        self.anchor.as_ref()
    }

    /// Recompute the anchor for a selection-change notification
    pub fn on_selection_change(&mut self, snapshot: &SelectionSnapshot) -> Option<&SelectionAnchor> {
        self.anchor = match snapshot.bounds {
            Some(rect) if snapshot.inside_content && !snapshot.text.trim().is_empty() => {
                Some(SelectionAnchor {
                    top_px: rect.top - self.offset_px,
                    left_px: rect.left + rect.width / 2.0,
                    text: snapshot.text.clone(),
                })
            }
            _ => None,
        };
        self.events.emit(ReaderEvent::SelectionChanged {
            anchor: self.anchor.clone(),
        });
        self.anchor.as_ref()
    }

    /// Share an explicit text, else the selected text, else `fallback`.
    /// Clears the anchor and the live selection. Returns what was shared.
    pub fn share_quote(&mut self, text_override: Option<&str>, fallback: &str) -> String {
        let text = text_override
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .or_else(|| self.anchor.take().map(|a| a.text))
            .unwrap_or_else(|| fallback.to_string());

        debug!(chars = text.chars().count(), "Sharing quote");
        self.share_target.share(&text);

        self.clear();
        self.events.emit(ReaderEvent::ClearSelection);
        text
    }

    pub fn clear(&mut self) {
        if self.anchor.take().is_some() {
            self.events.emit(ReaderEvent::SelectionChanged { anchor: None });
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct RecordingShare {
        pub shared: Mutex<Vec<String>>,
    }

    impl ShareTarget for RecordingShare {
        fn share(&self, text: &str) {
            self.shared.lock().push(text.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingShare;
    use super::*;
    use crate::events::drain;

    fn snapshot(text: &str, inside: bool) -> SelectionSnapshot {
        SelectionSnapshot {
            text: text.to_string(),
            inside_content: inside,
            bounds: Some(Rect { top: 200.0, left: 40.0, width: 120.0, height: 18.0 }),
        }
    }

    fn detector() -> (Arc<RecordingShare>, SelectionDetector, EventBus) {
        let share = Arc::new(RecordingShare::default());
        let events = EventBus::new(16);
        let detector = SelectionDetector::new(10.0, share.clone(), events.clone());
        (share, detector, events)
    }

    #[test]
    fn test_anchor_above_and_centered() {
        let (_share, mut detector, _events) = detector();
        let anchor = detector.on_selection_change(&snapshot("a fine line", true)).cloned();
        assert_eq!(
            anchor,
            Some(SelectionAnchor { top_px: 190.0, left_px: 100.0, text: "a fine line".to_string() })
        );
    }

    #[test]
    fn test_blank_or_outside_selection_clears() {
        let (_share, mut detector, _events) = detector();
        detector.on_selection_change(&snapshot("quote", true));
        assert!(detector.on_selection_change(&snapshot("   ", true)).is_none());

        detector.on_selection_change(&snapshot("quote", true));
        assert!(detector.on_selection_change(&snapshot("quote", false)).is_none());

        let no_range = SelectionSnapshot { text: "quote".to_string(), inside_content: true, bounds: None };
        assert!(detector.on_selection_change(&no_range).is_none());
    }

    #[test]
    fn test_share_consumes_anchor_and_clears_selection() {
        let (share, mut detector, events) = detector();
        let mut rx = events.subscribe();
        detector.on_selection_change(&snapshot("worth quoting", true));

        assert_eq!(detector.share_quote(None, "subtitle"), "worth quoting");
        assert!(detector.anchor().is_none());
        assert_eq!(*share.shared.lock(), vec!["worth quoting".to_string()]);
        assert!(drain(&mut rx).contains(&ReaderEvent::ClearSelection));
    }

    #[test]
    fn test_share_precedence() {
        let (share, mut detector, _events) = detector();
        detector.on_selection_change(&snapshot("selected", true));
        assert_eq!(detector.share_quote(Some("explicit"), "subtitle"), "explicit");
        assert!(detector.anchor().is_none());
        assert_eq!(detector.share_quote(None, "subtitle"), "subtitle");
        assert_eq!(
            *share.shared.lock(),
            vec!["explicit".to_string(), "subtitle".to_string()]
        );
    }
}
