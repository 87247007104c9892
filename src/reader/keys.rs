// Keyboard shortcuts while the reader is open
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAction {
    ToggleFocusMode,
    NextArticle,
    PreviousArticle,
    Close,
}

/// Which neighbouring articles exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Navigation {
    pub has_next: bool,
    pub has_prev: bool,
}

/// Map a `KeyboardEvent.key` value to an action
pub fn map_key(key: &str, nav: Navigation) -> Option<KeyAction> {
    match key {
        "ArrowRight" if nav.has_next => Some(KeyAction::NextArticle),
        "ArrowLeft" if nav.has_prev => Some(KeyAction::PreviousArticle),
        "Escape" => Some(KeyAction::Close),
        k if k.eq_ignore_ascii_case("f") => Some(KeyAction::ToggleFocusMode),
        _ => None,
    }
}
