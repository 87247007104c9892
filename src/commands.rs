// Command handlers invoked by the front end
// Errors cross the bridge as plain strings.

use serde::Serialize;

use crate::audio::player::PlaybackState;
use crate::progress::ReadingMark;
use crate::reader::display::{font_class, format_time, scrubber_max, Typography};
use crate::reader::keys::KeyAction;
use crate::reader::ArticleReader;
use crate::selection::{SelectionAnchor, SelectionSnapshot};

// ===== Playback Commands =====

pub async fn toggle_playback(reader: &ArticleReader) -> Result<PlaybackState, String> {
    reader
        .toggle_play()
        .await
        .map_err(|e| format!("Failed to toggle playback: {}", e))
}

pub async fn seek_playback(reader: &ArticleReader, time: f64) -> Result<PlaybackState, String> {
    reader
        .seek(time)
        .await
        .map_err(|e| format!("Failed to seek: {}", e))
}

pub fn pause_playback(reader: &ArticleReader) -> Result<PlaybackState, String> {
    reader
        .pause()
        .map_err(|e| format!("Failed to pause playback: {}", e))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDisplayResponse {
    pub is_playing: bool,
    pub is_loading: bool,
    pub position: f64,
    pub scrubber_max: f64,
    pub elapsed_label: String,
    pub duration_label: String,
}

pub fn get_player_display(reader: &ArticleReader) -> Result<PlayerDisplayResponse, String> {
    let state = reader
        .playback_state()
        .map_err(|e| format!("Failed to get player state: {}", e))?;

    Ok(PlayerDisplayResponse {
        is_playing: state.is_playing,
        is_loading: state.is_loading,
        position: state.position_seconds,
        scrubber_max: scrubber_max(state.duration_seconds, reader.seek_fallback_range()),
        elapsed_label: format_time(state.position_seconds),
        duration_label: format_time(state.duration_seconds),
    })
}

// ===== Reading Progress Commands =====

pub fn report_block_visibility(
    reader: &ArticleReader,
    block_index: usize,
    ratio: f32,
) -> Result<Option<ReadingMark>, String> {
    reader
        .report_block_visibility(block_index, ratio)
        .map_err(|e| format!("Failed to record reading progress: {}", e))
}

pub fn reset_reading_progress(reader: &ArticleReader) -> Result<(), String> {
    reader
        .reset_progress()
        .map_err(|e| format!("Failed to reset reading progress: {}", e))
}

// ===== Selection and Summary Commands =====

pub fn selection_changed(
    reader: &ArticleReader,
    snapshot: &SelectionSnapshot,
) -> Result<Option<SelectionAnchor>, String> {
    reader
        .selection_changed(snapshot)
        .map_err(|e| format!("Failed to update selection: {}", e))
}

pub fn share_quote(reader: &ArticleReader, text: Option<&str>) -> Result<String, String> {
    reader
        .share_quote(text)
        .map_err(|e| format!("Failed to share quote: {}", e))
}

pub async fn request_summary(reader: &ArticleReader) -> Result<Option<String>, String> {
    reader
        .request_summary()
        .await
        .map_err(|e| format!("Failed to request summary: {}", e))
}

// ===== View Commands =====

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleViewResponse {
    pub article_id: String,
    pub font_class: &'static str,
    pub focus_mode: bool,
    pub typography: Typography,
    pub highlighted_block: Option<usize>,
}

pub fn get_article_view(reader: &ArticleReader) -> Result<ArticleViewResponse, String> {
    let article = reader.article().ok_or_else(|| "No article is open".to_string())?;

    Ok(ArticleViewResponse {
        font_class: font_class(&article.category),
        article_id: article.id,
        focus_mode: reader.focus_mode(),
        typography: reader.typography(),
        highlighted_block: reader.highlighted_block(),
    })
}

pub fn handle_key(reader: &ArticleReader, key: &str) -> Option<KeyAction> {
    reader.handle_key(key)
}

pub fn adjust_font_size(reader: &ArticleReader, larger: bool) -> Typography {
    reader.adjust_font_size(larger)
}
