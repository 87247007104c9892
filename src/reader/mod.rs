// Article reader
// Ties playback, provisioning, reading progress and quote selection to the
// article currently open in the reader.

pub mod display;
pub mod keys;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::audio::backend::AudioBackend;
use crate::audio::gate::{AudioGate, AUDIO_UNAVAILABLE_NOTICE};
use crate::audio::player::{PlaybackSession, PlaybackState};
use crate::error::{ReaderError, Result};
use crate::events::ReaderEvent;
use crate::models::Article;
use crate::progress::visibility::Span;
use crate::progress::{ReadingMark, ReadingTracker};
use crate::selection::{SelectionAnchor, SelectionDetector, SelectionSnapshot};
use crate::state::ReaderState;
use crate::summary::SummaryPanel;
use display::Typography;
use keys::{map_key, KeyAction, Navigation};

/// Everything that belongs to one opened article
struct ArticleSession {
    article: Article,
    navigation: Navigation,
    gate: AudioGate,
    playback: Arc<PlaybackSession>,
    tracker: Mutex<ReadingTracker>,
    selection: Mutex<SelectionDetector>,
    summary: SummaryPanel,
}

impl ArticleSession {
    fn teardown(&self) {
        self.playback.shutdown();
        self.tracker.lock().close();
        self.selection.lock().clear();
    }
}

#[derive(Debug, Clone, Copy)]
struct FocusMode {
    enabled: bool,
    typography: Typography,
}

pub struct ArticleReader {
    state: Arc<ReaderState>,
    backend: Arc<dyn AudioBackend>,
    current: Mutex<Option<Arc<ArticleSession>>>,
    focus: Mutex<FocusMode>,
    closed: AtomicBool,
}

impl ArticleReader {
    /// Open the reader. The rendering context is created here and lives
    /// until `close`.
    pub fn new(state: Arc<ReaderState>) -> Result<Self> {
        let backend = (state.services.backend_factory)()?;
        let typography = Typography::from_settings(&state.settings.typography);
        Ok(Self {
            state,
            backend,
            current: Mutex::new(None),
            focus: Mutex::new(FocusMode {
                enabled: false,
                typography,
            }),
            closed: AtomicBool::new(false),
        })
    }

    /// Show `article`, replacing whatever was open. Returns the block the
    /// reader will scroll back to, if a mark was saved.
    pub fn open(&self, article: Article, navigation: Navigation) -> Result<Option<usize>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ReaderError::NoArticle);
        }
        let settings = &self.state.settings;
        let services = &self.state.services;
        let events = self.state.events.clone();
        let narration = article.narration_text();

        let session = Arc::new(ArticleSession {
            gate: AudioGate::new(&article.id, narration.clone(), Arc::clone(&services.speech), events.clone()),
            playback: PlaybackSession::new(
                article.id.clone(),
                Arc::clone(&self.backend),
                events.clone(),
                settings.frame_interval(),
            ),
            tracker: Mutex::new(ReadingTracker::new(
                &article.id,
                article.block_count(),
                &settings.storage.namespace,
                &settings.progress,
                Arc::clone(&self.state.store),
                events.clone(),
            )),
            selection: Mutex::new(SelectionDetector::new(
                settings.selection.anchor_offset_px,
                Arc::clone(&services.share),
                events.clone(),
            )),
            summary: SummaryPanel::new(&article.id, narration, Arc::clone(&services.summarizer), events),
            navigation,
            article,
        });

        let previous = self.current.lock().replace(Arc::clone(&session));
        if let Some(previous) = previous {
            debug!(article_id = %previous.article.id, "Leaving article");
            previous.teardown();
        }

        info!(article_id = %session.article.id, blocks = session.article.block_count(), "Opened article");
        let restored = session.tracker.lock().restore();
        Ok(restored)
    }

    /// Dismiss the reader: stop everything and release the rendering context
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(session) = self.current.lock().take() {
            session.teardown();
        }
        self.backend.close();
        info!("Reader closed");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReaderEvent> {
        self.state.events.subscribe()
    }

    pub fn article(&self) -> Option<Article> {
        self.current.lock().as_ref().map(|s| s.article.clone())
    }

    pub fn active_article_id(&self) -> Option<String> {
        self.current.lock().as_ref().map(|s| s.article.id.clone())
    }

    fn session(&self) -> Result<Arc<ArticleSession>> {
        self.current.lock().clone().ok_or(ReaderError::NoArticle)
    }

    fn is_current(&self, session: &Arc<ArticleSession>) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, session))
    }

    // ===== Playback =====

    pub fn playback_state(&self) -> Result<PlaybackState> {
        Ok(self.session()?.playback.state())
    }

    /// Scrubber range used while the narration length is still unknown
    pub fn seek_fallback_range(&self) -> f64 {
        self.state.settings.playback.seek_fallback_range_secs
    }

    pub fn is_audio_loading(&self) -> bool {
        self.session().map(|s| s.gate.is_loading()).unwrap_or(false)
    }

    /// Play from `offset`, generating the narration first if needed
    pub async fn play(&self, offset: f64) -> Result<PlaybackState> {
        let session = self.session()?;
        self.play_session(&session, Some(offset)).await
    }

    /// Start playback, loading the narration first when there is none.
    /// `None` plays from the resume offset as it stands once audio is ready,
    /// so a seek made during the load is honoured.
    async fn play_session(&self, session: &Arc<ArticleSession>, offset: Option<f64>) -> Result<PlaybackState> {
        let playback = &session.playback;
        if !playback.has_audio() {
            playback.begin_loading();
            let outcome = session.gate.ensure_audio().await;

            if !self.is_current(session) {
                let requested = session.article.id.clone();
                let active = self.active_article_id().unwrap_or_default();
                warn!(%requested, %active, "Discarding audio for an article that is no longer open");
                return Err(ReaderError::StaleResult { requested, active });
            }

            match outcome {
                Ok(audio) => {
                    playback.finish_loading(Some(audio));
                }
                Err(e) => {
                    playback.finish_loading(None);
                    if session.gate.take_failure() {
                        self.state.events.emit(ReaderEvent::Notice {
                            message: AUDIO_UNAVAILABLE_NOTICE.to_string(),
                        });
                    }
                    return Err(e);
                }
            }

            // Another caller waiting on the same load already started it
            if offset.is_none() && playback.is_playing() {
                return Ok(playback.state());
            }
        }
        playback.play_from(offset.unwrap_or_else(|| playback.resume_offset()))
    }

    pub fn pause(&self) -> Result<PlaybackState> {
        Ok(self.session()?.playback.pause())
    }

    /// Pause when playing, otherwise resume from the last offset. A toggle
    /// that lands while the narration is still being generated waits for that
    /// load instead of starting a second one.
    pub async fn toggle_play(&self) -> Result<PlaybackState> {
        let session = self.session()?;
        let playback = &session.playback;
        if playback.is_playing() {
            return Ok(playback.pause());
        }
        if session.gate.is_loading() {
            debug!(article_id = %session.article.id, "Toggle while audio is loading");
            // The caller that started the load applies it
            let _ = session.gate.ensure_audio().await;
            return Ok(playback.state());
        }
        self.play_session(&session, None).await
    }

    /// Move the play head. Seeking before any audio exists starts generation
    /// and plays from the requested position once it is ready.
    pub async fn seek(&self, time: f64) -> Result<PlaybackState> {
        let session = self.session()?;
        let state = session.playback.seek(time, self.seek_fallback_range())?;
        if session.playback.has_audio() {
            return Ok(state);
        }
        self.play_session(&session, None).await
    }

    // ===== Reading progress =====

    pub fn report_block_visibility(&self, block_index: usize, ratio: f32) -> Result<Option<ReadingMark>> {
        let session = self.session()?;
        let mark = session.tracker.lock().on_visibility(block_index, ratio);
        Ok(mark)
    }

    pub fn report_viewport(&self, viewport: Span, blocks: &[(usize, Span)]) -> Result<Option<ReadingMark>> {
        let session = self.session()?;
        let mark = session.tracker.lock().on_viewport(viewport, blocks);
        Ok(mark)
    }

    pub fn reset_progress(&self) -> Result<()> {
        self.session()?.tracker.lock().reset_progress();
        Ok(())
    }

    pub fn highlighted_block(&self) -> Option<usize> {
        self.session().ok().and_then(|s| s.tracker.lock().highlighted())
    }

    // ===== Quotes and summary =====

    pub fn selection_changed(&self, snapshot: &SelectionSnapshot) -> Result<Option<SelectionAnchor>> {
        let session = self.session()?;
        let anchor = session.selection.lock().on_selection_change(snapshot).cloned();
        Ok(anchor)
    }

    pub fn share_quote(&self, text_override: Option<&str>) -> Result<String> {
        let session = self.session()?;
        let fallback = session.article.subtitle.clone();
        let shared = session.selection.lock().share_quote(text_override, &fallback);
        Ok(shared)
    }

    pub async fn request_summary(&self) -> Result<Option<String>> {
        let session = self.session()?;
        Ok(session.summary.request().await)
    }

    // ===== Focus mode and keys =====

    pub fn focus_mode(&self) -> bool {
        self.focus.lock().enabled
    }

    pub fn typography(&self) -> Typography {
        self.focus.lock().typography
    }

    pub fn toggle_focus_mode(&self) -> bool {
        let enabled = {
            let mut focus = self.focus.lock();
            focus.enabled = !focus.enabled;
            focus.enabled
        };
        self.state.events.emit(ReaderEvent::FocusModeChanged { enabled });
        enabled
    }

    pub fn adjust_font_size(&self, larger: bool) -> Typography {
        let mut focus = self.focus.lock();
        focus.typography = if larger {
            focus.typography.larger()
        } else {
            focus.typography.smaller()
        };
        focus.typography
    }

    /// Handle a key press. Focus mode is toggled here; navigation and
    /// closing are returned for the host to carry out.
    pub fn handle_key(&self, key: &str) -> Option<KeyAction> {
        let navigation = self
            .current
            .lock()
            .as_ref()
            .map(|s| s.navigation)
            .unwrap_or_default();
        let action = map_key(key, navigation)?;
        if action == KeyAction::ToggleFocusMode {
            self.toggle_focus_mode();
        }
        Some(action)
    }
}

impl Drop for ArticleReader {
    fn drop(&mut self) {
        self.close();
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::testing::Harness;
    use super::*;
    use crate::audio::gate::testing::{pcm_seconds, Reply};
    use crate::db::KeyValueStore;
    use crate::events::drain;
    use crate::models::sample_article;

    #[tokio::test(start_paused = true)]
    async fn test_double_toggle_generates_once() {
        let harness = Harness::new(vec![Reply::Pcm(pcm_seconds(5.0))]);
        let reader = harness.reader();
        reader.open(sample_article("a1"), Navigation::default()).unwrap();

        let (first, second) = tokio::join!(reader.toggle_play(), reader.toggle_play());
        assert!(first.unwrap().is_playing);
        assert!(second.is_ok());
        assert_eq!(harness.speech.calls(), 1);
        assert!(reader.playback_state().unwrap().is_playing);
        assert_eq!(harness.backend.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_pause_resume() {
        let harness = Harness::new(vec![Reply::Pcm(pcm_seconds(5.0))]);
        let reader = harness.reader();
        reader.open(sample_article("a1"), Navigation::default()).unwrap();

        reader.toggle_play().await.unwrap();
        harness.backend.advance(1.5);
        let paused = reader.toggle_play().await.unwrap();
        assert!(!paused.is_playing);
        let resumed = reader.toggle_play().await.unwrap();
        assert!(resumed.is_playing);
        assert!((resumed.position_seconds - 1.5).abs() < 1e-9);
        assert_eq!(harness.speech.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_synthesis_leaves_session_idle() {
        let harness = Harness::new(vec![Reply::Empty]);
        let reader = harness.reader();
        let mut rx = harness.state.events.subscribe();
        reader.open(sample_article("a1"), Navigation::default()).unwrap();

        let result = reader.toggle_play().await;
        assert!(matches!(result, Err(ReaderError::ProviderUnavailable(_))));
        let state = reader.playback_state().unwrap();
        assert!(!state.is_playing);
        assert!(!state.is_loading);
        assert_eq!(state.duration_seconds, 0.0);
        assert_eq!(harness.backend.started.load(Ordering::SeqCst), 0);
        assert!(drain(&mut rx)
            .iter()
            .any(|e| matches!(e, ReaderEvent::Notice { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_audio_not_applied_to_new_article() {
        let harness = Harness::new(vec![Reply::Pcm(pcm_seconds(5.0))]);
        let reader = Arc::new(harness.reader());
        reader.open(sample_article("a"), Navigation::default()).unwrap();

        let background = Arc::clone(&reader);
        let pending = tokio::spawn(async move { background.toggle_play().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        reader.open(sample_article("b"), Navigation::default()).unwrap();

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(ReaderError::StaleResult { ref requested, ref active })
            if requested == "a" && active == "b"));
        let state = reader.playback_state().unwrap();
        assert!(!state.is_playing);
        assert_eq!(state.duration_seconds, 0.0);
        assert_eq!(harness.backend.started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_audio_for_left_article_raises_no_notice() {
        let harness = Harness::new(vec![Reply::Empty]);
        let reader = Arc::new(harness.reader());
        reader.open(sample_article("a"), Navigation::default()).unwrap();

        let background = Arc::clone(&reader);
        let pending = tokio::spawn(async move { background.toggle_play().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        let mut rx = harness.state.events.subscribe();
        reader.open(sample_article("b"), Navigation::default()).unwrap();

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(ReaderError::StaleResult { .. })));
        assert!(!drain(&mut rx)
            .iter()
            .any(|e| matches!(e, ReaderEvent::Notice { .. })));
        assert!(!reader.playback_state().unwrap().is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_during_load_starts_once_at_seek_position() {
        let harness = Harness::new(vec![Reply::Pcm(pcm_seconds(10.0))]);
        let reader = Arc::new(harness.reader());
        reader.open(sample_article("a1"), Navigation::default()).unwrap();

        let background = Arc::clone(&reader);
        let toggle = tokio::spawn(async move { background.toggle_play().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        let seeked = reader.seek(4.0).await.unwrap();
        let toggled = toggle.await.unwrap().unwrap();

        assert!(seeked.is_playing);
        assert!(toggled.is_playing);
        assert_eq!(*harness.backend.offsets.lock(), vec![4.0]);
        assert_eq!(harness.speech.calls(), 1);
        assert_eq!(reader.playback_state().unwrap().position_seconds, 4.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_before_load_plays_from_requested_offset() {
        let harness = Harness::new(vec![Reply::Pcm(pcm_seconds(10.0))]);
        let reader = harness.reader();
        reader.open(sample_article("a1"), Navigation::default()).unwrap();

        let state = reader.seek(4.0).await.unwrap();
        assert!(state.is_playing);
        assert_eq!(state.position_seconds, 4.0);
        assert_eq!(*harness.backend.offsets.lock(), vec![4.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_article_stops_audio() {
        let harness = Harness::new(vec![Reply::Pcm(pcm_seconds(5.0)), Reply::Pcm(pcm_seconds(5.0))]);
        let reader = harness.reader();
        reader.open(sample_article("a"), Navigation::default()).unwrap();
        reader.toggle_play().await.unwrap();
        assert_eq!(harness.backend.active_sources(), 1);

        reader.open(sample_article("b"), Navigation::default()).unwrap();
        assert_eq!(harness.backend.active_sources(), 0);
        assert!(!reader.playback_state().unwrap().is_playing);

        reader.toggle_play().await.unwrap();
        assert_eq!(harness.speech.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_restore_and_reset_across_reopen() {
        let harness = Harness::new(vec![]);
        let reader = harness.reader();
        reader.open(sample_article("a1"), Navigation::default()).unwrap();
        reader.report_block_visibility(3, 0.7).unwrap();
        assert_eq!(harness.store.get("tun_progress_a1").unwrap().as_deref(), Some("3"));

        let restored = reader.open(sample_article("a1"), Navigation::default()).unwrap();
        assert_eq!(restored, Some(3));
        assert_eq!(reader.highlighted_block(), Some(3));

        reader.reset_progress().unwrap();
        assert_eq!(harness.store.get("tun_progress_a1").unwrap(), None);
        let restored = reader.open(sample_article("a1"), Navigation::default()).unwrap();
        assert_eq!(restored, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_focus_mode_leaves_playback_and_progress_alone() {
        let harness = Harness::new(vec![Reply::Pcm(pcm_seconds(5.0))]);
        let reader = harness.reader();
        let nav = Navigation { has_next: true, has_prev: false };
        reader.open(sample_article("a1"), nav).unwrap();
        reader.toggle_play().await.unwrap();
        reader.report_block_visibility(1, 1.0).unwrap();

        assert_eq!(reader.handle_key("f"), Some(KeyAction::ToggleFocusMode));
        assert!(reader.focus_mode());
        assert_eq!(reader.handle_key("F"), Some(KeyAction::ToggleFocusMode));
        assert!(!reader.focus_mode());

        assert!(reader.playback_state().unwrap().is_playing);
        assert_eq!(harness.store.get("tun_progress_a1").unwrap().as_deref(), Some("1"));
        assert_eq!(reader.handle_key("ArrowRight"), Some(KeyAction::NextArticle));
        assert_eq!(reader.handle_key("ArrowLeft"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_releases_backend() {
        let harness = Harness::new(vec![Reply::Pcm(pcm_seconds(5.0))]);
        let reader = harness.reader();
        reader.open(sample_article("a1"), Navigation::default()).unwrap();
        reader.toggle_play().await.unwrap();

        reader.close();
        assert_eq!(harness.backend.active_sources(), 0);
        assert!(harness.backend.closed.load(Ordering::SeqCst));
        assert!(matches!(reader.playback_state(), Err(ReaderError::NoArticle)));
        assert!(reader.open(sample_article("a1"), Navigation::default()).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_share_falls_back_to_subtitle() {
        let harness = Harness::new(vec![]);
        let reader = harness.reader();
        reader.open(sample_article("a1"), Navigation::default()).unwrap();
        assert_eq!(reader.share_quote(None).unwrap(), "A subtitle worth sharing");
        assert_eq!(*harness.share.shared.lock(), vec!["A subtitle worth sharing".to_string()]);
    }
}
