// Playback session
// Owns the single active source for one article and reports elapsed time
// on the frame clock while playing.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::audio::backend::{AudioBackend, SourceHandle};
use crate::audio::decoder::DecodedAudio;
use crate::error::{ReaderError, Result};
use crate::events::{EventBus, ReaderEvent};

/// Snapshot handed to the UI
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub is_playing: bool,
    pub position_seconds: f64,
    pub duration_seconds: f64,
    pub is_loading: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Loading,
    Paused,
    Playing,
}

struct SessionInner {
    phase: SessionPhase,
    audio: Option<Arc<DecodedAudio>>,
    source: Option<Box<dyn SourceHandle>>,
    /// Context time at which offset 0 would have started
    start_time: f64,
    resume_offset: f64,
    position: f64,
    /// Bumped whenever the running frame loop must stop
    epoch: u64,
    ticker: Option<JoinHandle<()>>,
    closed: bool,
}

impl SessionInner {
    fn duration(&self) -> f64 {
        self.audio.as_ref().map(|a| a.duration()).unwrap_or(0.0)
    }

    fn stop_source(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.stop();
        }
    }

    fn stop_ticker(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

pub struct PlaybackSession {
    article_id: String,
    backend: Arc<dyn AudioBackend>,
    events: EventBus,
    frame_interval: Duration,
    inner: Mutex<SessionInner>,
    weak_self: Weak<PlaybackSession>,
}

impl PlaybackSession {
    pub fn new(
        article_id: impl Into<String>,
        backend: Arc<dyn AudioBackend>,
        events: EventBus,
        frame_interval: Duration,
    ) -> Arc<Self> {
        let article_id = article_id.into();
        Arc::new_cyclic(|weak_self| Self {
            article_id,
            backend,
            events,
            frame_interval,
            inner: Mutex::new(SessionInner {
                phase: SessionPhase::Idle,
                audio: None,
                source: None,
                start_time: 0.0,
                resume_offset: 0.0,
                position: 0.0,
                epoch: 0,
                ticker: None,
                closed: false,
            }),
            weak_self: weak_self.clone(),
        })
    }

    pub fn article_id(&self) -> &str {
        &self.article_id
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.lock().phase
    }

    pub fn is_playing(&self) -> bool {
        self.phase() == SessionPhase::Playing
    }

    pub fn has_audio(&self) -> bool {
        self.inner.lock().audio.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Offset the next `play` resumes from
    pub fn resume_offset(&self) -> f64 {
        self.inner.lock().resume_offset
    }

    pub fn state(&self) -> PlaybackState {
        let inner = self.inner.lock();
        Self::snapshot(&inner)
    }

    fn snapshot(inner: &SessionInner) -> PlaybackState {
        PlaybackState {
            is_playing: inner.phase == SessionPhase::Playing,
            position_seconds: inner.position,
            duration_seconds: inner.duration(),
            is_loading: inner.phase == SessionPhase::Loading,
        }
    }

    fn publish(&self, inner: &SessionInner) {
        self.events.emit(ReaderEvent::PlaybackStateChanged {
            article_id: self.article_id.clone(),
            state: Self::snapshot(inner),
        });
    }

    /// Idle -> Loading. Other phases are left alone.
    pub fn begin_loading(&self) {
        let mut inner = self.inner.lock();
        if inner.closed || inner.phase != SessionPhase::Idle {
            return;
        }
        inner.phase = SessionPhase::Loading;
        self.publish(&inner);
    }

    /// Leave Loading with the provisioning outcome. Returns false when the
    /// session was shut down in the meantime and the outcome was dropped.
    pub fn finish_loading(&self, audio: Option<Arc<DecodedAudio>>) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed {
            return false;
        }
        match audio {
            Some(audio) => {
                if inner.audio.is_none() {
                    inner.audio = Some(audio);
                }
                if matches!(inner.phase, SessionPhase::Idle | SessionPhase::Loading) {
                    inner.phase = SessionPhase::Paused;
                }
            }
            None => {
                if inner.phase == SessionPhase::Loading {
                    inner.phase = SessionPhase::Idle;
                }
            }
        }
        self.publish(&inner);
        true
    }

    /// Start sounding from `offset` seconds. Any live source is stopped first.
    pub fn play_from(&self, offset: f64) -> Result<PlaybackState> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(ReaderError::NoArticle);
        }
        let audio = inner.audio.clone().ok_or(ReaderError::NoAudio)?;
        let offset = offset.clamp(0.0, audio.duration());

        inner.stop_source();
        inner.stop_ticker();

        let source = match self.backend.start_source(audio, offset) {
            Ok(source) => source,
            Err(e) => {
                // Nothing is sounding any more; park at the requested offset
                if inner.phase == SessionPhase::Playing {
                    inner.phase = SessionPhase::Paused;
                }
                inner.resume_offset = offset;
                inner.position = offset;
                warn!(article_id = %self.article_id, offset, error = %e, "Could not start playback");
                self.publish(&inner);
                return Err(e);
            }
        };
        inner.source = Some(source);
        inner.start_time = self.backend.current_time() - offset;
        inner.resume_offset = offset;
        inner.position = offset;
        inner.phase = SessionPhase::Playing;

        let epoch = inner.epoch;
        inner.ticker = self.spawn_ticker(epoch);

        debug!(article_id = %self.article_id, offset, "Playback started");
        self.publish(&inner);
        Ok(Self::snapshot(&inner))
    }

    /// Stop the source and remember where it was. No-op unless playing.
    pub fn pause(&self) -> PlaybackState {
        let mut inner = self.inner.lock();
        if inner.phase != SessionPhase::Playing {
            return Self::snapshot(&inner);
        }
        inner.stop_source();
        inner.stop_ticker();

        let elapsed = (self.backend.current_time() - inner.start_time).clamp(0.0, inner.duration());
        inner.resume_offset = elapsed;
        inner.position = elapsed;
        inner.phase = SessionPhase::Paused;

        debug!(article_id = %self.article_id, elapsed, "Playback paused");
        self.publish(&inner);
        Self::snapshot(&inner)
    }

    /// Move the play head. While playing this restarts the source at `time`
    /// without passing through the paused phase.
    pub fn seek(&self, time: f64, fallback_range: f64) -> Result<PlaybackState> {
        let playing = {
            let mut inner = self.inner.lock();
            let upper = match inner.duration() {
                d if d > 0.0 => d,
                _ => fallback_range.max(0.0),
            };
            let time = time.clamp(0.0, upper);
            inner.position = time;
            inner.resume_offset = time;
            if inner.phase != SessionPhase::Playing {
                self.publish(&inner);
                return Ok(Self::snapshot(&inner));
            }
            time
        };
        self.play_from(playing)
    }

    /// Run one frame of position reporting. Returns false once the loop
    /// should stop.
    pub fn poll_frame(&self) -> bool {
        let epoch = self.inner.lock().epoch;
        self.advance(epoch)
    }

    fn advance(&self, epoch: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch || inner.phase != SessionPhase::Playing || !self.backend.is_running() {
            return false;
        }

        let duration = inner.duration();
        let elapsed = self.backend.current_time() - inner.start_time;
        if elapsed >= duration {
            inner.stop_source();
            inner.epoch = inner.epoch.wrapping_add(1);
            inner.ticker = None;
            inner.phase = SessionPhase::Paused;
            inner.position = 0.0;
            inner.resume_offset = 0.0;
            debug!(article_id = %self.article_id, "Playback reached end");
            self.events.emit(ReaderEvent::PlaybackEnded {
                article_id: self.article_id.clone(),
            });
            self.publish(&inner);
            return false;
        }

        inner.position = elapsed.max(0.0);
        self.events.emit(ReaderEvent::PlaybackProgress {
            article_id: self.article_id.clone(),
            position_seconds: inner.position,
            duration_seconds: duration,
        });
        true
    }

    fn spawn_ticker(&self, epoch: u64) -> Option<JoinHandle<()>> {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(article_id = %self.article_id, "No async runtime, position updates disabled");
                return None;
            }
        };
        let session = self.weak_self.clone();
        let interval = self.frame_interval;
        Some(handle.spawn(async move {
            let mut frames = tokio::time::interval(interval);
            frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately
            frames.tick().await;
            loop {
                frames.tick().await;
                let Some(session) = session.upgrade() else { break };
                if !session.advance(epoch) {
                    break;
                }
            }
        }))
    }

    /// Stop everything and drop the decoded buffer. The session cannot be
    /// revived afterwards.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        inner.stop_source();
        inner.stop_ticker();
        inner.audio = None;
        inner.phase = SessionPhase::Idle;
        inner.position = 0.0;
        inner.resume_offset = 0.0;
        inner.closed = true;
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        inner.stop_source();
        inner.stop_ticker();
    }
}
