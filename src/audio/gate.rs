// Audio provisioning gate
// Generates speech for an article at most once per reader session. Callers
// that arrive while generation is in flight await the same load.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::audio::decoder::{decode_pcm16, DecodedAudio};
use crate::error::{ReaderError, Result};
use crate::events::{EventBus, ReaderEvent};
use crate::providers::SpeechProvider;

pub const AUDIO_UNAVAILABLE_NOTICE: &str = "Could not generate audio.";

type PendingLoad = Shared<BoxFuture<'static, Option<Arc<DecodedAudio>>>>;

enum Slot {
    Empty,
    Loading { attempt: u64, pending: PendingLoad },
    Ready(Arc<DecodedAudio>),
}

struct GateInner {
    slot: Slot,
    attempts: u64,
    /// A failed attempt nobody has told the reader about yet
    unreported_failure: bool,
}

pub struct AudioGate {
    article_id: String,
    narration: String,
    provider: Arc<dyn SpeechProvider>,
    events: EventBus,
    inner: Mutex<GateInner>,
}

impl AudioGate {
    pub fn new(
        article_id: impl Into<String>,
        narration: impl Into<String>,
        provider: Arc<dyn SpeechProvider>,
        events: EventBus,
    ) -> Self {
        Self {
            article_id: article_id.into(),
            narration: narration.into(),
            provider,
            events,
            inner: Mutex::new(GateInner {
                slot: Slot::Empty,
                attempts: 0,
                unreported_failure: false,
            }),
        }
    }

    pub fn article_id(&self) -> &str {
        &self.article_id
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.inner.lock().slot, Slot::Loading { .. })
    }

    pub fn cached(&self) -> Option<Arc<DecodedAudio>> {
        match &self.inner.lock().slot {
            Slot::Ready(audio) => Some(Arc::clone(audio)),
            _ => None,
        }
    }

    /// Claim the notice for the last failed attempt. Only the first caller
    /// after a failure gets `true`.
    pub fn take_failure(&self) -> bool {
        std::mem::take(&mut self.inner.lock().unreported_failure)
    }

    /// Return the decoded narration, generating it if nobody has yet.
    pub async fn ensure_audio(&self) -> Result<Arc<DecodedAudio>> {
        let (attempt, pending) = {
            let mut inner = self.inner.lock();
            match &inner.slot {
                Slot::Ready(audio) => return Ok(Arc::clone(audio)),
                Slot::Loading { attempt, pending } => {
                    debug!(article_id = %self.article_id, "Joining in-flight audio generation");
                    (*attempt, pending.clone())
                }
                Slot::Empty => {
                    inner.attempts += 1;
                    let attempt = inner.attempts;
                    let pending = Self::generate(
                        self.article_id.clone(),
                        self.narration.clone(),
                        Arc::clone(&self.provider),
                    )
                    .boxed()
                    .shared();
                    inner.slot = Slot::Loading {
                        attempt,
                        pending: pending.clone(),
                    };
                    info!(article_id = %self.article_id, attempt, "Generating article audio");
                    self.events.emit(ReaderEvent::AudioLoading {
                        article_id: self.article_id.clone(),
                        loading: true,
                    });
                    (attempt, pending)
                }
            }
        };

        let outcome = pending.await;
        self.settle(attempt, outcome.clone());
        outcome.ok_or_else(|| ReaderError::ProviderUnavailable(AUDIO_UNAVAILABLE_NOTICE.to_string()))
    }

    // The first waiter back moves the slot on; later waiters of the same
    // attempt find it already settled.
    fn settle(&self, attempt: u64, outcome: Option<Arc<DecodedAudio>>) {
        let mut inner = self.inner.lock();
        match &inner.slot {
            Slot::Loading { attempt: current, .. } if *current == attempt => {}
            _ => return,
        }

        inner.unreported_failure = outcome.is_none();
        inner.slot = match outcome {
            Some(audio) => Slot::Ready(audio),
            None => Slot::Empty,
        };
        drop(inner);

        self.events.emit(ReaderEvent::AudioLoading {
            article_id: self.article_id.clone(),
            loading: false,
        });
    }

    async fn generate(
        article_id: String,
        text: String,
        provider: Arc<dyn SpeechProvider>,
    ) -> Option<Arc<DecodedAudio>> {
        let raw = match provider.synthesize(&text).await {
            Ok(raw) if !raw.is_empty() => raw,
            Ok(_) => {
                warn!(%article_id, "Speech provider returned no audio");
                return None;
            }
            Err(e) => {
                warn!(%article_id, error = %e, "Speech provider failed");
                return None;
            }
        };

        match tokio::task::spawn_blocking(move || decode_pcm16(&raw)).await {
            Ok(audio) if !audio.is_empty() => {
                info!(%article_id, duration = audio.duration(), "Article audio ready");
                Some(Arc::new(audio))
            }
            Ok(_) => {
                warn!(%article_id, "Generated audio decoded to zero samples");
                None
            }
            Err(e) => {
                warn!(%article_id, error = %e, "Audio decode task failed");
                None
            }
        }
    }
}
