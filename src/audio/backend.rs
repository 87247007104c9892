// Audio rendering backend seam
// One backend context lives for a whole reader-open lifetime and is shared by
// every play/pause/seek of every article opened in it.

use std::sync::Arc;

use crate::audio::decoder::DecodedAudio;
use crate::error::Result;

/// A live, sounding playback handle.
pub trait SourceHandle: Send {
    /// Stop immediately, no fade. Calling it twice is harmless.
    fn stop(&mut self);
}

pub trait AudioBackend: Send + Sync {
    /// Monotonic context clock in seconds
    fn current_time(&self) -> f64;

    /// Whether the context is rendering (not suspended or closed)
    fn is_running(&self) -> bool;

    /// Start sounding `audio` from `offset` seconds into the buffer
    fn start_source(&self, audio: Arc<DecodedAudio>, offset: f64) -> Result<Box<dyn SourceHandle>>;

    /// Tear the context down. Further sources must not be started.
    fn close(&self);
}
