// External collaborators the engine talks to
// Network fetch and synthesis live behind these traits; the engine only
// sees their outcomes.

use async_trait::async_trait;

/// Text-to-speech. Returns raw 16-bit little-endian mono PCM at 24 kHz;
/// an empty buffer means nothing was generated.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    async fn synthesize(&self, text: &str) -> anyhow::Result<Vec<u8>>;
}

/// Text summarization. An empty string means no summary.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> anyhow::Result<String>;
}

/// Fire-and-forget sharing of a piece of text
pub trait ShareTarget: Send + Sync {
    fn share(&self, text: &str);
}
