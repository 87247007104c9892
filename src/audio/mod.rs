// Audio playback module
// Decodes generated speech and drives a single playback session on an
// output backend (cpal when `device-output` is enabled)

pub mod backend;
pub mod decoder;
pub mod gate;
#[cfg(feature = "device-output")]
pub mod output;
pub mod player;

pub use backend::{AudioBackend, SourceHandle};
pub use decoder::{decode_pcm16, DecodedAudio, SPEECH_SAMPLE_RATE};
pub use gate::AudioGate;
#[cfg(feature = "device-output")]
pub use output::CpalBackend;
pub use player::{PlaybackSession, PlaybackState, SessionPhase};
