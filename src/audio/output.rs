// Audio output using cpal
// Plays decoded narration on the default output device through a ring buffer

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use parking_lot::Mutex;
use ringbuf::{HeapRb, traits::{Consumer, Producer, Split}};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error};

use crate::audio::backend::{AudioBackend, SourceHandle};
use crate::audio::decoder::DecodedAudio;
use crate::error::{ReaderError, Result};

const RING_BUFFER_SIZE: usize = 48000 * 2 / 4; // ~250ms of stereo audio at 48kHz
const FEED_CHUNK_FRAMES: usize = 512;

type RingProducer = ringbuf::HeapProd<f32>;
type RingConsumer = ringbuf::HeapCons<f32>;

/// Device rendering context. The cpal stream lives on its own thread because
/// streams are not `Send` on every platform.
pub struct CpalBackend {
    producer: Arc<Mutex<RingProducer>>,
    consumer: Arc<Mutex<RingConsumer>>,
    running: Arc<AtomicBool>,
    sample_rate: u32,
    channels: u16,
    epoch: Instant,
    shutdown: Mutex<Option<mpsc::Sender<()>>>,
}

impl CpalBackend {
    /// Open the default output device
    pub fn new() -> Result<Self> {
        let rb = HeapRb::<f32>::new(RING_BUFFER_SIZE);
        let (producer, consumer) = rb.split();
        let consumer = Arc::new(Mutex::new(consumer));

        let (ready_tx, ready_rx) = mpsc::channel::<std::result::Result<(u32, u16), String>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let stream_consumer = Arc::clone(&consumer);
        thread::Builder::new()
            .name("reader-audio-output".to_string())
            .spawn(move || {
                let stream = match Self::open_stream(stream_consumer) {
                    Ok((stream, rate, channels)) => {
                        let _ = ready_tx.send(Ok((rate, channels)));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Park until the backend is closed or dropped
                let _ = shutdown_rx.recv();
                drop(stream);
                debug!("Audio output stream closed");
            })?;

        let (sample_rate, channels) = ready_rx
            .recv()
            .map_err(|e| ReaderError::Backend(format!("Output thread exited: {}", e)))?
            .map_err(ReaderError::Backend)?;

        Ok(Self {
            producer: Arc::new(Mutex::new(producer)),
            consumer,
            running: Arc::new(AtomicBool::new(true)),
            sample_rate,
            channels,
            epoch: Instant::now(),
            shutdown: Mutex::new(Some(shutdown_tx)),
        })
    }

    fn open_stream(
        consumer: Arc<Mutex<RingConsumer>>,
    ) -> std::result::Result<(cpal::Stream, u32, u16), String> {
        let host = cpal::default_host();

        let device = host.default_output_device()
            .ok_or("No output device available")?;

        let config = device.default_output_config()
            .map_err(|e| format!("Failed to get default output config: {}", e))?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels();
        let stream_config: StreamConfig = config.config();

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => Self::build_stream::<f32>(&device, &stream_config, consumer)?,
            cpal::SampleFormat::I16 => Self::build_stream::<i16>(&device, &stream_config, consumer)?,
            cpal::SampleFormat::U16 => Self::build_stream::<u16>(&device, &stream_config, consumer)?,
            format => return Err(format!("Unsupported sample format: {:?}", format)),
        };

        stream.play().map_err(|e| format!("Failed to start stream: {}", e))?;
        Ok((stream, sample_rate, channels))
    }

    fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
        device: &cpal::Device,
        config: &StreamConfig,
        consumer: Arc<Mutex<RingConsumer>>,
    ) -> std::result::Result<cpal::Stream, String> {
        device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let mut consumer = consumer.lock();
                for sample in data.iter_mut() {
                    let value = consumer.try_pop().unwrap_or(0.0);
                    *sample = T::from_sample(value);
                }
            },
            move |err| {
                error!(error = %err, "Audio output error");
            },
            None,
        ).map_err(|e| format!("Failed to build output stream: {}", e))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

struct FeedSource {
    stop: Arc<AtomicBool>,
    producer: Arc<Mutex<RingProducer>>,
    consumer: Arc<Mutex<RingConsumer>>,
}

impl SourceHandle for FeedSource {
    fn stop(&mut self) {
        if self.stop.swap(true, Ordering::SeqCst) {
            return;
        }
        // Holding the producer waits out a feeder mid-write; it sees `stop`
        // before pushing again, so the drain leaves the ring empty for the
        // next source.
        let _producer = self.producer.lock();
        drain(&self.consumer);
    }
}

fn drain(consumer: &Mutex<RingConsumer>) {
    let mut consumer = consumer.lock();
    while consumer.try_pop().is_some() {}
}

impl Drop for FeedSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Push samples until all are written or `stop` is raised
fn write_blocking(producer: &Mutex<RingProducer>, mut remaining: &[f32], stop: &AtomicBool) {
    while !remaining.is_empty() {
        let written = {
            let mut producer = producer.lock();
            if stop.load(Ordering::SeqCst) {
                return;
            }
            let mut written = 0;
            for &sample in remaining {
                if producer.try_push(sample).is_err() {
                    break;
                }
                written += 1;
            }
            written
        };
        if written > 0 {
            remaining = &remaining[written..];
        } else {
            thread::sleep(Duration::from_millis(1));
        }
    }
}

impl AudioBackend for CpalBackend {
    fn current_time(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn start_source(&self, audio: Arc<DecodedAudio>, offset: f64) -> Result<Box<dyn SourceHandle>> {
        if !self.is_running() {
            return Err(ReaderError::Backend("Audio output is closed".to_string()));
        }

        let stop = Arc::new(AtomicBool::new(false));
        let producer = Arc::clone(&self.producer);
        let feed_stop = Arc::clone(&stop);
        let channels = self.channels.max(1) as usize;
        // Source samples advanced per device frame
        let step = audio.sample_rate() as f64 / self.sample_rate.max(1) as f64;
        let start = offset.max(0.0) * audio.sample_rate() as f64;

        thread::Builder::new()
            .name("reader-audio-feed".to_string())
            .spawn(move || {
                let samples = audio.samples();
                let mut position = start;
                let mut chunk = Vec::with_capacity(FEED_CHUNK_FRAMES * channels);

                while !feed_stop.load(Ordering::SeqCst) && (position as usize) < samples.len() {
                    chunk.clear();
                    for _ in 0..FEED_CHUNK_FRAMES {
                        let index = position as usize;
                        let Some(&current) = samples.get(index) else { break };
                        let next = samples.get(index + 1).copied().unwrap_or(current);
                        let value = current + (next - current) * position.fract() as f32;
                        chunk.extend(std::iter::repeat(value).take(channels));
                        position += step;
                    }
                    write_blocking(&producer, &chunk, &feed_stop);
                }
            })?;

        debug!(offset, "Feeding source to output device");
        Ok(Box::new(FeedSource {
            stop,
            producer: Arc::clone(&self.producer),
            consumer: Arc::clone(&self.consumer),
        }))
    }

    fn close(&self) {
        self.running.store(false, Ordering::SeqCst);
        drain(&self.consumer);
        // Dropping the sender wakes the output thread
        self.shutdown.lock().take();
    }
}

impl Drop for CpalBackend {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use ringbuf::traits::Observer;

    use super::*;

    #[test]
    fn test_write_blocking_returns_when_stopped() {
        let rb = HeapRb::<f32>::new(4);
        let (producer, _consumer) = rb.split();
        let producer = Mutex::new(producer);
        let stop = AtomicBool::new(true);
        write_blocking(&producer, &[0.0; 16], &stop);
        assert_eq!(producer.lock().vacant_len(), 4);
    }

    #[test]
    fn test_stopping_a_source_keeps_the_next_one_intact() {
        let rb = HeapRb::<f32>::new(8);
        let (producer, consumer) = rb.split();
        let producer = Arc::new(Mutex::new(producer));
        let consumer = Arc::new(Mutex::new(consumer));

        let old_stop = Arc::new(AtomicBool::new(false));
        write_blocking(&producer, &[0.1; 6], &old_stop);
        let mut old = FeedSource {
            stop: Arc::clone(&old_stop),
            producer: Arc::clone(&producer),
            consumer: Arc::clone(&consumer),
        };
        old.stop();
        assert_eq!(consumer.lock().occupied_len(), 0);

        // Late writes from the stopped feeder are refused
        write_blocking(&producer, &[0.1; 2], &old_stop);
        assert_eq!(consumer.lock().occupied_len(), 0);

        let new_stop = AtomicBool::new(false);
        write_blocking(&producer, &[0.9; 4], &new_stop);
        drop(old);
        let mut consumer = consumer.lock();
        assert_eq!(consumer.occupied_len(), 4);
        assert_eq!(consumer.try_pop(), Some(0.9));
    }

    #[test]
    fn test_write_blocking_fills_buffer() {
        let rb = HeapRb::<f32>::new(8);
        let (producer, _consumer) = rb.split();
        let producer = Mutex::new(producer);
        let stop = AtomicBool::new(false);
        write_blocking(&producer, &[0.5; 8], &stop);
        assert_eq!(producer.lock().vacant_len(), 0);
    }
}
