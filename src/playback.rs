//! **Speech playback** — text-to-speech output with the barge-in kill-switch.
//!
//! At most one utterance plays at a time: `speak` supersedes whatever is
//! currently playing, with no error for the superseded utterance. Adapters
//! emit `Started`/`Ended`/`Error` on a channel the controller subscribes to
//! once; `Ended` and `Error` both return playback to idle. Synthesis failure
//! is non-fatal — the session falls back to text-only output.

use crate::error::{VoiceError, VoiceResult};
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Playback lifecycle transitions for one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    Started,
    Ended,
    Error(String),
}

/// A text-to-speech capability. Events for the utterance arrive on the channel
/// supplied at adapter construction.
pub trait SpeechPlayback {
    /// Begin asynchronous playback of `text`, cancelling any current utterance.
    fn speak(&self, text: &str) -> VoiceResult<()>;

    /// Cancel current playback. No-op when idle.
    fn stop(&self);
}

/// Text-only fallback: emits `Started` then `Ended` immediately so the session
/// state machine progresses without audio hardware.
pub struct MutedPlayback {
    events: mpsc::UnboundedSender<PlaybackEvent>,
}

impl MutedPlayback {
    pub fn new(events: mpsc::UnboundedSender<PlaybackEvent>) -> Self {
        Self { events }
    }
}

impl SpeechPlayback for MutedPlayback {
    fn speak(&self, _text: &str) -> VoiceResult<()> {
        let _ = self.events.send(PlaybackEvent::Started);
        let _ = self.events.send(PlaybackEvent::Ended);
        Ok(())
    }

    fn stop(&self) {}
}

/// Backend that turns text into audio bytes (WAV/MP3). Return an empty vec to
/// skip playback for the utterance.
pub trait SpeechSynth: Send + Sync {
    fn synthesize(&self, text: &str) -> VoiceResult<Vec<u8>>;
}

/// Placeholder synth: always empty, nothing plays.
#[derive(Debug, Default)]
pub struct SilentSynth;

impl SpeechSynth for SilentSynth {
    fn synthesize(&self, _text: &str) -> VoiceResult<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// Production synth: OpenAI-compatible `/audio/speech` endpoint.
/// Configure with `TTS_API_URL`, `TTS_API_KEY`, `TTS_MODEL`, `TTS_VOICE`.
#[derive(Debug, Clone)]
pub struct HttpSynth {
    /// Base URL without trailing slash (e.g. https://api.openai.com/v1).
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub voice: String,
    client: reqwest::blocking::Client,
}

impl HttpSynth {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        voice: impl Into<String>,
    ) -> VoiceResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| VoiceError::SynthesisUnavailable(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            voice: voice.into(),
            client,
        })
    }

    /// Build from environment: TTS_API_URL, TTS_API_KEY, TTS_MODEL, TTS_VOICE.
    pub fn from_env() -> VoiceResult<Self> {
        let base_url = std::env::var("TTS_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let api_key = std::env::var("TTS_API_KEY")
            .map_err(|_| VoiceError::Config("TTS_API_KEY not set".to_string()))?;
        let model = std::env::var("TTS_MODEL").unwrap_or_else(|_| "tts-1".to_string());
        let voice = std::env::var("TTS_VOICE").unwrap_or_else(|_| "nova".to_string());
        Self::new(base_url, api_key, model, voice)
    }
}

impl SpeechSynth for HttpSynth {
    fn synthesize(&self, text: &str) -> VoiceResult<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/audio/speech", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
            "voice": self.voice,
        });
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| VoiceError::SynthesisUnavailable(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let detail = res.text().unwrap_or_default();
            return Err(VoiceError::SynthesisUnavailable(format!(
                "TTS API error {}: {}",
                status, detail
            )));
        }
        let bytes = res
            .bytes()
            .map_err(|e| VoiceError::SynthesisUnavailable(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Speaker playing synthesized audio through the default output device.
///
/// The speaker is the sole owner of the output sink; a generation counter
/// ensures a superseded utterance never emits events for the one that replaced
/// it. Synthesis and playback run off-thread so `speak` returns immediately.
pub struct AudioSpeaker {
    _stream: OutputStream,
    _stream_handle: OutputStreamHandle,
    sink: Arc<Sink>,
    synth: Arc<dyn SpeechSynth>,
    events: mpsc::UnboundedSender<PlaybackEvent>,
    generation: Arc<AtomicU64>,
}

impl AudioSpeaker {
    /// Open the default output device. Fails with `SynthesisUnavailable` when
    /// the host has no audio output.
    pub fn new(
        synth: Arc<dyn SpeechSynth>,
        events: mpsc::UnboundedSender<PlaybackEvent>,
    ) -> VoiceResult<Self> {
        let (stream, stream_handle) = OutputStream::try_default()
            .map_err(|e| VoiceError::SynthesisUnavailable(e.to_string()))?;
        let sink = Sink::try_new(&stream_handle)
            .map_err(|e| VoiceError::SynthesisUnavailable(e.to_string()))?;
        info!("speaker ready for playback");
        Ok(Self {
            _stream: stream,
            _stream_handle: stream_handle,
            sink: Arc::new(sink),
            synth,
            events,
            generation: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn is_playing(&self) -> bool {
        !self.sink.empty()
    }
}

/// Gates worker-side effects on the utterance still being current. Once
/// superseded, the worker must neither touch the sink nor emit events: a stale
/// `Started` or `Error` would be attributed to the utterance that replaced it.
struct UtteranceGuard {
    events: mpsc::UnboundedSender<PlaybackEvent>,
    counter: Arc<AtomicU64>,
    generation: u64,
}

impl UtteranceGuard {
    fn is_current(&self) -> bool {
        self.counter.load(Ordering::SeqCst) == self.generation
    }

    /// Send `event` only while the utterance is current.
    fn send(&self, event: PlaybackEvent) {
        if self.is_current() {
            let _ = self.events.send(event);
        }
    }
}

impl SpeechPlayback for AudioSpeaker {
    fn speak(&self, text: &str) -> VoiceResult<()> {
        // Supersede whatever is playing; the old utterance goes quiet with no error.
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.sink.stop();

        let text = text.to_string();
        let sink = Arc::clone(&self.sink);
        let synth = Arc::clone(&self.synth);
        let events = self.events.clone();
        let gen_counter = Arc::clone(&self.generation);

        thread::spawn(move || {
            let guard = UtteranceGuard {
                events,
                counter: gen_counter,
                generation,
            };
            let bytes = match synth.synthesize(&text) {
                Ok(b) => b,
                Err(e) => {
                    warn!("synthesis failed: {}", e);
                    guard.send(PlaybackEvent::Error(e.to_string()));
                    return;
                }
            };
            if bytes.is_empty() {
                guard.send(PlaybackEvent::Started);
                guard.send(PlaybackEvent::Ended);
                return;
            }
            let source = match rodio::Decoder::new(Cursor::new(bytes)) {
                Ok(s) => s,
                Err(e) => {
                    guard.send(PlaybackEvent::Error(format!("decode failed: {}", e)));
                    return;
                }
            };
            // Superseded utterances must not queue on the sink the replacement
            // now owns.
            if !guard.is_current() {
                return;
            }
            sink.append(source.convert_samples::<f32>());
            guard.send(PlaybackEvent::Started);
            sink.sleep_until_end();
            guard.send(PlaybackEvent::Ended);
        });
        Ok(())
    }

    fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.sink.stop();
        debug!("playback stopped");
    }
}
