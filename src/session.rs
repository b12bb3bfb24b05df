//! **Voice session controller** — the state machine at the heart of a practice
//! session.
//!
//! Coordinates continuous capture, a bounded recording window with auto-send,
//! the analyze → chat → speak pipeline, and user interruptions (barge-in,
//! cancel, manual send). The controller is the sole owner of session state and
//! the conversation log; adapters are one-way event sources it subscribes to
//! once. Backend calls run as spawned tasks reporting back on an internal
//! channel, so a dispatched call is never aborted — the session applies or
//! discards its result when it settles.
//!
//! State is the `Idle | Recording` axis plus two busy flags (`sending`,
//! `speaking`) that may overlap on the typed path. The recording cap is a
//! single cancellable deadline, not a polling interval: leaving `Recording`
//! early drops the window and the deadline with it.

use crate::backend::TutorBackend;
use crate::capture::SpeechCapture;
use crate::error::{VoiceError, VoiceResult};
use crate::message::{ConversationLog, InputMode, Message};
use crate::playback::{PlaybackEvent, SpeechPlayback};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Optional observer invoked when a voice message receives its accuracy patch.
/// The UI hangs celebration effects here (confetti above 80 in the shipped
/// product); the controller itself carries no celebration policy.
pub type OnAccuracy = Option<Arc<dyn Fn(&Message) + Send + Sync>>;

/// Configuration for one practice session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Hard cap on one recording window; reaching it auto-sends (default: 20s).
    pub record_cap: Duration,
    /// Client-side word cap for typed messages (default: 30).
    pub typed_word_cap: usize,
    /// Seeded assistant greeting, appended and spoken at session start.
    pub greeting: String,
    /// Synthetic assistant text appended when a chat call fails.
    pub apology: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            record_cap: Duration::from_secs(20),
            typed_word_cap: 30,
            greeting: "Hello! I'm your AI English tutor. Let's start practicing! \
                       Tell me about your day or ask me anything you'd like to discuss."
                .to_string(),
            apology: "I'm sorry, I encountered an error. Please try again.".to_string(),
        }
    }
}

/// Primary state axis. Sending/speaking are busy flags layered on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Recording,
}

/// Ephemeral recording window; exists only while recording.
#[derive(Debug, Clone, Copy)]
struct RecordingWindow {
    started_at: Instant,
    deadline: Instant,
}

/// Pipeline results reported back by spawned backend calls. Both resolve
/// against the conversation log by stable message id, so patches land on the
/// right turn regardless of arrival order.
enum PipelineEvent {
    Analysis {
        message_id: Uuid,
        result: VoiceResult<crate::backend::SpeechAnalysis>,
    },
    ChatSettled {
        result: VoiceResult<String>,
    },
}

/// The session state machine. See the module docs for the transition table.
pub struct VoiceSessionController {
    config: SessionConfig,
    capture: Box<dyn SpeechCapture>,
    playback: Box<dyn SpeechPlayback>,
    backend: Arc<dyn TutorBackend>,

    log: ConversationLog,
    live_buffer: String,
    transcript_rx: watch::Receiver<String>,

    phase: Phase,
    window: Option<RecordingWindow>,
    busy_sending: bool,
    busy_speaking: bool,

    pipeline_tx: mpsc::UnboundedSender<PipelineEvent>,
    pipeline_rx: mpsc::UnboundedReceiver<PipelineEvent>,
    playback_rx: mpsc::UnboundedReceiver<PlaybackEvent>,

    on_accuracy: OnAccuracy,
}

impl VoiceSessionController {
    /// Create a session. Appends the seeded greeting and speaks it; a playback
    /// failure leaves the greeting text-only.
    pub fn new(
        config: SessionConfig,
        capture: Box<dyn SpeechCapture>,
        playback: Box<dyn SpeechPlayback>,
        playback_rx: mpsc::UnboundedReceiver<PlaybackEvent>,
        backend: Arc<dyn TutorBackend>,
    ) -> Self {
        let transcript_rx = capture.transcript();
        let (pipeline_tx, pipeline_rx) = mpsc::unbounded_channel();
        let mut session = Self {
            config,
            capture,
            playback,
            backend,
            log: ConversationLog::new(),
            live_buffer: String::new(),
            transcript_rx,
            phase: Phase::Idle,
            window: None,
            busy_sending: false,
            busy_speaking: false,
            pipeline_tx,
            pipeline_rx,
            playback_rx,
            on_accuracy: None,
        };

        let greeting = session.config.greeting.clone();
        session.log.push(Message::assistant(greeting.clone()));
        match session.playback.speak(&greeting) {
            Ok(()) => session.busy_speaking = true,
            Err(e) => warn!("greeting playback unavailable: {}", e),
        }
        session
    }

    /// Attach the accuracy-patched observer.
    pub fn set_on_accuracy(&mut self, hook: Arc<dyn Fn(&Message) + Send + Sync>) {
        self.on_accuracy = Some(hook);
    }

    // --- UI events -----------------------------------------------------------

    /// Press-to-talk. Barge-in: ongoing AI speech is stopped before capture
    /// starts, so the microphone and the speaker are never active together.
    /// A capture failure leaves the session idle; the error is the caller's
    /// user-visible indicator.
    pub fn press_talk(&mut self) -> VoiceResult<()> {
        if self.busy_speaking {
            self.playback.stop();
            self.busy_speaking = false;
            info!("barge-in: playback stopped");
        }
        if self.phase == Phase::Recording {
            return Ok(());
        }
        self.capture.start()?;
        self.live_buffer.clear();
        let now = Instant::now();
        self.window = Some(RecordingWindow {
            started_at: now,
            deadline: now + self.config.record_cap,
        });
        self.phase = Phase::Recording;
        info!("recording started ({:?} cap)", self.config.record_cap);
        Ok(())
    }

    /// Release the talk control: stop capture and send the buffered transcript,
    /// or return to idle when nothing was said. No-op when not recording.
    pub fn release_talk(&mut self) {
        if self.phase != Phase::Recording {
            return;
        }
        self.capture.stop();
        self.close_window();
        self.live_buffer = self.transcript_rx.borrow_and_update().clone();
        if self.live_buffer.trim().is_empty() {
            debug!("empty transcript, back to idle");
            self.live_buffer.clear();
            return;
        }
        self.begin_voice_send();
    }

    /// Abort the recording: stop capture and discard the buffer. No message is
    /// created. No-op when not recording.
    pub fn cancel_recording(&mut self) {
        if self.phase != Phase::Recording {
            return;
        }
        self.capture.stop();
        self.close_window();
        self.transcript_rx.mark_unchanged();
        self.live_buffer.clear();
        info!("recording cancelled, transcript discarded");
    }

    /// Send a typed message. Never analyzed for accuracy; capped at
    /// `typed_word_cap` whitespace-separated words. Ignored while a send
    /// pipeline is already in flight.
    pub fn send_typed(&mut self, text: &str) -> VoiceResult<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        let words = text.split_whitespace().count();
        if words > self.config.typed_word_cap {
            return Err(VoiceError::WordLimit {
                max: self.config.typed_word_cap,
            });
        }
        if self.busy_sending {
            debug!("typed send ignored: pipeline in flight");
            return Ok(());
        }
        self.log.push(Message::user(text, InputMode::Typed));
        self.busy_sending = true;

        let message = text.to_string();
        let backend = Arc::clone(&self.backend);
        let tx = self.pipeline_tx.clone();
        info!("typed message dispatched ({} words)", words);
        tokio::spawn(async move {
            let chat = backend.chat(&message).await;
            let _ = tx.send(PipelineEvent::ChatSettled {
                result: chat.map(|r| r.response),
            });
        });
        Ok(())
    }

    /// Stop ongoing AI speech. Never cancels an in-flight send pipeline.
    pub fn stop_speech(&mut self) {
        self.playback.stop();
        self.busy_speaking = false;
    }

    // --- event pump ----------------------------------------------------------

    /// Process one event: a pipeline result, a playback transition, a transcript
    /// snapshot while recording, or the recording deadline. Returns `false`
    /// when the playback adapter has gone away and the session should wind down.
    pub async fn tick(&mut self) -> bool {
        let deadline = self.window.map(|w| w.deadline);
        let recording = self.phase == Phase::Recording;

        tokio::select! {
            ev = self.pipeline_rx.recv() => match ev {
                Some(ev) => {
                    self.apply_pipeline(ev);
                    true
                }
                // The controller holds a sender clone, so this arm is unreachable
                // in practice; treat closure as shutdown anyway.
                None => false,
            },
            ev = self.playback_rx.recv() => match ev {
                Some(ev) => {
                    self.apply_playback(ev);
                    true
                }
                None => false,
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                info!("recording cap reached, auto-sending");
                self.release_talk();
                true
            },
            res = self.transcript_rx.changed(), if recording => {
                if res.is_ok() {
                    self.live_buffer = self.transcript_rx.borrow_and_update().clone();
                }
                true
            },
        }
    }

    /// Drive the session until shutdown.
    pub async fn run(&mut self) {
        while self.tick().await {}
    }

    // --- accessors -----------------------------------------------------------

    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    /// Live transcript buffer: captured speech not yet committed as a message.
    pub fn live_transcript(&self) -> &str {
        &self.live_buffer
    }

    pub fn is_recording(&self) -> bool {
        self.phase == Phase::Recording
    }

    pub fn is_sending(&self) -> bool {
        self.busy_sending
    }

    pub fn is_speaking(&self) -> bool {
        self.busy_speaking
    }

    /// Time spent in the current recording window, if recording.
    pub fn recording_elapsed(&self) -> Option<Duration> {
        self.window.map(|w| w.started_at.elapsed())
    }

    // --- internals -----------------------------------------------------------

    fn close_window(&mut self) {
        self.phase = Phase::Idle;
        self.window = None;
    }

    /// Commit the live buffer as a voice message and dispatch the pipeline:
    /// analysis first (self-comparison), then chat. One pipeline at a time;
    /// triggers while one is in flight are ignored.
    fn begin_voice_send(&mut self) {
        if self.busy_sending {
            debug!("voice send ignored: pipeline in flight");
            return;
        }
        let transcript = std::mem::take(&mut self.live_buffer).trim().to_string();
        if transcript.is_empty() {
            return;
        }
        let id = self.log.push(Message::user(transcript.clone(), InputMode::Voice));
        self.busy_sending = true;

        let backend = Arc::clone(&self.backend);
        let tx = self.pipeline_tx.clone();
        info!(%id, "voice message dispatched");
        tokio::spawn(async move {
            let analysis = backend.analyze_speech(&transcript, &transcript).await;
            let _ = tx.send(PipelineEvent::Analysis {
                message_id: id,
                result: analysis,
            });
            let chat = backend.chat(&transcript).await;
            let _ = tx.send(PipelineEvent::ChatSettled {
                result: chat.map(|r| r.response),
            });
        });
    }

    fn apply_pipeline(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::Analysis {
                message_id,
                result: Ok(analysis),
            } => {
                let hook = self.on_accuracy.clone();
                match self
                    .log
                    .patch_accuracy(message_id, analysis.accuracy, analysis.corrections)
                {
                    Some(msg) => {
                        info!(%message_id, accuracy = msg.accuracy, "accuracy patched");
                        if let Some(hook) = hook {
                            hook(msg);
                        }
                    }
                    None => warn!(%message_id, "accuracy patch had no target"),
                }
            }
            // Analysis failure never aborts the pipeline; the turn simply
            // stays unscored and chat proceeds.
            PipelineEvent::Analysis {
                message_id,
                result: Err(e),
            } => {
                warn!(%message_id, "speech analysis failed: {}", e);
            }
            PipelineEvent::ChatSettled { result: Ok(reply) } => {
                self.busy_sending = false;
                self.log.push(Message::assistant(reply.clone()));
                match self.playback.speak(&reply) {
                    Ok(()) => self.busy_speaking = true,
                    Err(e) => warn!("reply playback unavailable, text only: {}", e),
                }
            }
            PipelineEvent::ChatSettled { result: Err(e) } => {
                self.busy_sending = false;
                warn!("chat failed: {}", e);
                let apology = self.config.apology.clone();
                self.log.push(Message::assistant(apology));
            }
        }
    }

    fn apply_playback(&mut self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::Started => self.busy_speaking = true,
            PlaybackEvent::Ended => self.busy_speaking = false,
            PlaybackEvent::Error(detail) => {
                warn!("playback error: {}", detail);
                self.busy_speaking = false;
            }
        }
    }
}
