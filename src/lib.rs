//! # Tutor Voice - Practice Session Orchestration
//!
//! This crate implements the voice session core of a language-tutoring client:
//! continuous speech capture, a bounded recording window with auto-send, the
//! analyze → chat → speak pipeline, and interruption handling (barge-in,
//! cancel, manual send).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  Voice Session Controller                     │
//! │  ┌──────────────┐  ┌───────────────┐  ┌──────────────┐      │
//! │  │   Capture    │→ │  Transcript   │→ │ Send pipeline │      │
//! │  │ (watch feed) │  │    buffer     │  │ analyze→chat  │      │
//! │  └──────────────┘  └───────────────┘  └──────────────┘      │
//! │         ↓ 20s cap                             ↓              │
//! │  ┌──────────────┐                    ┌──────────────┐       │
//! │  │   Playback   │←───────────────────│ Conversation │       │
//! │  │ (rodio/TTS)  │     Barge-in       │     log      │       │
//! │  └──────────────┘                    └──────────────┘       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The controller is the sole owner of session state and the conversation
//! log. Capture, playback, and the tutoring backend are injected capability
//! interfaces, substitutable with fakes in tests.

pub mod backend;
pub mod capture;
pub mod error;
pub mod message;
pub mod playback;
pub mod session;

pub use backend::{ChatReply, HttpBackend, SpeechAnalysis, TutorBackend};
pub use capture::{CaptureFeed, ScriptedCapture, SpeechCapture};
pub use error::{VoiceError, VoiceResult};
pub use message::{ConversationLog, InputMode, Message, Role};
pub use playback::{
    AudioSpeaker, HttpSynth, MutedPlayback, PlaybackEvent, SilentSynth, SpeechPlayback,
    SpeechSynth,
};
pub use session::{OnAccuracy, SessionConfig, VoiceSessionController};
