//! **Speech capture** — the continuous speech-to-text capability the session
//! consumes.
//!
//! The capability produces cumulative transcript snapshots while active. The
//! latest snapshot is published on a `watch` channel: the controller reads the
//! most recent value on demand instead of draining a queue. Host bindings
//! (browser recognition bridges, OS dictation) implement `SpeechCapture`; the
//! `ScriptedCapture` placeholder drives the session without a microphone.

use crate::error::{VoiceError, VoiceResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// A continuous speech-to-text capability.
///
/// `start` may prompt for OS-level microphone permission on first use and is a
/// no-op when capture is already running. `stop` always succeeds, even if
/// capture was never started.
pub trait SpeechCapture {
    /// Begin continuous capture. Fails with `CaptureUnavailable` when the host
    /// has no capture capability, or `PermissionDenied` when the user declines.
    fn start(&mut self) -> VoiceResult<()>;

    /// End capture. Idempotent.
    fn stop(&mut self);

    /// Latest cumulative transcript snapshot since `start`.
    fn transcript(&self) -> watch::Receiver<String>;
}

/// Placeholder capture: snapshots are pushed through a `CaptureFeed` by the
/// embedding code (host bridges that already deliver text, or tests).
pub struct ScriptedCapture {
    tx: Arc<watch::Sender<String>>,
    active: Arc<AtomicBool>,
    /// When set, the next `start` fails with this error (permission/availability paths).
    pub fail_start: Option<VoiceError>,
}

/// Handle for pushing transcript snapshots into a `ScriptedCapture`.
/// Pushes are ignored while capture is inactive.
#[derive(Clone)]
pub struct CaptureFeed {
    tx: Arc<watch::Sender<String>>,
    active: Arc<AtomicBool>,
}

impl CaptureFeed {
    /// Publish a cumulative transcript snapshot.
    pub fn push_snapshot(&self, text: impl Into<String>) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(text.into());
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl ScriptedCapture {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(String::new());
        Self {
            tx: Arc::new(tx),
            active: Arc::new(AtomicBool::new(false)),
            fail_start: None,
        }
    }

    /// Feed handle for pushing snapshots after the adapter is handed to the session.
    pub fn feed(&self) -> CaptureFeed {
        CaptureFeed {
            tx: Arc::clone(&self.tx),
            active: Arc::clone(&self.active),
        }
    }
}

impl Default for ScriptedCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechCapture for ScriptedCapture {
    fn start(&mut self) -> VoiceResult<()> {
        if let Some(err) = self.fail_start.take() {
            return Err(err);
        }
        if self.active.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        // Fresh recognition run: the cumulative snapshot restarts empty.
        let _ = self.tx.send(String::new());
        debug!("capture started");
        Ok(())
    }

    fn stop(&mut self) {
        if self.active.swap(false, Ordering::SeqCst) {
            debug!("capture stopped");
        }
    }

    fn transcript(&self) -> watch::Receiver<String> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_is_idempotent_and_resets_snapshot() {
        let mut capture = ScriptedCapture::new();
        let feed = capture.feed();
        let rx = capture.transcript();

        capture.start().unwrap();
        feed.push_snapshot("hello");
        assert_eq!(*rx.borrow(), "hello");

        capture.start().unwrap();
        assert_eq!(*rx.borrow(), "hello", "re-start while active is a no-op");

        capture.stop();
        capture.start().unwrap();
        assert_eq!(*rx.borrow(), "", "new run restarts the snapshot");
    }

    #[test]
    fn stop_without_start_is_a_no_op() {
        let mut capture = ScriptedCapture::new();
        let feed = capture.feed();
        capture.stop();
        capture.stop();
        assert!(!feed.is_active());
    }

    #[test]
    fn snapshots_ignored_while_inactive() {
        let capture = ScriptedCapture::new();
        let feed = capture.feed();
        let rx = capture.transcript();
        feed.push_snapshot("should not appear");
        assert_eq!(*rx.borrow(), "");
    }

    #[test]
    fn start_surfaces_permission_denial() {
        let mut capture = ScriptedCapture::new();
        let feed = capture.feed();
        capture.fail_start = Some(VoiceError::PermissionDenied);
        assert!(matches!(capture.start(), Err(VoiceError::PermissionDenied)));
        assert!(!feed.is_active());
    }
}
