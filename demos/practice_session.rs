//! Practice Session Demo — typed conversation against a live tutoring backend.
//!
//! Requires `BACKEND_URL` and `BACKEND_TOKEN` in the environment (or `.env`).
//! With `TTS_API_KEY` set, replies are spoken through the default output
//! device; otherwise the session runs text-only.

use std::io::{BufRead, Write};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use tutor_voice::{
    AudioSpeaker, HttpBackend, HttpSynth, MutedPlayback, ScriptedCapture, SessionConfig,
    SpeechPlayback, VoiceError, VoiceSessionController,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Practice Session Demo — type a message, empty line to quit.");

    let backend = Arc::new(HttpBackend::from_env()?);

    let (playback_tx, playback_rx) = mpsc::unbounded_channel();
    let playback: Box<dyn SpeechPlayback> = match HttpSynth::from_env() {
        Ok(synth) => {
            info!("Speaking replies through the default output device.");
            Box::new(AudioSpeaker::new(Arc::new(synth), playback_tx.clone())?)
        }
        Err(_) => {
            info!("TTS_API_KEY not set; running text-only.");
            Box::new(MutedPlayback::new(playback_tx))
        }
    };

    let capture = ScriptedCapture::new();
    let mut session = VoiceSessionController::new(
        SessionConfig::default(),
        Box::new(capture),
        playback,
        playback_rx,
        backend,
    );

    println!("tutor: {}", session.messages()[0].content);

    let stdin = std::io::stdin();
    loop {
        print!("you: ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 || line.trim().is_empty() {
            break;
        }

        match session.send_typed(&line) {
            Ok(()) => {}
            Err(VoiceError::WordLimit { max }) => {
                println!("(keep it under {} words)", max);
                continue;
            }
            Err(e) => return Err(e.into()),
        }

        while session.is_sending() {
            session.tick().await;
        }
        if let Some(reply) = session.messages().last() {
            println!("tutor: {}", reply.content);
        }
    }

    Ok(())
}
