//! The voice capture collaborator seam.
//!
//! Speech-to-text is an external capability: it may simply not exist in the
//! environment the client runs in. Rather than probing for an engine at every
//! call site, the capability is decided once, when the [VoiceCapture]
//! implementation is constructed, and an unavailable engine is represented by
//! [UnsupportedCapture].
//!
//! At most one capture session is active at a time; starting a new session
//! stops any prior in-flight one.

use std::sync::mpsc::{Receiver, Sender, channel};

use crate::Error;

/// One transcribed chunk of speech from a capture session.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEvent {
    /// The transcribed text.
    pub text: String,
    /// Whether the engine has finalized this chunk. Only finalized
    /// transcripts are handed to the parser; interim results are display-only.
    pub is_final: bool,
}

impl TranscriptEvent {
    /// A finalized transcript event.
    pub fn finalized(text: &str) -> Self {
        Self {
            text: text.to_string(),
            is_final: true,
        }
    }

    /// An interim (not yet finalized) transcript event.
    pub fn interim(text: &str) -> Self {
        Self {
            text: text.to_string(),
            is_final: false,
        }
    }
}

/// A speech-to-text engine that streams transcript events.
pub trait VoiceCapture {
    /// Whether capture can work in this environment.
    ///
    /// Implementations decide this once at construction; callers should not
    /// expect the answer to change over the collaborator's lifetime.
    fn is_available(&self) -> bool;

    /// Begin a capture session and return the stream of transcript events.
    ///
    /// Any prior in-flight session is stopped first. The stream ends when the
    /// session is stopped or the engine finishes on its own.
    ///
    /// # Errors
    /// This function will return an [Error::CaptureUnsupported] if capture is
    /// not available, or an [Error::CaptureError] if the engine fails to
    /// start.
    fn start_capture(&mut self, language_hint: &str) -> Result<Receiver<TranscriptEvent>, Error>;

    /// Stop the active session, if any.
    ///
    /// A user-initiated stop is a normal end of the stream, not an error.
    fn stop(&mut self);

    /// The error that ended the last session mid-stream, if any.
    ///
    /// Callers drain the event stream first and then check this once; an
    /// engine that stopped cleanly leaves nothing here.
    fn take_error(&mut self) -> Option<Error> {
        None
    }
}

/// The capture collaborator used when no speech engine is available.
pub struct UnsupportedCapture;

impl VoiceCapture for UnsupportedCapture {
    fn is_available(&self) -> bool {
        false
    }

    fn start_capture(&mut self, _language_hint: &str) -> Result<Receiver<TranscriptEvent>, Error> {
        Err(Error::CaptureUnsupported)
    }

    fn stop(&mut self) {}
}

/// A capture collaborator that replays a fixed script of transcript events.
///
/// Used to exercise capture-driven flows without a microphone. A one-shot
/// capture ends its stream once the script has been replayed, like an engine
/// that stops after silence; a continuous capture keeps the stream open until
/// [VoiceCapture::stop] is called or a new session starts.
pub struct ScriptedCapture {
    script: Vec<TranscriptEvent>,
    continuous: bool,
    failure: Option<String>,
    live_sender: Option<Sender<TranscriptEvent>>,
}

impl ScriptedCapture {
    /// A one-shot capture that will replay `script` and then end the stream.
    pub fn new(script: Vec<TranscriptEvent>) -> Self {
        Self {
            script,
            continuous: false,
            failure: None,
            live_sender: None,
        }
    }

    /// A one-shot capture that replays each text as one finalized transcript.
    pub fn from_finals(texts: &[&str]) -> Self {
        Self::new(
            texts
                .iter()
                .map(|text| TranscriptEvent::finalized(text))
                .collect(),
        )
    }

    /// Keep the stream open after the script until the session is stopped or
    /// replaced.
    pub fn continuous(mut self) -> Self {
        self.continuous = true;
        self
    }

    /// Make every session fail with [Error::CaptureError] after the script
    /// has been replayed.
    pub fn failing_with(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// Whether a continuous session is currently holding its stream open.
    pub fn is_capturing(&self) -> bool {
        self.live_sender.is_some()
    }
}

impl VoiceCapture for ScriptedCapture {
    fn is_available(&self) -> bool {
        true
    }

    fn start_capture(&mut self, _language_hint: &str) -> Result<Receiver<TranscriptEvent>, Error> {
        // Only one session at a time.
        self.stop();

        let (sender, receiver) = channel();
        for event in &self.script {
            // The receiver is still in scope, so this cannot fail.
            let _ = sender.send(event.clone());
        }

        if self.continuous && self.failure.is_none() {
            self.live_sender = Some(sender);
        }

        Ok(receiver)
    }

    fn stop(&mut self) {
        self.live_sender = None;
    }

    fn take_error(&mut self) -> Option<Error> {
        self.failure.take().map(Error::CaptureError)
    }
}
