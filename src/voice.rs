//! Voice command channel boundary: status machine over recognized transcripts.
//!
//! Speech recognition itself is external; this side consumes free-text
//! transcripts and publishes status transitions. Constructed and owned by the
//! daemon, never a process-wide singleton.

use std::sync::mpsc::Receiver;

use log::info;
use serde::Serialize;

use crate::events::{EventBus, SubscriberId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceStatus {
    #[default]
    Idle,
    Listening,
    Recognizing,
    WakeWordDetected,
}

#[derive(Debug)]
pub struct VoiceChannel {
    wake_word: String,
    status: VoiceStatus,
    bus: EventBus<VoiceStatus>,
}

impl VoiceChannel {
    pub fn new(wake_word: &str) -> Self {
        Self {
            wake_word: wake_word.to_lowercase(),
            status: VoiceStatus::Idle,
            bus: EventBus::new(),
        }
    }

    pub fn status(&self) -> VoiceStatus {
        self.status
    }

    pub fn subscribe(&mut self) -> (SubscriberId, Receiver<VoiceStatus>) {
        self.bus.subscribe()
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.bus.unsubscribe(id)
    }

    pub fn start_listening(&mut self) {
        self.transition(VoiceStatus::Listening);
    }

    pub fn stop(&mut self) {
        self.transition(VoiceStatus::Idle);
    }

    /// Feed one recognized transcript. Returns the text after the wake word
    /// when it matched; command interpretation is up to the caller.
    pub fn on_transcript(&mut self, text: &str) -> Option<String> {
        self.transition(VoiceStatus::Recognizing);

        let lowered = text.to_lowercase();
        match lowered.find(&self.wake_word) {
            Some(pos) => {
                let command = lowered[pos + self.wake_word.len()..].trim().to_string();
                self.transition(VoiceStatus::WakeWordDetected);
                info!("wake word heard, command: '{command}'");
                Some(command)
            }
            None => {
                self.transition(VoiceStatus::Listening);
                None
            }
        }
    }

    fn transition(&mut self, next: VoiceStatus) {
        if next != self.status {
            self.status = next;
            self.bus.publish(next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wake_word_yields_the_command_remainder() {
        let mut voice = VoiceChannel::new("Holo");
        let command = voice.on_transcript("hey HOLO show the map");
        assert_eq!(command.as_deref(), Some("show the map"));
        assert_eq!(voice.status(), VoiceStatus::WakeWordDetected);
    }

    #[test]
    fn unmatched_transcript_returns_to_listening() {
        let mut voice = VoiceChannel::new("holo");
        assert!(voice.on_transcript("unrelated chatter").is_none());
        assert_eq!(voice.status(), VoiceStatus::Listening);
    }

    #[test]
    fn status_transitions_are_published_in_order() {
        let mut voice = VoiceChannel::new("holo");
        let (_id, rx) = voice.subscribe();

        voice.start_listening();
        voice.on_transcript("holo engage");

        let seen: Vec<VoiceStatus> = rx.try_iter().collect();
        assert_eq!(
            seen,
            vec![
                VoiceStatus::Listening,
                VoiceStatus::Recognizing,
                VoiceStatus::WakeWordDetected,
            ]
        );
    }

    #[test]
    fn repeated_status_is_not_republished() {
        let mut voice = VoiceChannel::new("holo");
        let (_id, rx) = voice.subscribe();
        voice.stop();
        assert!(rx.try_recv().is_err());
    }
}
