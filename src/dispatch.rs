//! Resolve interaction events through profile bindings into notifications.

use anyhow::{Result, anyhow};
use serde::Serialize;

use crate::config::Profile;
use crate::events::EventBus;
use crate::tracker::{InteractionEvent, ViewMode};

/// What goes out to HUD subscribers: a named one-shot sound cue, or a
/// text-to-speech request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Notification {
    Cue(String),
    Speech(String),
}

pub fn binding_key(event: &InteractionEvent) -> &'static str {
    match event {
        InteractionEvent::PinchStart => "pinch.start",
        InteractionEvent::PinchEnd => "pinch.end",
        InteractionEvent::ModeChange(ViewMode::Globe) => "mode.globe",
        InteractionEvent::ModeChange(ViewMode::Terrain) => "mode.terrain",
        InteractionEvent::SaturationEnter => "saturation.enter",
        InteractionEvent::SaturationExit => "saturation.exit",
    }
}

pub fn dispatch_event(
    event: &InteractionEvent,
    profile: &Profile,
    bus: &mut EventBus<Notification>,
) -> Result<()> {
    let key = binding_key(event);
    let Some(action) = profile.bindings.get(key) else {
        return Ok(());
    };
    if action.is_empty() || action == "none" {
        return Ok(());
    }

    if let Some(cue) = action.strip_prefix("cue:") {
        bus.publish(Notification::Cue(cue.trim().to_string()));
        return Ok(());
    }
    if let Some(text) = action.strip_prefix("say:") {
        bus.publish(Notification::Speech(text.trim().to_string()));
        return Ok(());
    }

    // validation rejects anything else at profile load; reaching this is a bug
    Err(anyhow!("unknown action mapping for {key} -> '{action}'"))
}
