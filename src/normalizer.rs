//! Per-frame landmark normalization: raw provider output to interaction records.

use log::warn;

use crate::config::Calibration;
use crate::landmarks::{
    Handedness, LANDMARKS_PER_HAND, Landmark, RawHand, index, planar_distance,
};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RotationControl {
    pub x: f32,
    pub y: f32,
}

/// Derived interaction record for one hand.
#[derive(Debug, Clone)]
pub struct HandInteraction {
    pub landmarks: [Landmark; LANDMARKS_PER_HAND],
    pub handedness: Handedness,
    pub pinch_distance: f32,
    pub is_pinching: bool,
    /// Openness proxy in [0,1]; meaningful for the left hand only.
    pub expansion_factor: f32,
    /// Joystick-style deflection in [-1,1]; meaningful for the right hand only.
    pub rotation_control: RotationControl,
}

/// The per-frame snapshot every consumer reads. Replaced wholesale each frame.
#[derive(Debug, Clone, Default)]
pub struct HandTrackingState {
    pub left_hand: Option<HandInteraction>,
    pub right_hand: Option<HandInteraction>,
}

impl HandTrackingState {
    pub fn hands_visible(&self) -> (bool, bool) {
        (self.left_hand.is_some(), self.right_hand.is_some())
    }
}

/// Pure function of one frame's detections. Malformed hands are dropped;
/// duplicate handedness keeps the last-seen record.
pub fn normalize_frame(cal: &Calibration, hands: &[RawHand]) -> HandTrackingState {
    let mut state = HandTrackingState::default();
    for raw in hands {
        let Some(hand) = normalize_hand(cal, raw) else {
            continue;
        };
        match hand.handedness {
            Handedness::Left => state.left_hand = Some(hand),
            Handedness::Right => state.right_hand = Some(hand),
        }
    }
    state
}

fn normalize_hand(cal: &Calibration, raw: &RawHand) -> Option<HandInteraction> {
    let landmarks: [Landmark; LANDMARKS_PER_HAND] = match raw.landmarks.as_slice().try_into() {
        Ok(arr) => arr,
        Err(_) => {
            warn!(
                "discarding malformed {:?} hand: {} landmarks",
                raw.handedness,
                raw.landmarks.len()
            );
            return None;
        }
    };

    let pinch_distance = planar_distance(&landmarks[index::THUMB_TIP], &landmarks[index::INDEX_TIP]);
    let is_pinching = pinch_distance < cal.pinch_threshold;

    let mut expansion_factor = 0.0;
    let mut rotation_control = RotationControl::default();
    match raw.handedness {
        Handedness::Left => {
            expansion_factor = expansion_from_pinch(cal, pinch_distance);
        }
        Handedness::Right => {
            // hand center = middle finger MCP; frame center maps to zero deflection
            let center = landmarks[index::MIDDLE_MCP];
            rotation_control = RotationControl {
                x: (center.x - 0.5) * 2.0,
                y: (center.y - 0.5) * 2.0,
            };
        }
    }

    Some(HandInteraction {
        landmarks,
        handedness: raw.handedness,
        pinch_distance,
        is_pinching,
        expansion_factor,
        rotation_control,
    })
}

/// Linear map of pinch distance onto [0,1] openness, clamped at both ends.
pub fn expansion_from_pinch(cal: &Calibration, pinch_distance: f32) -> f32 {
    ((pinch_distance - cal.expansion_min) / (cal.expansion_max - cal.expansion_min)).clamp(0.0, 1.0)
}
