//! Temporal interaction state: smoothing, edge detection, rotation integration.

use serde::Serialize;

use crate::config::Calibration;
use crate::normalizer::{HandTrackingState, RotationControl};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Globe,
    Terrain,
}

/// Discrete transitions derived from the per-frame state. Each fires exactly
/// once per transition, never while a condition is merely sustained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionEvent {
    PinchStart,
    PinchEnd,
    ModeChange(ViewMode),
    SaturationEnter,
    SaturationExit,
}

/// Immutable per-frame view of the derived values. Consumers read this and
/// never touch the tracker itself.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TrackerSnapshot {
    pub expansion: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub mode: ViewMode,
    pub saturated: bool,
    pub pinching: bool,
}

#[derive(Debug)]
pub struct InteractionTracker {
    cal: Calibration,
    smoothed_expansion: f32,
    was_pinching: bool,
    accumulated_yaw: f32,
    accumulated_pitch: f32,
    mode: ViewMode,
    saturated: bool,
}

impl InteractionTracker {
    pub fn new(cal: Calibration) -> Self {
        Self {
            cal,
            smoothed_expansion: 0.0,
            was_pinching: false,
            accumulated_yaw: 0.0,
            accumulated_pitch: 0.0,
            mode: ViewMode::Globe,
            saturated: false,
        }
    }

    /// Swap calibration without resetting accumulated state (profile reload).
    pub fn retune(&mut self, cal: Calibration) {
        self.cal = cal;
    }

    /// Advance one frame. Call exactly once per frame, after normalization,
    /// before any consumer reads the snapshot. Missing hands are neutral
    /// inputs, never errors.
    pub fn advance(&mut self, state: &HandTrackingState) -> Vec<InteractionEvent> {
        let mut events = Vec::new();

        // expansion eases toward the left hand's openness; absent hand eases to 0
        let target = state
            .left_hand
            .as_ref()
            .map(|h| h.expansion_factor)
            .unwrap_or(0.0);
        self.smoothed_expansion += (target - self.smoothed_expansion) * self.cal.smoothing;

        // pinch edges come from the right hand; losing the hand counts as release
        let pinching_now = state
            .right_hand
            .as_ref()
            .map(|h| h.is_pinching)
            .unwrap_or(false);
        if pinching_now && !self.was_pinching {
            events.push(InteractionEvent::PinchStart);
        } else if !pinching_now && self.was_pinching {
            events.push(InteractionEvent::PinchEnd);
        }
        self.was_pinching = pinching_now;

        // dead-zoned rotation integration; at rest the yaw keeps a slow ambient spin
        let rot = state
            .right_hand
            .as_ref()
            .map(|h| h.rotation_control)
            .unwrap_or(RotationControl::default());
        self.accumulated_yaw += if rot.x.abs() > self.cal.dead_zone {
            rot.x * self.cal.rotation_rate
        } else {
            self.cal.ambient_spin
        };
        if rot.y.abs() > self.cal.dead_zone {
            self.accumulated_pitch += rot.y * self.cal.rotation_rate;
        }

        // mode flips only on threshold crossings
        let mode_now = if self.smoothed_expansion > self.cal.mode_threshold {
            ViewMode::Terrain
        } else {
            ViewMode::Globe
        };
        if mode_now != self.mode {
            self.mode = mode_now;
            events.push(InteractionEvent::ModeChange(mode_now));
        }

        // saturation is its own boundary, independent of the mode switch
        let saturated_now = self.smoothed_expansion > self.cal.saturation_threshold;
        if saturated_now != self.saturated {
            self.saturated = saturated_now;
            events.push(if saturated_now {
                InteractionEvent::SaturationEnter
            } else {
                InteractionEvent::SaturationExit
            });
        }

        events
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            expansion: self.smoothed_expansion,
            yaw: self.accumulated_yaw,
            pitch: self.accumulated_pitch,
            mode: self.mode,
            saturated: self.saturated,
            pinching: self.was_pinching,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{Handedness, Landmark};
    use crate::normalizer::HandInteraction;

    fn tracker() -> InteractionTracker {
        InteractionTracker::new(Calibration::default())
    }

    fn left(expansion: f32) -> HandTrackingState {
        HandTrackingState {
            left_hand: Some(hand(Handedness::Left, expansion, false, 0.0, 0.0)),
            right_hand: None,
        }
    }

    fn right(pinching: bool, rx: f32, ry: f32) -> HandTrackingState {
        HandTrackingState {
            left_hand: None,
            right_hand: Some(hand(Handedness::Right, 0.0, pinching, rx, ry)),
        }
    }

    fn hand(
        handedness: Handedness,
        expansion: f32,
        pinching: bool,
        rx: f32,
        ry: f32,
    ) -> HandInteraction {
        HandInteraction {
            landmarks: [Landmark::default(); 21],
            handedness,
            pinch_distance: if pinching { 0.01 } else { 0.2 },
            is_pinching: pinching,
            expansion_factor: expansion,
            rotation_control: RotationControl { x: rx, y: ry },
        }
    }

    #[test]
    fn first_smoothing_step_from_rest() {
        let mut t = tracker();
        t.advance(&left(0.5));
        assert!((t.snapshot().expansion - 0.04).abs() < 1e-6);
    }

    #[test]
    fn smoothing_follows_the_geometric_convergence_law() {
        let mut t = tracker();
        let state = left(1.0);
        for _ in 0..50 {
            t.advance(&state);
        }
        let expected = 1.0 - 0.92f32.powi(50);
        assert!((t.snapshot().expansion - expected).abs() < 1e-3);

        for _ in 0..50 {
            t.advance(&state);
        }
        assert!((t.snapshot().expansion - 1.0).abs() < 0.01);
    }

    #[test]
    fn absent_left_hand_eases_back_to_zero() {
        let mut t = tracker();
        for _ in 0..30 {
            t.advance(&left(1.0));
        }
        let empty = HandTrackingState::default();
        for _ in 0..200 {
            t.advance(&empty);
        }
        assert!(t.snapshot().expansion < 0.01);
    }

    #[test]
    fn pinch_edges_fire_once_per_transition() {
        let mut t = tracker();
        let sequence = [false, false, true, true, true, false, false];
        let mut starts = Vec::new();
        let mut ends = Vec::new();
        for (i, &pinching) in sequence.iter().enumerate() {
            for ev in t.advance(&right(pinching, 0.0, 0.0)) {
                match ev {
                    InteractionEvent::PinchStart => starts.push(i),
                    InteractionEvent::PinchEnd => ends.push(i),
                    _ => {}
                }
            }
        }
        assert_eq!(starts, vec![2]);
        assert_eq!(ends, vec![5]);
    }

    #[test]
    fn losing_the_right_hand_releases_the_pinch() {
        let mut t = tracker();
        let events = t.advance(&right(true, 0.0, 0.0));
        assert!(events.contains(&InteractionEvent::PinchStart));

        let events = t.advance(&HandTrackingState::default());
        assert!(events.contains(&InteractionEvent::PinchEnd));
        assert!(!t.snapshot().pinching);
    }

    #[test]
    fn yaw_accumulates_past_the_dead_zone() {
        let mut t = tracker();
        t.advance(&right(false, 0.5, 0.0));
        let snap = t.snapshot();
        assert!((snap.yaw - 0.025).abs() < 1e-6);
        assert_eq!(snap.pitch, 0.0);
    }

    #[test]
    fn inside_the_dead_zone_yaw_keeps_the_ambient_spin() {
        let mut t = tracker();
        for _ in 0..3 {
            t.advance(&right(false, 0.05, 0.08));
        }
        let snap = t.snapshot();
        assert!((snap.yaw - 0.0015).abs() < 1e-6);
        assert_eq!(snap.pitch, 0.0);
    }

    #[test]
    fn no_hands_still_drifts_the_ambient_spin() {
        let mut t = tracker();
        t.advance(&HandTrackingState::default());
        assert!((t.snapshot().yaw - 0.0005).abs() < 1e-7);
    }

    #[test]
    fn pitch_integrates_downward_deflection() {
        let mut t = tracker();
        for _ in 0..4 {
            t.advance(&right(false, 0.0, -0.8));
        }
        assert!((t.snapshot().pitch + 0.16).abs() < 1e-5);
    }

    #[test]
    fn mode_switch_is_edge_triggered_in_both_directions() {
        let mut t = tracker();
        let open = left(1.0);
        let closed = left(0.0);
        let mut changes = Vec::new();

        for _ in 0..120 {
            for ev in t.advance(&open) {
                if let InteractionEvent::ModeChange(m) = ev {
                    changes.push(m);
                }
            }
        }
        assert_eq!(changes, vec![ViewMode::Terrain]);
        assert_eq!(t.snapshot().mode, ViewMode::Terrain);

        for _ in 0..120 {
            for ev in t.advance(&closed) {
                if let InteractionEvent::ModeChange(m) = ev {
                    changes.push(m);
                }
            }
        }
        assert_eq!(changes, vec![ViewMode::Terrain, ViewMode::Globe]);
    }

    #[test]
    fn saturation_is_a_separate_edge_above_the_mode_threshold() {
        let mut t = tracker();
        let open = left(1.0);
        let mut enters = 0;
        let mut mode_at_enter = None;
        for _ in 0..200 {
            for ev in t.advance(&open) {
                if ev == InteractionEvent::SaturationEnter {
                    enters += 1;
                    mode_at_enter = Some(t.snapshot().mode);
                }
            }
        }
        assert_eq!(enters, 1);
        // the mode switch happened well before saturation
        assert_eq!(mode_at_enter, Some(ViewMode::Terrain));
        assert!(t.snapshot().saturated);

        let mut exits = 0;
        for _ in 0..200 {
            for ev in t.advance(&left(0.0)) {
                if ev == InteractionEvent::SaturationExit {
                    exits += 1;
                }
            }
        }
        assert_eq!(exits, 1);
        assert!(!t.snapshot().saturated);
    }

    #[test]
    fn end_to_end_left_pinch_distance_drives_smoothed_expansion() {
        use crate::landmarks::{RawHand, index};
        use crate::normalizer::normalize_frame;

        let mut landmarks = vec![Landmark::default(); 21];
        landmarks[index::THUMB_TIP] = Landmark { x: 0.2, y: 0.5, z: 0.0 };
        landmarks[index::INDEX_TIP] = Landmark { x: 0.3, y: 0.5, z: 0.0 };
        let raw = RawHand {
            handedness: Handedness::Left,
            score: 0.9,
            landmarks,
        };

        let state = normalize_frame(&Calibration::default(), &[raw]);
        let left_hand = state.left_hand.as_ref().unwrap();
        assert!((left_hand.expansion_factor - 0.5).abs() < 1e-5);

        let mut t = tracker();
        t.advance(&state);
        assert!((t.snapshot().expansion - 0.04).abs() < 1e-5);
    }

    #[test]
    fn end_to_end_right_hand_center_drives_yaw() {
        use crate::landmarks::{RawHand, index};
        use crate::normalizer::normalize_frame;

        let mut landmarks = vec![Landmark::default(); 21];
        landmarks[index::MIDDLE_MCP] = Landmark { x: 0.75, y: 0.5, z: 0.0 };
        let raw = RawHand {
            handedness: Handedness::Right,
            score: 0.9,
            landmarks,
        };

        let state = normalize_frame(&Calibration::default(), &[raw]);
        let rot = state.right_hand.as_ref().unwrap().rotation_control;
        assert!((rot.x - 0.5).abs() < 1e-6);
        assert_eq!(rot.y, 0.0);

        let mut t = tracker();
        t.advance(&state);
        t.advance(&state);
        assert!((t.snapshot().yaw - 0.05).abs() < 1e-6);
    }

    #[test]
    fn retune_keeps_accumulated_state() {
        let mut t = tracker();
        for _ in 0..10 {
            t.advance(&right(false, 1.0, 0.0));
        }
        let yaw_before = t.snapshot().yaw;

        let mut cal = Calibration::default();
        cal.rotation_rate = 0.0;
        cal.ambient_spin = 0.0;
        t.retune(cal);
        t.advance(&right(false, 1.0, 0.0));
        assert!((t.snapshot().yaw - yaw_before).abs() < 1e-7);
    }
}
