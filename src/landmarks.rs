//! Hand-landmark wire types shared with the external provider.

use serde::{Deserialize, Serialize};

/// Landmark indices (21-point hand model convention).
#[allow(dead_code)]
pub mod index {
    pub const WRIST: usize = 0;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_MCP: usize = 9;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_TIP: usize = 16;
    pub const PINKY_TIP: usize = 20;
}

pub const LANDMARKS_PER_HAND: usize = 21;

/// One tracked point in normalized camera space (x/y in [0,1], z relative depth).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

/// One detected hand as reported by the provider, unvalidated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawHand {
    pub handedness: Handedness,
    #[serde(default)]
    pub score: f32,
    pub landmarks: Vec<Landmark>,
}

/// One inference result: everything the provider saw in a single video frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionFrame {
    #[serde(default)]
    pub timestamp_ms: u64,
    #[serde(default)]
    pub hands: Vec<RawHand>,
}

/// Euclidean distance in the xy-plane; z is ignored for pinch metrics.
pub fn planar_distance(a: &Landmark, b: &Landmark) -> f32 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_provider_frame_line() {
        let line = r#"{"timestamp_ms": 1234, "hands": [{"handedness": "Left", "score": 0.92, "landmarks": [{"x": 0.1, "y": 0.2, "z": 0.0}]}]}"#;
        let frame: DetectionFrame = serde_json::from_str(line).unwrap();
        assert_eq!(frame.timestamp_ms, 1234);
        assert_eq!(frame.hands.len(), 1);
        assert_eq!(frame.hands[0].handedness, Handedness::Left);
        assert_eq!(frame.hands[0].landmarks.len(), 1);
    }

    #[test]
    fn score_and_hands_are_optional() {
        let frame: DetectionFrame = serde_json::from_str("{}").unwrap();
        assert!(frame.hands.is_empty());
    }

    #[test]
    fn planar_distance_ignores_depth() {
        let a = Landmark { x: 0.0, y: 0.0, z: 5.0 };
        let b = Landmark { x: 3.0, y: 4.0, z: -5.0 };
        assert!((planar_distance(&a, &b) - 5.0).abs() < 1e-6);
    }
}
