//! Read-only consumers of the tracker snapshot: globe region, terrain
//! reveal, expansion gauge. Each owns its own rate/threshold constants.

use serde::Serialize;

use crate::tracker::TrackerSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Americas,
    Pacific,
    #[default]
    Asia,
    Africa,
    Europe,
}

/// Map accumulated yaw (radians) onto the named sector bands.
pub fn region_for_yaw(yaw: f32) -> Region {
    let degrees = yaw.rem_euclid(std::f32::consts::TAU).to_degrees();
    if degrees > 30.0 && degrees < 100.0 {
        Region::Americas
    } else if (100.0..190.0).contains(&degrees) {
        Region::Pacific
    } else if (190.0..280.0).contains(&degrees) {
        Region::Asia
    } else if (280.0..330.0).contains(&degrees) {
        Region::Africa
    } else {
        Region::Europe
    }
}

/// Globe consumer. Applies its own spin multiplier to the shared yaw before
/// deriving the region under the reticle.
#[derive(Debug)]
pub struct GlobeView {
    spin_scale: f32,
    region: Region,
}

impl GlobeView {
    pub fn new() -> Self {
        Self::with_spin_scale(1.0)
    }

    pub fn with_spin_scale(spin_scale: f32) -> Self {
        Self {
            spin_scale,
            region: Region::Asia,
        }
    }

    /// Returns the new region when the reticle moved into a different band.
    pub fn observe(&mut self, snap: &TrackerSnapshot) -> Option<Region> {
        let region = region_for_yaw(snap.yaw * self.spin_scale);
        if region != self.region {
            self.region = region;
            Some(region)
        } else {
            None
        }
    }

    pub fn region(&self) -> Region {
        self.region
    }
}

impl Default for GlobeView {
    fn default() -> Self {
        Self::new()
    }
}

/// Terrain consumer: reveal progress over the upper half of the expansion
/// range, snapped at the top to stop jitter at full reveal.
#[derive(Debug, Default)]
pub struct TerrainView {
    progress: f32,
}

impl TerrainView {
    const REVEAL_START: f32 = 0.5;
    const SNAP: f32 = 0.99;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, snap: &TrackerSnapshot) {
        let mut progress =
            ((snap.expansion - Self::REVEAL_START) / (1.0 - Self::REVEAL_START)).clamp(0.0, 1.0);
        if progress > Self::SNAP {
            progress = 1.0;
        }
        self.progress = progress;
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn visible(&self) -> bool {
        self.progress > 0.01
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct GaugeReading {
    pub percent: u8,
    pub maxed: bool,
}

/// HUD gauge consumer: integer percent plus the maxed-out flag.
pub struct ExpansionGauge;

impl ExpansionGauge {
    pub fn read(snap: &TrackerSnapshot) -> GaugeReading {
        GaugeReading {
            percent: (snap.expansion.clamp(0.0, 1.0) * 100.0).round() as u8,
            maxed: snap.saturated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(expansion: f32, yaw: f32) -> TrackerSnapshot {
        TrackerSnapshot {
            expansion,
            yaw,
            ..TrackerSnapshot::default()
        }
    }

    #[test]
    fn region_bands_match_the_sector_layout() {
        let deg = |d: f32| d.to_radians();
        assert_eq!(region_for_yaw(deg(0.0)), Region::Europe);
        assert_eq!(region_for_yaw(deg(65.0)), Region::Americas);
        assert_eq!(region_for_yaw(deg(145.0)), Region::Pacific);
        assert_eq!(region_for_yaw(deg(235.0)), Region::Asia);
        assert_eq!(region_for_yaw(deg(300.0)), Region::Africa);
        assert_eq!(region_for_yaw(deg(350.0)), Region::Europe);
    }

    #[test]
    fn negative_yaw_wraps_around() {
        assert_eq!(
            region_for_yaw((-295.0f32).to_radians()),
            region_for_yaw(65.0f32.to_radians())
        );
    }

    #[test]
    fn globe_reports_region_changes_once() {
        let mut globe = GlobeView::new();
        let at_americas = snap(0.0, 65.0f32.to_radians());
        assert_eq!(globe.observe(&at_americas), Some(Region::Americas));
        assert_eq!(globe.observe(&at_americas), None);
        assert_eq!(globe.region(), Region::Americas);
    }

    #[test]
    fn spin_scale_is_per_consumer() {
        let mut slow = GlobeView::with_spin_scale(0.5);
        // scaled back into the default Asia band: no change reported
        assert_eq!(slow.observe(&snap(0.0, 470.0f32.to_radians())), None);
        assert_eq!(slow.region(), Region::Asia);
    }

    #[test]
    fn terrain_progress_covers_the_upper_half() {
        let mut terrain = TerrainView::new();
        terrain.observe(&snap(0.4, 0.0));
        assert_eq!(terrain.progress(), 0.0);
        assert!(!terrain.visible());

        terrain.observe(&snap(0.75, 0.0));
        assert!((terrain.progress() - 0.5).abs() < 1e-6);
        assert!(terrain.visible());

        terrain.observe(&snap(0.996, 0.0));
        assert_eq!(terrain.progress(), 1.0);
    }

    #[test]
    fn gauge_rounds_percent_and_carries_the_maxed_flag() {
        let mut s = snap(0.424, 0.0);
        assert_eq!(ExpansionGauge::read(&s).percent, 42);
        assert!(!ExpansionGauge::read(&s).maxed);

        s.expansion = 0.97;
        s.saturated = true;
        let reading = ExpansionGauge::read(&s);
        assert_eq!(reading.percent, 97);
        assert!(reading.maxed);
    }
}
