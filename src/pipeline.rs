//! The per-frame loop: poll landmarks, normalize, advance the tracker,
//! dispatch events, refresh consumers. Runs on its own thread at a fixed
//! cadence; everything the control plane may read goes through the shared
//! status snapshot.

use anyhow::Result;
use log::{error, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::Profile;
use crate::dispatch::{self, Notification};
use crate::events::EventBus;
use crate::normalizer::{self, HandTrackingState};
use crate::provider::{ChildProcessProvider, IdleProvider, LandmarkProvider};
use crate::scene::{ExpansionGauge, GaugeReading, GlobeView, Region, TerrainView};
use crate::tracker::{InteractionTracker, TrackerSnapshot};

pub const FRAME_RATE: u32 = 60;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PipelineStatus {
    pub frames: u64,
    pub tracker: TrackerSnapshot,
    pub region: Region,
    pub terrain_progress: f32,
    pub terrain_visible: bool,
    pub gauge: GaugeReading,
    pub left_hand: bool,
    pub right_hand: bool,
}

pub fn run_pipeline(
    profile: Arc<Mutex<Profile>>,
    status: Arc<Mutex<PipelineStatus>>,
    bus: Arc<Mutex<EventBus<Notification>>>,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    let mut provider = make_provider(&profile);
    let mut tracker = InteractionTracker::new(profile.lock().unwrap().calibration);
    let mut globe = GlobeView::new();
    let mut terrain = TerrainView::new();
    let mut last_state = HandTrackingState::default();
    let mut frames: u64 = 0;
    let tick = Duration::from_secs(1) / FRAME_RATE;

    info!("pipeline running at {FRAME_RATE} Hz");

    while !shutdown.load(Ordering::Relaxed) {
        let frame_started = Instant::now();
        let cal = { profile.lock().unwrap().calibration };

        // a new render frame never waits on inference; without a fresh
        // detection the previous frame's state stands
        match provider.poll() {
            Ok(Some(frame)) => {
                last_state = normalizer::normalize_frame(&cal, &frame.hands);
            }
            Ok(None) => {}
            Err(e) => warn!("provider poll failed: {e}"),
        }

        tracker.retune(cal);
        let events = tracker.advance(&last_state);
        let snap = tracker.snapshot();

        if !events.is_empty() {
            let p = profile.lock().unwrap();
            let mut bus = bus.lock().unwrap();
            for ev in &events {
                if let Err(e) = dispatch::dispatch_event(ev, &p, &mut bus) {
                    error!("dispatch failed: {e}");
                }
            }
        }

        if let Some(region) = globe.observe(&snap) {
            info!("globe region now {region:?}");
        }
        terrain.observe(&snap);

        frames += 1;
        let (left_hand, right_hand) = last_state.hands_visible();
        *status.lock().unwrap() = PipelineStatus {
            frames,
            tracker: snap,
            region: globe.region(),
            terrain_progress: terrain.progress(),
            terrain_visible: terrain.visible(),
            gauge: ExpansionGauge::read(&snap),
            left_hand,
            right_hand,
        };

        if let Some(rest) = tick.checked_sub(frame_started.elapsed()) {
            thread::sleep(rest);
        }
    }

    // provider drop kills any helper process
    info!("pipeline stopped after {frames} frames");
    Ok(())
}

fn make_provider(profile: &Arc<Mutex<Profile>>) -> Box<dyn LandmarkProvider> {
    let command = { profile.lock().unwrap().provider.command.clone() };
    match command.as_deref() {
        Some(cmd) if !cmd.trim().is_empty() => match ChildProcessProvider::spawn(cmd) {
            Ok(p) => Box::new(p),
            Err(e) => {
                warn!("failed to start landmark provider: {e}; pipeline idle");
                Box::new(IdleProvider)
            }
        },
        _ => {
            warn!("no landmark provider configured; pipeline idle");
            Box::new(IdleProvider)
        }
    }
}
