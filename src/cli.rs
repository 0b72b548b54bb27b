use anyhow::{Result, anyhow};
use log::warn;
use pico_args::Arguments;
use std::{env, process::Command};

use crate::config::{self, DaemonConfigState};
use crate::dispatch::{self, Notification};
use crate::events::EventBus;
use crate::ipc;
use crate::normalizer;
use crate::provider::{LandmarkProvider, ReplayProvider};
use crate::scene::{ExpansionGauge, GlobeView, TerrainView};
use crate::tracker::InteractionTracker;

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // Hidden daemon mode (spawned by `start`)
    if pargs.contains("--daemon") {
        return ipc::run_daemon();
    }

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    // Flags-based help (-h/--help)
    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("start") => {
            let exe = std::env::current_exe()?;
            let child = Command::new(exe).arg("--daemon").spawn()?;
            println!("holoctl: started daemon (pid={})", child.id());
            Ok(())
        }

        Some("stop") => {
            let r = ipc::client_request(serde_json::json!({"op":"shutdown"}))?;
            print_response(&r);
            Ok(())
        }

        Some("status") => {
            let r = ipc::client_request(serde_json::json!({"op":"status"}))?;
            print_response(&r);
            Ok(())
        }

        Some("state") => {
            let r = ipc::client_request(serde_json::json!({"op":"state"}))?;
            print_response(&r);
            Ok(())
        }

        Some("reload") => {
            let r = ipc::client_request(serde_json::json!({"op":"reload"}))?;
            print_response(&r);
            Ok(())
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: holoctl use <profile_name>"))?;
            let r = ipc::client_request(serde_json::json!({"op":"use","profile":name}))?;
            print_response(&r);
            Ok(())
        }

        Some("list") => {
            let r = ipc::client_request(serde_json::json!({"op":"list"}))?;
            print_response(&r);
            Ok(())
        }

        Some("doctor") => {
            let r = ipc::client_request(serde_json::json!({"op":"doctor"}))?;
            print_response(&r);
            Ok(())
        }

        Some("voice") => {
            let mut words: Vec<String> = Vec::new();
            while let Ok(w) = pargs.free_from_str::<String>() {
                words.push(w);
            }
            if words.is_empty() {
                return Err(anyhow!("usage: holoctl voice <transcript...>"));
            }
            let r = ipc::client_request(serde_json::json!({"op":"voice","text":words.join(" ")}))?;
            print_response(&r);
            Ok(())
        }

        Some("simulate") => {
            let path: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: holoctl simulate <frames.jsonl>"))?;
            run_simulation(&path)
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

/// Offline run: feed recorded frames through the normalizer and tracker at
/// full speed, printing every event and the final derived state.
fn run_simulation(path: &str) -> Result<()> {
    let profile = match DaemonConfigState::load_or_install_default() {
        Ok(c) => c.profile,
        Err(e) => {
            warn!("config unavailable ({e}); using the built-in profile");
            config::builtin_profile()?
        }
    };

    let mut replay = ReplayProvider::from_file(path)?;
    println!("simulating {} frames with profile bindings", replay.remaining());

    let mut tracker = InteractionTracker::new(profile.calibration);
    let mut globe = GlobeView::new();
    let mut terrain = TerrainView::new();
    let mut bus = EventBus::<Notification>::new();
    let (_id, notes) = bus.subscribe();

    let mut i: usize = 0;
    while let Some(frame) = replay.poll()? {
        let state = normalizer::normalize_frame(&profile.calibration, &frame.hands);
        for ev in tracker.advance(&state) {
            dispatch::dispatch_event(&ev, &profile, &mut bus)?;
            let key = dispatch::binding_key(&ev);
            match notes.try_recv() {
                Ok(Notification::Cue(name)) => println!("frame {i:>5}: {key} -> cue:{name}"),
                Ok(Notification::Speech(text)) => println!("frame {i:>5}: {key} -> say:{text}"),
                Err(_) => println!("frame {i:>5}: {key}"),
            }
        }
        let snap = tracker.snapshot();
        if let Some(region) = globe.observe(&snap) {
            println!("frame {i:>5}: region -> {region:?}");
        }
        terrain.observe(&snap);
        i += 1;
    }

    let snap = tracker.snapshot();
    let summary = serde_json::json!({
        "tracker": snap,
        "region": globe.region(),
        "terrain_progress": terrain.progress(),
        "gauge": ExpansionGauge::read(&snap),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn print_help() {
    println!(
        r#"holoctl — hand-gesture interaction daemon

USAGE:
  holoctl help [command]          Show general or command-specific help
  holoctl start                   Start the daemon
  holoctl stop                    Stop the daemon
  holoctl status                  Show daemon state
  holoctl state                   Show the live tracker snapshot
  holoctl reload                  Reload the active profile
  holoctl use <name>              Switch active profile
  holoctl list                    List profiles
  holoctl doctor                  Diagnose camera access & configuration
  holoctl voice <transcript...>   Feed a transcript to the voice channel
  holoctl simulate <frames.jsonl> Replay recorded frames offline

TIPS:
  - Profiles: ~/.config/holoctl/profiles
  - Active profile pointer: ~/.config/holoctl/active
  - Provider protocol: one detection-frame JSON object per stdout line
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "start" => println!("usage: holoctl start\nStarts the background daemon."),
        "stop" => println!("usage: holoctl stop\nStops the running daemon."),
        "status" => println!(
            "usage: holoctl status\nShows active profile, frame count, voice status, socket."
        ),
        "state" => println!(
            "usage: holoctl state\nShows the current smoothed expansion, yaw/pitch, mode, region."
        ),
        "reload" => println!(
            "usage: holoctl reload\nReloads the current profile; keeps last good on error."
        ),
        "use" => {
            println!("usage: holoctl use <name>\nSwitches active profile to <name> and reloads.")
        }
        "list" => {
            println!("usage: holoctl list\nLists available profiles.")
        }
        "doctor" => println!(
            "usage: holoctl doctor\nChecks camera nodes, video group membership, profiles."
        ),
        "voice" => println!(
            "usage: holoctl voice <transcript...>\nFeeds one recognized transcript to the daemon."
        ),
        "simulate" => println!(
            "usage: holoctl simulate <frames.jsonl>\nRuns recorded detection frames through the pipeline offline."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
