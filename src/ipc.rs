use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::{error, info, warn};
use notify::{RecursiveMode, Watcher};
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::Signals,
};
use std::{
    fs,
    io::{BufRead, BufReader, Write},
    os::unix::net::{UnixListener, UnixStream},
    sync::atomic::{AtomicBool, Ordering},
    sync::mpsc,
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use crate::config::DaemonConfigState;
use crate::dispatch::Notification;
use crate::events::EventBus;
use crate::pipeline::{self, PipelineStatus};
use crate::voice::VoiceChannel;

fn runtime_dir() -> std::path::PathBuf {
    // ~/.local/run
    let home = UserDirs::new().unwrap().home_dir().to_path_buf();
    let dir = home.join(".local").join("run");
    let _ = fs::create_dir_all(&dir);
    dir
}

pub fn socket_path() -> std::path::PathBuf {
    runtime_dir().join("holoctl.sock")
}

pub fn run_daemon() -> Result<()> {
    // socket
    let sock = socket_path();
    if sock.exists() {
        let _ = fs::remove_file(&sock);
    }
    let listener = UnixListener::bind(&sock)?;
    info!("daemon: listening on {}", sock.display());

    // owned services, constructed here and injected where needed
    let cfg = Arc::new(Mutex::new(DaemonConfigState::load_or_install_default()?));
    let (profile, wake_word, profiles_dir) = {
        let c = cfg.lock().unwrap();
        info!("daemon: active profile '{}'", c.active_name);
        (
            Arc::new(Mutex::new(c.profile.clone())),
            c.profile.voice.wake_word.clone(),
            c.profiles_dir.clone(),
        )
    };
    let status = Arc::new(Mutex::new(PipelineStatus::default()));
    let bus = Arc::new(Mutex::new(EventBus::<Notification>::new()));
    let voice = Arc::new(Mutex::new(VoiceChannel::new(&wake_word)));
    let shutdown = Arc::new(AtomicBool::new(false));

    // the daemon log is itself a subscriber of both buses
    let (note_id, note_rx) = bus.lock().unwrap().subscribe();
    let (voice_id, voice_rx) = voice.lock().unwrap().subscribe();
    voice.lock().unwrap().start_listening();

    // signal thread flips the shared shutdown flag
    {
        let shutdown = shutdown.clone();
        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        thread::spawn(move || {
            if let Some(sig) = signals.forever().next() {
                info!("signal {sig}, shutting down");
                shutdown.store(true, Ordering::Relaxed);
            }
        });
    }

    // profile hot-reload on edits under the profiles dir
    let (tx_watch, rx_watch) = mpsc::channel::<()>();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if res.is_ok() {
            let _ = tx_watch.send(());
        }
    })?;
    watcher.watch(&profiles_dir, RecursiveMode::NonRecursive)?;

    // pipeline thread
    let pipeline_thread = {
        let profile = profile.clone();
        let status = status.clone();
        let bus = bus.clone();
        let shutdown = shutdown.clone();
        thread::spawn(move || {
            if let Err(e) = pipeline::run_pipeline(profile, status, bus, shutdown) {
                error!("pipeline failed: {e}");
            }
        })
    };

    // accept loop
    listener.set_nonblocking(true)?;
    while !shutdown.load(Ordering::Relaxed) {
        if let Ok((stream, _addr)) = listener.accept() {
            let cfg = cfg.clone();
            let profile = profile.clone();
            let status = status.clone();
            let bus = bus.clone();
            let voice = voice.clone();
            let shutdown = shutdown.clone();
            thread::spawn(move || {
                if let Err(e) = handle_client(stream, cfg, profile, status, bus, voice, shutdown) {
                    error!("ipc client error: {e}");
                }
            });
        }

        while let Ok(note) = note_rx.try_recv() {
            match note {
                Notification::Cue(name) => info!("[cue] {name}"),
                Notification::Speech(text) => info!("[speech] {text}"),
            }
        }
        while let Ok(vs) = voice_rx.try_recv() {
            info!("[voice] {vs:?}");
        }

        if rx_watch.try_recv().is_ok() {
            // drain bursts from editors writing several times
            while rx_watch.try_recv().is_ok() {}
            reload_active(&cfg, &profile);
        }

        thread::sleep(Duration::from_millis(5));
    }

    {
        let mut v = voice.lock().unwrap();
        v.stop();
        v.unsubscribe(voice_id);
    }
    bus.lock().unwrap().unsubscribe(note_id);
    let _ = pipeline_thread.join();
    let _ = fs::remove_file(&sock);
    info!("daemon stopped");
    Ok(())
}

fn reload_active(cfg: &Arc<Mutex<DaemonConfigState>>, profile: &Arc<Mutex<crate::config::Profile>>) {
    let mut c = cfg.lock().unwrap();
    match c.reload() {
        Ok(()) => {
            *profile.lock().unwrap() = c.profile.clone();
            info!("profile '{}' reloaded", c.active_name);
        }
        Err(e) => warn!("profile reload failed, keeping last good: {e}"),
    }
}

fn handle_client(
    mut stream: UnixStream,
    cfg: Arc<Mutex<DaemonConfigState>>,
    profile: Arc<Mutex<crate::config::Profile>>,
    status: Arc<Mutex<PipelineStatus>>,
    bus: Arc<Mutex<EventBus<Notification>>>,
    voice: Arc<Mutex<VoiceChannel>>,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Ok(());
    }
    let req: serde_json::Value = serde_json::from_str(&line)?;
    let op = req.get("op").and_then(|v| v.as_str()).unwrap_or("");

    let resp = match op {
        "status" => {
            let c = cfg.lock().unwrap();
            let st = status.lock().unwrap();
            serde_json::json!({
                "ok": true,
                "data": {
                    "active_profile": c.active_name,
                    "profile_name": c.profile.meta.name,
                    "socket": socket_path(),
                    "frames": st.frames,
                    "voice_status": voice.lock().unwrap().status(),
                    "hud_subscribers": bus.lock().unwrap().subscriber_count(),
                    "provider_command": c.profile.provider.command,
                }
            })
        }
        "state" => {
            let st = *status.lock().unwrap();
            serde_json::json!({"ok": true, "data": st})
        }
        "reload" => {
            let mut c = cfg.lock().unwrap();
            match c.reload() {
                Ok(()) => {
                    *profile.lock().unwrap() = c.profile.clone();
                    serde_json::json!({"ok": true, "data": {"active_profile": c.active_name}})
                }
                Err(e) => serde_json::json!({"ok": false, "error": e.to_string()}),
            }
        }
        "use" => {
            let name = req.get("profile").and_then(|v| v.as_str()).unwrap_or("");
            let mut c = cfg.lock().unwrap();
            match c.set_active(name) {
                Ok(()) => {
                    *profile.lock().unwrap() = c.profile.clone();
                    serde_json::json!({"ok": true, "data": {"active_profile": c.active_name}})
                }
                Err(e) => serde_json::json!({"ok": false, "error": e.to_string()}),
            }
        }
        "list" => {
            let c = cfg.lock().unwrap();
            let list = c.list_profiles();
            serde_json::json!({"ok": true, "data": {"profiles": list, "active": c.active_name}})
        }
        "doctor" => {
            let report = cfg.lock().unwrap().doctor_report();
            serde_json::json!({"ok": true, "data": report})
        }
        "voice" => {
            let text = req.get("text").and_then(|v| v.as_str()).unwrap_or("");
            let mut v = voice.lock().unwrap();
            let command = v.on_transcript(text);
            serde_json::json!({"ok": true, "data": {
                "status": v.status(),
                "command": command,
            }})
        }
        "shutdown" => {
            shutdown.store(true, Ordering::Relaxed);
            serde_json::json!({"ok": true, "data": "shutting down"})
        }
        _ => serde_json::json!({"ok": false, "error": format!("unknown op: {op}")}),
    };

    writeln!(stream, "{resp}")?;
    Ok(())
}

// client helper
pub fn client_request(req: serde_json::Value) -> Result<serde_json::Value> {
    let sock = socket_path();
    if !sock.exists() {
        return Err(anyhow!(
            "holoctl daemon is not running (socket missing at {})",
            sock.display()
        ));
    }
    let mut stream = UnixStream::connect(sock)?;
    let line = serde_json::to_string(&req)? + "\n";
    stream.write_all(line.as_bytes())?;
    let mut reader = BufReader::new(stream);
    let mut resp = String::new();
    reader.read_line(&mut resp)?;
    let v: serde_json::Value = serde_json::from_str(&resp)?;
    Ok(v)
}
