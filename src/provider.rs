//! Landmark provider boundary: opaque sources of per-frame detections.
//!
//! The inference engine lives outside this process. The child-process
//! provider speaks one DetectionFrame JSON object per stdout line; the
//! replay provider feeds recorded frames back for `simulate` and tests.

use anyhow::{Context, Result};
use log::{info, warn};
use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{Receiver, TryRecvError, channel};
use std::thread;

use crate::landmarks::DetectionFrame;

pub trait LandmarkProvider: Send {
    /// Latest completed detection, if inference produced one since the last
    /// poll. `None` means the previous frame's state stands; the render loop
    /// must never stall waiting here.
    fn poll(&mut self) -> Result<Option<DetectionFrame>>;
}

/// Fallback when no helper is configured or it failed to start: the pipeline
/// keeps reporting "no hands detected" indefinitely.
pub struct IdleProvider;

impl LandmarkProvider for IdleProvider {
    fn poll(&mut self) -> Result<Option<DetectionFrame>> {
        Ok(None)
    }
}

/// Helper subprocess emitting detection frames as JSON Lines. A reader
/// thread decouples the child's pace from the render loop; the child is
/// killed when the provider is dropped.
pub struct ChildProcessProvider {
    child: Child,
    rx: Receiver<DetectionFrame>,
    reported_gone: bool,
}

impl ChildProcessProvider {
    pub fn spawn(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace();
        let program = parts.next().context("empty provider command")?;
        let mut child = Command::new(program)
            .args(parts)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("failed to start landmark provider '{command}'"))?;

        let stdout = child.stdout.take().context("provider stdout unavailable")?;
        let (tx, rx) = channel();
        thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<DetectionFrame>(&line) {
                    Ok(frame) => {
                        if tx.send(frame).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("provider emitted an unparseable frame: {e}"),
                }
            }
        });

        info!("landmark provider started: {command}");
        Ok(Self {
            child,
            rx,
            reported_gone: false,
        })
    }
}

impl LandmarkProvider for ChildProcessProvider {
    fn poll(&mut self) -> Result<Option<DetectionFrame>> {
        // drain to the most recent frame; stale detections are superseded
        let mut latest = None;
        loop {
            match self.rx.try_recv() {
                Ok(frame) => latest = Some(frame),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.reported_gone {
                        self.reported_gone = true;
                        warn!("landmark provider stream ended; reporting no hands from here on");
                    }
                    break;
                }
            }
        }
        Ok(latest)
    }
}

impl Drop for ChildProcessProvider {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Recorded frames, one per poll, then silence.
pub struct ReplayProvider {
    frames: std::vec::IntoIter<DetectionFrame>,
}

impl ReplayProvider {
    pub fn new(frames: Vec<DetectionFrame>) -> Self {
        Self {
            frames: frames.into_iter(),
        }
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read replay file {path}"))?;
        Ok(Self::new(parse_replay(&text)?))
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl LandmarkProvider for ReplayProvider {
    fn poll(&mut self) -> Result<Option<DetectionFrame>> {
        Ok(self.frames.next())
    }
}

/// One DetectionFrame JSON object per non-empty line.
pub fn parse_replay(text: &str) -> Result<Vec<DetectionFrame>> {
    let mut frames = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let frame: DetectionFrame = serde_json::from_str(line)
            .with_context(|| format!("bad detection frame on line {}", lineno + 1))?;
        frames.push(frame);
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_hands_out_frames_in_order_then_dries_up() {
        let mut provider = ReplayProvider::new(vec![
            DetectionFrame {
                timestamp_ms: 1,
                hands: vec![],
            },
            DetectionFrame {
                timestamp_ms: 2,
                hands: vec![],
            },
        ]);
        assert_eq!(provider.remaining(), 2);
        assert_eq!(provider.poll().unwrap().unwrap().timestamp_ms, 1);
        assert_eq!(provider.poll().unwrap().unwrap().timestamp_ms, 2);
        assert!(provider.poll().unwrap().is_none());
    }

    #[test]
    fn parse_replay_skips_blank_lines() {
        let text = "\n{\"timestamp_ms\": 5}\n\n{\"timestamp_ms\": 6}\n";
        let frames = parse_replay(text).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].timestamp_ms, 6);
    }

    #[test]
    fn parse_replay_reports_the_bad_line() {
        let err = parse_replay("{\"timestamp_ms\": 1}\nnot json\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn idle_provider_never_produces_frames() {
        let mut provider = IdleProvider;
        for _ in 0..5 {
            assert!(provider.poll().unwrap().is_none());
        }
    }
}
