use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::info;
use serde::{Deserialize, Deserializer};
use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::PathBuf,
};
use thiserror::Error;

#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
}

/// Calibrated interaction constants. These encode tuned UX behavior, not
/// implementation detail; changing one changes what users feel.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Calibration {
    pub pinch_threshold: f32,
    pub expansion_min: f32,
    pub expansion_max: f32,
    pub smoothing: f32,
    pub mode_threshold: f32,
    pub saturation_threshold: f32,
    pub dead_zone: f32,
    pub rotation_rate: f32,
    pub ambient_spin: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            pinch_threshold: 0.05,
            expansion_min: 0.02,
            expansion_max: 0.18,
            smoothing: 0.08,
            mode_threshold: 0.5,
            saturation_threshold: 0.95,
            dead_zone: 0.1,
            rotation_rate: 0.05,
            ambient_spin: 0.0005,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoiceSettings {
    #[serde(default = "default_wake_word")]
    pub wake_word: String,
    #[serde(default)]
    pub allow_speech: bool,
}

fn default_wake_word() -> String {
    "holo".to_string()
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            wake_word: default_wake_word(),
            allow_speech: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderSettings {
    /// Helper command producing DetectionFrame JSON Lines on stdout.
    /// Absent or empty means the pipeline runs idle (no hands, ever).
    #[serde(default)]
    pub command: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub meta: Meta,
    pub calibration: Calibration,
    #[serde(default)]
    pub voice: VoiceSettings,
    #[serde(default)]
    pub provider: ProviderSettings,

    // accept nested tables and flatten them into "a.b" -> "value"
    #[serde(deserialize_with = "deserialize_bindings_flat")]
    pub bindings: HashMap<String, String>,
}

fn deserialize_bindings_flat<'de, D>(
    de: D,
) -> std::result::Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = toml::Value::deserialize(de)?;
    let mut out = HashMap::new();
    match flatten_into("", &value, &mut out) {
        Ok(()) => Ok(out),
        Err(msg) => Err(serde::de::Error::custom(msg)),
    }
}

fn flatten_into(
    prefix: &str,
    value: &toml::Value,
    out: &mut HashMap<String, String>,
) -> std::result::Result<(), String> {
    match value {
        toml::Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
            Ok(())
        }
        toml::Value::Table(table) => {
            for (k, v) in table {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                flatten_into(&key, v, out)?;
            }
            Ok(())
        }
        other => {
            if prefix.is_empty() {
                Err(format!("bindings must be a table, got {}", other.type_str()))
            } else {
                Err(format!(
                    "binding '{}' value must be a string, got {}",
                    prefix,
                    other.type_str()
                ))
            }
        }
    }
}

/// Profile faults caught at load time, before anything reaches the pipeline.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("calibration.pinch_threshold must be positive, got {0}")]
    NonPositivePinch(f32),
    #[error("calibration expansion range is empty: min {min} >= max {max}")]
    EmptyExpansionRange { min: f32, max: f32 },
    #[error("calibration.smoothing must be in (0, 1], got {0}")]
    BadSmoothing(f32),
    #[error("calibration.dead_zone must be in [0, 1), got {0}")]
    BadDeadZone(f32),
    #[error("mode_threshold {mode} must lie below saturation_threshold {saturation}")]
    ThresholdOrder { mode: f32, saturation: f32 },
    #[error("empty binding key")]
    EmptyBindingKey,
    #[error("binding '{0}' has an empty action")]
    EmptyAction(String),
    #[error("binding '{key}' has invalid action '{action}'")]
    InvalidAction { key: String, action: String },
    #[error("binding '{0}' uses say: but voice.allow_speech=false")]
    SpeechNotAllowed(String),
}

pub fn validate_profile(p: &Profile) -> std::result::Result<(), ProfileError> {
    let c = &p.calibration;
    if c.pinch_threshold <= 0.0 {
        return Err(ProfileError::NonPositivePinch(c.pinch_threshold));
    }
    if c.expansion_min >= c.expansion_max {
        return Err(ProfileError::EmptyExpansionRange {
            min: c.expansion_min,
            max: c.expansion_max,
        });
    }
    if !(c.smoothing > 0.0 && c.smoothing <= 1.0) {
        return Err(ProfileError::BadSmoothing(c.smoothing));
    }
    if !(0.0..1.0).contains(&c.dead_zone) {
        return Err(ProfileError::BadDeadZone(c.dead_zone));
    }
    if c.mode_threshold >= c.saturation_threshold {
        return Err(ProfileError::ThresholdOrder {
            mode: c.mode_threshold,
            saturation: c.saturation_threshold,
        });
    }

    for (key, action) in &p.bindings {
        if key.trim().is_empty() {
            return Err(ProfileError::EmptyBindingKey);
        }
        if action.trim().is_empty() {
            return Err(ProfileError::EmptyAction(key.clone()));
        }
        let ok = action.starts_with("cue:") || action.starts_with("say:") || action == "none";
        if !ok {
            return Err(ProfileError::InvalidAction {
                key: key.clone(),
                action: action.clone(),
            });
        }
        if action.starts_with("say:") && !p.voice.allow_speech {
            return Err(ProfileError::SpeechNotAllowed(key.clone()));
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DaemonConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

fn config_dir() -> PathBuf {
    let home = UserDirs::new().unwrap().home_dir().to_path_buf();
    home.join(".config").join("holoctl")
}

fn profiles_dir() -> PathBuf {
    config_dir().join("profiles")
}

fn active_ptr_path() -> PathBuf {
    config_dir().join("active")
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

/// The compiled-in default profile, for offline runs without a config dir.
pub fn builtin_profile() -> Result<Profile> {
    let profile: Profile = toml::from_str(default_profile_text())?;
    validate_profile(&profile)?;
    Ok(profile)
}

impl DaemonConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        let cfgdir = config_dir();
        let profdir = profiles_dir();
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = active_ptr_path();
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = Self::load_profile(&active_name)?;

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    /// Reload the active profile; on failure the last good profile stays.
    pub fn reload(&mut self) -> Result<()> {
        self.profile = Self::load_profile(&self.active_name)?;
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profiles_dir.join(format!("{name}.toml"));
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.reload()?;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                if let Some(ext) = e.path().extension() {
                    if ext == "toml" {
                        if let Some(stem) = e.path().file_stem().and_then(|s| s.to_str()) {
                            v.push(stem.to_string());
                        }
                    }
                }
            }
        }
        v.sort();
        v
    }

    fn load_profile(name: &str) -> Result<Profile> {
        let path = profiles_dir().join(format!("{name}.toml"));
        let txt = fs::read_to_string(&path)
            .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
        let profile: Profile =
            toml::from_str(&txt).map_err(|e| anyhow!("failed to parse {}: {e}", path.display()))?;
        validate_profile(&profile)?;
        Ok(profile)
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        serde_json::json!({
            "camera_nodes": detect_camera_nodes(),
            "video_group_member": check_in_video_group(),
            "config_dir": self.config_dir,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "provider_command": self.profile.provider.command,
            "hints": {
                "add_user_to_video_group": "sudo usermod -aG video $USER && newgrp video",
                "provider_protocol": "one detection-frame JSON object per stdout line",
            }
        })
    }
}

fn detect_camera_nodes() -> Vec<String> {
    let mut out = vec![];
    if let Ok(rd) = fs::read_dir("/dev") {
        for e in rd.flatten() {
            if e.path()
                .file_name()
                .and_then(|s| s.to_str())
                .map(|s| s.starts_with("video"))
                .unwrap_or(false)
            {
                out.push(e.path().display().to_string());
            }
        }
    }
    out.sort();
    out
}

fn check_in_video_group() -> bool {
    if let Ok(s) = fs::read_to_string("/etc/group") {
        let user = whoami::username();
        for line in s.lines() {
            if line.starts_with("video:") {
                if line
                    .split(':')
                    .nth(3)
                    .unwrap_or("")
                    .split(',')
                    .any(|u| u == user)
                {
                    return true;
                }
            }
        }
    }
    false
}
