//! Linux desktop backend.
//!
//! Drives PulseAudio/PipeWire through `pactl`, MPRIS players through
//! `playerctl`, the X display through `xset`/`xrandr`/`scrot` and power state
//! through `systemctl`.
//!
//! The bot normally runs as root while audio and X belong to the logged-in
//! user, so session commands are executed as that user:
//! `sudo -u <user> env PULSE_SERVER=... XDG_RUNTIME_DIR=... <command>`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use deskhand_types::config::DesktopConfig;
use deskhand_types::errors::DeskhandError;
use deskhand_types::traits::DesktopController;
use deskhand_types::{AudioStatus, CommandOutput, PlaybackState, Screenshot, SystemReport, Toggle};
use regex::Regex;
use sysinfo::System;
use tracing::{debug, info, warn};

use crate::shell::{CommandRunner, CommandSpec};
use crate::system::SystemProbe;

/// Wait after switching tracks so the player reports the new metadata.
const DEFAULT_TRACK_SETTLE: Duration = Duration::from_secs(1);

const SINK: &str = "@DEFAULT_SINK@";
const SOURCE: &str = "@DEFAULT_SOURCE@";

// ============================================================
// User session
// ============================================================

/// The desktop user whose audio and X session commands run in.
#[derive(Debug, Clone)]
pub struct UserSession {
    user_name: String,
    uid: u32,
    /// Already running as that user; no `sudo` needed.
    is_current_user: bool,
}

impl UserSession {
    pub fn new(user_name: impl Into<String>, uid: u32) -> Self {
        let is_current_user = nix::unistd::geteuid().as_raw() == uid;
        Self {
            user_name: user_name.into(),
            uid,
            is_current_user,
        }
    }

    /// A session that always switches user through `sudo`.
    pub fn via_sudo(user_name: impl Into<String>, uid: u32) -> Self {
        Self {
            user_name: user_name.into(),
            uid,
            is_current_user: false,
        }
    }

    fn runtime_dir(&self) -> String {
        format!("/run/user/{}", self.uid)
    }

    /// Environment PulseAudio clients need to find the user's server.
    fn with_audio_env(&self, spec: CommandSpec) -> CommandSpec {
        let runtime_dir = self.runtime_dir();
        spec.env("PULSE_SERVER", format!("unix:{runtime_dir}/pulse/native"))
            .env("XDG_RUNTIME_DIR", runtime_dir)
    }

    /// Run `spec` as the session user, carrying its environment across `sudo`.
    fn wrap(&self, spec: CommandSpec) -> CommandSpec {
        if self.is_current_user {
            return spec;
        }
        let assignments = spec.envs.iter().map(|(k, v)| format!("{k}={v}"));
        CommandSpec::new("sudo")
            .args(["-u", self.user_name.as_str(), "env"])
            .args(assignments)
            .arg(spec.program)
            .args(spec.args)
    }
}

// ============================================================
// Output parsing
// ============================================================

/// A monitor reported as connected by `xrandr`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Monitor {
    pub name: String,
    pub geometry: Option<Geometry>,
}

/// Position and size of a monitor within the X screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

/// Parsers for the text output of the desktop tools.
struct Parsers {
    percent: Regex,
    geometry: Regex,
}

impl Parsers {
    fn new() -> Result<Self, DeskhandError> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| DeskhandError::Internal(format!("invalid pattern {pattern}: {e}")))
        };
        Ok(Self {
            percent: compile(r"(\d+)%")?,
            geometry: compile(r"(\d+)x(\d+)\+(\d+)\+(\d+)")?,
        })
    }

    /// First percentage in `pactl get-sink-volume` output (the front-left channel).
    fn volume(&self, output: &str) -> Option<u32> {
        self.percent
            .captures(output)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    /// Connected monitors in `xrandr` order.
    fn monitors(&self, xrandr: &str) -> Vec<Monitor> {
        xrandr
            .lines()
            .filter(|line| line.contains(" connected"))
            .filter_map(|line| {
                let name = line.split_whitespace().next()?.to_string();
                let geometry = self.geometry.captures(line).and_then(|c| {
                    let field = |i: usize| c.get(i)?.as_str().parse::<u32>().ok();
                    Some(Geometry {
                        width: field(1)?,
                        height: field(2)?,
                        x: field(3)?,
                        y: field(4)?,
                    })
                });
                Some(Monitor { name, geometry })
            })
            .collect()
    }
}

/// `Mute: yes` means the device is silenced.
fn parse_mute(output: &str) -> Toggle {
    let lower = output.to_ascii_lowercase();
    if lower.contains("yes") {
        Toggle::Off
    } else if lower.contains("no") {
        Toggle::On
    } else {
        Toggle::Unknown
    }
}

fn parse_playback(output: &str) -> PlaybackState {
    match output.trim().to_ascii_lowercase().as_str() {
        "playing" => PlaybackState::Playing,
        "paused" => PlaybackState::Paused,
        _ => PlaybackState::Stopped,
    }
}

// ============================================================
// Controller
// ============================================================

/// [`DesktopController`] for a Linux desktop running X11 and PulseAudio/PipeWire.
pub struct LinuxDesktop {
    runner: Arc<dyn CommandRunner>,
    session: UserSession,
    display: String,
    volume_step: u8,
    screenshot_dir: PathBuf,
    track_settle: Duration,
    probe: SystemProbe,
    parsers: Parsers,
}

impl LinuxDesktop {
    /// Build the backend from the desktop config section.
    pub fn new(runner: Arc<dyn CommandRunner>, config: &DesktopConfig) -> Result<Self, DeskhandError> {
        let uid = config
            .user_id
            .ok_or_else(|| DeskhandError::Config("desktop.user_id is not set".to_string()))?;
        let session = UserSession::new(config.user_name.clone(), uid);
        Self::with_session(runner, session, config)
    }

    /// Build the backend around an explicit session.
    pub fn with_session(
        runner: Arc<dyn CommandRunner>,
        session: UserSession,
        config: &DesktopConfig,
    ) -> Result<Self, DeskhandError> {
        Ok(Self {
            probe: SystemProbe::new(
                runner.clone(),
                Duration::from_secs(config.network_sample_secs),
            ),
            runner,
            session,
            display: config.display.clone(),
            volume_step: config.volume_step_percent,
            screenshot_dir: config.screenshot_dir.clone(),
            track_settle: DEFAULT_TRACK_SETTLE,
            parsers: Parsers::new()?,
        })
    }

    /// Override how long to wait for metadata after a track change.
    pub fn with_track_settle(mut self, settle: Duration) -> Self {
        self.track_settle = settle;
        self
    }

    /// Replace the system probe (tests point it at fixture files).
    pub fn with_probe(mut self, probe: SystemProbe) -> Self {
        self.probe = probe;
        self
    }

    async fn audio(&self, spec: CommandSpec) -> Result<CommandOutput, DeskhandError> {
        let spec = self.session.wrap(self.session.with_audio_env(spec));
        self.runner.run(&spec).await
    }

    async fn x11(&self, spec: CommandSpec) -> Result<CommandOutput, DeskhandError> {
        let spec = self.session.wrap(spec.env("DISPLAY", self.display.clone()));
        self.runner.run(&spec).await
    }

    async fn pactl(&self, args: &[&str]) -> Result<(), DeskhandError> {
        self.audio(CommandSpec::new("pactl").args(args.iter().copied()))
            .await
            .map(|_| ())
    }

    async fn playerctl(&self, arg: &str) -> Result<(), DeskhandError> {
        self.audio(CommandSpec::new("playerctl").arg(arg))
            .await
            .map(|_| ())
    }

    async fn volume(&self) -> Option<u32> {
        match self.audio(CommandSpec::new("pactl").args(["get-sink-volume", SINK])).await {
            Ok(out) => self.parsers.volume(&out.stdout),
            Err(e) => {
                debug!(error = %e, "volume unavailable");
                None
            }
        }
    }

    async fn mute_state(&self, what: &str, device: &str) -> Toggle {
        match self.audio(CommandSpec::new("pactl").args([what, device])).await {
            Ok(out) => parse_mute(&out.stdout),
            Err(e) => {
                debug!(error = %e, device, "mute state unavailable");
                Toggle::Unknown
            }
        }
    }

    async fn playback(&self) -> PlaybackState {
        match self.audio(CommandSpec::new("playerctl").arg("status")).await {
            Ok(out) => parse_playback(&out.stdout),
            // playerctl exits non-zero when no player is running.
            Err(_) => PlaybackState::Stopped,
        }
    }

    async fn track(&self) -> Option<String> {
        let spec = CommandSpec::new("playerctl").args(["metadata", "--format", "{{artist}} - {{title}}"]);
        match self.audio(spec).await {
            Ok(out) => {
                let track = out.stdout.trim();
                (!track.is_empty() && track != "-").then(|| track.to_string())
            }
            Err(_) => None,
        }
    }

    fn volume_delta(&self, sign: char) -> String {
        format!("{sign}{}%", self.volume_step)
    }
}

#[async_trait]
impl DesktopController for LinuxDesktop {
    async fn sound_on(&self) -> Result<(), DeskhandError> {
        self.pactl(&["set-sink-mute", SINK, "0"]).await
    }

    async fn sound_off(&self) -> Result<(), DeskhandError> {
        self.pactl(&["set-sink-mute", SINK, "1"]).await
    }

    async fn volume_up(&self) -> Result<(), DeskhandError> {
        self.pactl(&["set-sink-volume", SINK, &self.volume_delta('+')]).await
    }

    async fn volume_down(&self) -> Result<(), DeskhandError> {
        self.pactl(&["set-sink-volume", SINK, &self.volume_delta('-')]).await
    }

    async fn microphone_on(&self) -> Result<(), DeskhandError> {
        self.pactl(&["set-source-mute", SOURCE, "0"]).await
    }

    async fn microphone_off(&self) -> Result<(), DeskhandError> {
        self.pactl(&["set-source-mute", SOURCE, "1"]).await
    }

    async fn play(&self) -> Result<(), DeskhandError> {
        self.playerctl("play").await
    }

    async fn pause(&self) -> Result<(), DeskhandError> {
        self.playerctl("pause").await
    }

    async fn next_track(&self) -> Result<(), DeskhandError> {
        self.playerctl("next").await?;
        tokio::time::sleep(self.track_settle).await;
        Ok(())
    }

    async fn previous_track(&self) -> Result<(), DeskhandError> {
        self.playerctl("previous").await?;
        tokio::time::sleep(self.track_settle).await;
        Ok(())
    }

    async fn audio_status(&self) -> AudioStatus {
        let (volume_percent, sound, microphone, playback, track) = tokio::join!(
            self.volume(),
            self.mute_state("get-sink-mute", SINK),
            self.mute_state("get-source-mute", SOURCE),
            self.playback(),
            self.track(),
        );
        AudioStatus {
            sound,
            volume_percent,
            microphone,
            playback,
            track,
        }
    }

    async fn display_off(&self) -> Result<(), DeskhandError> {
        self.x11(CommandSpec::new("xset").args(["dpms", "force", "off"]))
            .await
            .map(|_| ())
    }

    async fn suspend(&self) -> Result<(), DeskhandError> {
        info!("suspending system");
        self.runner
            .run(&CommandSpec::new("systemctl").arg("suspend"))
            .await
            .map(|_| ())
    }

    async fn reboot(&self) -> Result<(), DeskhandError> {
        info!("rebooting system");
        self.runner
            .run(&CommandSpec::new("systemctl").arg("reboot"))
            .await
            .map(|_| ())
    }

    async fn take_screenshots(&self) -> Result<Vec<Screenshot>, DeskhandError> {
        if self.runner.run(&CommandSpec::new("which").arg("scrot")).await.is_err() {
            return Err(DeskhandError::Platform(
                "scrot is not installed (install it with your package manager)".to_string(),
            ));
        }

        let xrandr = self.x11(CommandSpec::new("xrandr")).await?;
        let monitors = self.parsers.monitors(&xrandr.stdout);
        if monitors.is_empty() {
            return Err(DeskhandError::Platform("no monitors detected".to_string()));
        }

        let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S%.3f");
        let total = monitors.len();
        let mut shots = Vec::with_capacity(total);

        for (index, monitor) in monitors.iter().enumerate() {
            let Some(g) = monitor.geometry else {
                debug!(monitor = %monitor.name, "monitor has no geometry, skipping");
                continue;
            };
            let path = self
                .screenshot_dir
                .join(format!("screenshot-{stamp}-{}.png", monitor.name));
            let spec = CommandSpec::new("scrot")
                .arg(path.to_string_lossy())
                .arg("-a")
                .arg(format!("{},{},{},{}", g.x, g.y, g.width, g.height));

            match self.x11(spec).await {
                Ok(_) => shots.push(Screenshot {
                    path,
                    caption: format!("Monitor {} ({} of {total})", monitor.name, index + 1),
                }),
                Err(e) => warn!(monitor = %monitor.name, error = %e, "screenshot failed"),
            }
        }

        if shots.is_empty() {
            return Err(DeskhandError::Platform(
                "no screenshots were created".to_string(),
            ));
        }
        info!(count = shots.len(), "screenshots captured");
        Ok(shots)
    }

    async fn cleanup_files(&self, paths: &[PathBuf]) {
        for path in paths {
            if let Err(e) = tokio::fs::remove_file(path).await {
                warn!(path = %path.display(), error = %e, "failed to remove temporary file");
            }
        }
    }

    async fn system_report(&self) -> Result<SystemReport, DeskhandError> {
        self.probe.report().await
    }

    fn system_uptime_secs(&self) -> u64 {
        System::uptime()
    }
}
