//! Windows desktop backend.
//!
//! Audio, media keys, the monitor and power state go through NirSoft's
//! `nircmd`; volume and mute state are read back with `svcl`. Playback state
//! comes from the system media transport controls via PowerShell, and
//! monitors are counted with `wmic`.
//!
//! Microphone control and track metadata are not available on this backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use deskhand_types::config::DesktopConfig;
use deskhand_types::errors::DeskhandError;
use deskhand_types::traits::DesktopController;
use deskhand_types::{AudioStatus, CommandOutput, PlaybackState, Screenshot, SystemReport, Toggle};
use sysinfo::System;
use tracing::{debug, info, warn};

use crate::shell::{CommandRunner, CommandSpec};
use crate::system::SystemProbe;

/// Wait for `nircmd savescreenshot` to finish writing before checking the file.
const DEFAULT_CAPTURE_SETTLE: Duration = Duration::from_millis(500);

/// Full scale of `nircmd changesysvolume`.
const NIRCMD_VOLUME_SCALE: f64 = 65535.0;

const RENDER_DEVICE: &str = "DefaultRenderDevice";

const KEY_PLAY_PAUSE: &str = "0xB3";
const KEY_NEXT_TRACK: &str = "0xB0";
const KEY_PREVIOUS_TRACK: &str = "0xB1";

/// Prints the current media session state as its last line: `Playing`,
/// `Paused`, `Stopped`, or `Undetermined` when there is no session.
const PLAYBACK_SCRIPT: &str = "Add-Type -AssemblyName System.Runtime.WindowsRuntime; \
$null = [Windows.Media.Control.GlobalSystemMediaTransportControlsSessionManager, Windows.Media.Control, ContentType = WindowsRuntime]; \
$manager = [Windows.Media.Control.GlobalSystemMediaTransportControlsSessionManager]::RequestAsync(); \
$manager.AsTask().Wait(-1) | Out-Null; \
$session = $manager.Result.GetCurrentSession(); \
if ($session) { \
$status = $session.GetPlaybackInfo().PlaybackStatus; \
if ($status -eq 'Playing') { 'Playing' } elseif ($status -eq 'Paused') { 'Paused' } else { 'Stopped' } \
} else { 'NO_SESSION'; 'Undetermined' }";

// ============================================================
// Output parsing
// ============================================================

/// `round(65535 * step / 100)`: one volume step in nircmd units.
fn volume_units(step_percent: u8) -> i64 {
    (NIRCMD_VOLUME_SCALE * f64::from(step_percent) / 100.0).round() as i64
}

/// Leading integer of `svcl /GetPercent` output ("37.5" reads as 37).
fn parse_svcl_percent(output: &str) -> Option<u32> {
    let digits: String = output.trim().chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// `svcl /GetMute` prints `1` when the device is muted.
fn parse_svcl_mute(output: &str) -> Toggle {
    match output.trim() {
        "1" => Toggle::Off,
        "0" => Toggle::On,
        _ => Toggle::Unknown,
    }
}

/// Last non-empty line of [`PLAYBACK_SCRIPT`]. `None` when undetermined.
fn parse_playback(output: &str) -> Option<PlaybackState> {
    let last = output.lines().rev().map(str::trim).find(|l| !l.is_empty())?;
    match last.to_lowercase().as_str() {
        "playing" => Some(PlaybackState::Playing),
        "paused" => Some(PlaybackState::Paused),
        "undetermined" => None,
        _ => Some(PlaybackState::Stopped),
    }
}

/// Physical monitors in `wmic path Win32_DesktopMonitor get Name /format:csv`
/// output, never less than one.
///
/// Header rows and generic PnP placeholders are not counted.
fn count_monitors(csv: &str) -> usize {
    let count = csv
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.contains(','))
        .map(str::to_lowercase)
        .filter(|line| !line.contains("node") && !line.contains("name"))
        .filter(|line| !is_generic_monitor(line))
        .count();
    count.max(1)
}

fn is_generic_monitor(line: &str) -> bool {
    ["generic", "universal", "универсальный", "pnp"]
        .iter()
        .any(|marker| line.contains(marker))
}

/// PowerShell capture of the primary screen into `path` as PNG.
fn capture_script(path: &Path) -> String {
    let target = path.to_string_lossy().replace('\'', "''");
    format!(
        "Add-Type -AssemblyName System.Windows.Forms; \
         Add-Type -AssemblyName System.Drawing; \
         $bounds = [System.Windows.Forms.Screen]::PrimaryScreen.Bounds; \
         $bitmap = New-Object System.Drawing.Bitmap $bounds.Width, $bounds.Height; \
         $graphics = [System.Drawing.Graphics]::FromImage($bitmap); \
         $graphics.CopyFromScreen($bounds.Location, [System.Drawing.Point]::Empty, $bounds.Size); \
         $bitmap.Save('{target}', [System.Drawing.Imaging.ImageFormat]::Png); \
         $graphics.Dispose(); \
         $bitmap.Dispose()"
    )
}

// ============================================================
// Controller
// ============================================================

/// [`DesktopController`] for a Windows desktop with nircmd and svcl on `PATH`.
pub struct WindowsDesktop {
    runner: Arc<dyn CommandRunner>,
    volume_step: u8,
    screenshot_dir: PathBuf,
    capture_settle: Duration,
    probe: SystemProbe,
}

impl WindowsDesktop {
    /// Build the backend from the desktop config section.
    pub fn new(runner: Arc<dyn CommandRunner>, config: &DesktopConfig) -> Self {
        Self {
            probe: SystemProbe::new(
                runner.clone(),
                Duration::from_secs(config.network_sample_secs),
            ),
            runner,
            volume_step: config.volume_step_percent,
            screenshot_dir: config.screenshot_dir.clone(),
            capture_settle: DEFAULT_CAPTURE_SETTLE,
        }
    }

    /// Override the wait between a capture and the check for its file.
    pub fn with_capture_settle(mut self, settle: Duration) -> Self {
        self.capture_settle = settle;
        self
    }

    async fn nircmd<I, S>(&self, args: I) -> Result<(), DeskhandError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.runner
            .run(&CommandSpec::new("nircmd").args(args))
            .await
            .map(|_| ())
    }

    async fn svcl(&self, query: &str) -> Result<CommandOutput, DeskhandError> {
        let spec = CommandSpec::new("svcl.exe").args(["/Stdout", query, RENDER_DEVICE]);
        self.runner.run(&spec).await
    }

    async fn powershell(&self, script: &str) -> Result<CommandOutput, DeskhandError> {
        let spec = CommandSpec::new("powershell").args(["-NoProfile", "-Command", script]);
        self.runner.run(&spec).await
    }

    async fn volume(&self) -> Option<u32> {
        match self.svcl("/GetPercent").await {
            Ok(out) => parse_svcl_percent(&out.stdout),
            Err(e) => {
                debug!(error = %e, "volume unavailable");
                None
            }
        }
    }

    async fn mute_state(&self) -> Toggle {
        match self.svcl("/GetMute").await {
            Ok(out) => parse_svcl_mute(&out.stdout),
            Err(e) => {
                debug!(error = %e, "mute state unavailable");
                Toggle::Unknown
            }
        }
    }

    async fn playback(&self) -> Option<PlaybackState> {
        match self.powershell(PLAYBACK_SCRIPT).await {
            Ok(out) => parse_playback(&out.stdout),
            Err(e) => {
                debug!(error = %e, "playback state unavailable");
                None
            }
        }
    }

    async fn monitor_count(&self) -> usize {
        let spec = CommandSpec::new("wmic").args([
            "path",
            "Win32_DesktopMonitor",
            "get",
            "Name",
            "/format:csv",
        ]);
        match self.runner.run(&spec).await {
            Ok(out) => count_monitors(&out.stdout),
            Err(e) => {
                debug!(error = %e, "monitor query failed, assuming one monitor");
                1
            }
        }
    }

    async fn volume_change(&self, sign: i64) -> Result<(), DeskhandError> {
        let delta = sign * volume_units(self.volume_step);
        self.nircmd(["changesysvolume".to_string(), delta.to_string()]).await
    }

    async fn send_key(&self, key: &str) -> Result<(), DeskhandError> {
        self.nircmd(["sendkeypress", key]).await
    }

    /// Run `attempt`, then report whether `path` exists after the settle delay.
    async fn captured(&self, path: &Path, attempt: Result<CommandOutput, DeskhandError>) -> bool {
        if let Err(e) = attempt {
            warn!(path = %path.display(), error = %e, "screen capture command failed");
            return false;
        }
        tokio::time::sleep(self.capture_settle).await;
        tokio::fs::metadata(path).await.is_ok()
    }
}

#[async_trait]
impl DesktopController for WindowsDesktop {
    async fn sound_on(&self) -> Result<(), DeskhandError> {
        self.nircmd(["mutesysvolume", "0"]).await
    }

    async fn sound_off(&self) -> Result<(), DeskhandError> {
        self.nircmd(["mutesysvolume", "1"]).await
    }

    async fn volume_up(&self) -> Result<(), DeskhandError> {
        self.volume_change(1).await
    }

    async fn volume_down(&self) -> Result<(), DeskhandError> {
        self.volume_change(-1).await
    }

    async fn microphone_on(&self) -> Result<(), DeskhandError> {
        Err(DeskhandError::Platform(
            "microphone control is not supported on Windows".to_string(),
        ))
    }

    async fn microphone_off(&self) -> Result<(), DeskhandError> {
        Err(DeskhandError::Platform(
            "microphone control is not supported on Windows".to_string(),
        ))
    }

    /// Play/pause is a toggle key, so it is only sent when not already playing.
    async fn play(&self) -> Result<(), DeskhandError> {
        if self.playback().await == Some(PlaybackState::Playing) {
            debug!("already playing");
            return Ok(());
        }
        self.send_key(KEY_PLAY_PAUSE).await
    }

    async fn pause(&self) -> Result<(), DeskhandError> {
        if matches!(
            self.playback().await,
            Some(PlaybackState::Paused | PlaybackState::Stopped)
        ) {
            debug!("already paused");
            return Ok(());
        }
        self.send_key(KEY_PLAY_PAUSE).await
    }

    async fn next_track(&self) -> Result<(), DeskhandError> {
        self.send_key(KEY_NEXT_TRACK).await
    }

    async fn previous_track(&self) -> Result<(), DeskhandError> {
        self.send_key(KEY_PREVIOUS_TRACK).await
    }

    async fn audio_status(&self) -> AudioStatus {
        let (volume_percent, sound, playback) =
            tokio::join!(self.volume(), self.mute_state(), self.playback());
        AudioStatus {
            sound,
            volume_percent,
            microphone: Toggle::Unknown,
            playback: playback.unwrap_or(PlaybackState::Stopped),
            track: None,
        }
    }

    async fn display_off(&self) -> Result<(), DeskhandError> {
        self.nircmd(["monitor", "off"]).await
    }

    async fn suspend(&self) -> Result<(), DeskhandError> {
        info!("suspending system");
        self.nircmd(["standby"]).await
    }

    async fn reboot(&self) -> Result<(), DeskhandError> {
        info!("rebooting system");
        self.nircmd(["exitwin", "reboot"]).await
    }

    /// One capture of the primary screen; the caption carries the monitor count.
    async fn take_screenshots(&self) -> Result<Vec<Screenshot>, DeskhandError> {
        tokio::fs::create_dir_all(&self.screenshot_dir).await.map_err(|e| {
            DeskhandError::Platform(format!(
                "screenshot directory {} is not usable: {e}",
                self.screenshot_dir.display()
            ))
        })?;

        let total = self.monitor_count().await;
        let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S%.3f");
        let path = self.screenshot_dir.join(format!("screenshot-{stamp}.png"));

        let spec = CommandSpec::new("nircmd")
            .arg("savescreenshot")
            .arg(path.to_string_lossy());
        let mut saved = self.captured(&path, self.runner.run(&spec).await).await;
        if !saved {
            debug!("nircmd capture produced no file, falling back to PowerShell");
            let attempt = self.powershell(&capture_script(&path)).await;
            saved = self.captured(&path, attempt).await;
        }
        if !saved {
            return Err(DeskhandError::Platform(format!(
                "screenshot file was not created: {}",
                path.display()
            )));
        }

        info!(path = %path.display(), monitors = total, "screenshot captured");
        Ok(vec![Screenshot {
            path,
            caption: format!("Monitor Primary (1 of {total})"),
        }])
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
