//! Mock collaborators shared by the dispatcher and runtime tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use deskhand_types::errors::DeskhandError;
use deskhand_types::*;
use tokio::sync::mpsc;

// ============================================================
// Transport
// ============================================================

/// Records everything sent; inbound messages come from a queued receiver.
pub struct MockTransport {
    pub sent: Mutex<Vec<OutboundMessage>>,
    pub photos: Mutex<Vec<OutboundPhoto>>,
    pub downloads: Mutex<Vec<(String, PathBuf)>>,
    pub fail_sends: Mutex<bool>,
    pub fail_health: Mutex<bool>,
    pub health_checks: AtomicUsize,
    pub restarts: AtomicUsize,
    inbound: Mutex<Option<mpsc::Receiver<InboundMessage>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            photos: Mutex::new(Vec::new()),
            downloads: Mutex::new(Vec::new()),
            fail_sends: Mutex::new(false),
            fail_health: Mutex::new(false),
            health_checks: AtomicUsize::new(0),
            restarts: AtomicUsize::new(0),
            inbound: Mutex::new(None),
        }
    }

    /// A transport plus the sender feeding its inbound stream.
    pub fn with_inbound() -> (Self, mpsc::Sender<InboundMessage>) {
        let (tx, rx) = mpsc::channel(16);
        let transport = Self::new();
        *transport.inbound.lock().unwrap() = Some(rx);
        (transport, tx)
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|m| m.text.clone()).collect()
    }

    pub fn last(&self) -> OutboundMessage {
        self.sent
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("nothing was sent")
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn send_message(&self, message: OutboundMessage) -> Result<(), DeskhandError> {
        if *self.fail_sends.lock().unwrap() {
            return Err(DeskhandError::Channel("sendMessage failed: 502".to_string()));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn send_photo(&self, photo: OutboundPhoto) -> Result<(), DeskhandError> {
        self.photos.lock().unwrap().push(photo);
        Ok(())
    }

    async fn download_file(&self, file_id: &str, dest: &Path) -> Result<u64, DeskhandError> {
        if file_id == "broken" {
            return Err(DeskhandError::Channel("getFile failed: file is too big".to_string()));
        }
        std::fs::write(dest, b"0123456789")
            .map_err(|e| DeskhandError::Storage(e.to_string()))?;
        self.downloads
            .lock()
            .unwrap()
            .push((file_id.to_string(), dest.to_path_buf()));
        Ok(10)
    }

    async fn health_check(&self) -> Result<(), DeskhandError> {
        self.health_checks.fetch_add(1, Ordering::SeqCst);
        if *self.fail_health.lock().unwrap() {
            return Err(DeskhandError::Channel("getMe failed: timed out".to_string()));
        }
        Ok(())
    }

    async fn start_listening(&self) -> Result<mpsc::Receiver<InboundMessage>, DeskhandError> {
        self.inbound
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| DeskhandError::Channel("already listening".to_string()))
    }

    fn restart_polling(&self) {
        self.restarts.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================
// Desktop
// ============================================================

/// Records calls by name and fails the ones listed in `failing`.
pub struct MockDesktop {
    pub calls: Mutex<Vec<&'static str>>,
    pub failing: Mutex<Vec<&'static str>>,
    pub screenshots: Mutex<Vec<Screenshot>>,
    pub cleaned: Mutex<Vec<PathBuf>>,
}

impl MockDesktop {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(Vec::new()),
            screenshots: Mutex::new(Vec::new()),
            cleaned: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(names: &[&'static str]) -> Self {
        let desktop = Self::new();
        *desktop.failing.lock().unwrap() = names.to_vec();
        desktop
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, name: &'static str) -> Result<(), DeskhandError> {
        self.calls.lock().unwrap().push(name);
        if self.failing.lock().unwrap().contains(&name) {
            return Err(DeskhandError::Command(format!("{name}: exit status 1")));
        }
        Ok(())
    }
}

pub fn sample_report() -> SystemReport {
    SystemReport {
        motherboard: "LENOVO 20QV".to_string(),
        cpu: "GenuineIntel i7".to_string(),
        logical_cores: 8,
        physical_cores: 4,
        graphics: vec!["Intel UHD 630".to_string()],
        os: "Linux 24.04 Ubuntu".to_string(),
        arch: "x86_64".to_string(),
        kernel: "6.8.0".to_string(),
        cpu_load_percent: 5.0,
        memory_total: 8 * 1024 * 1024 * 1024,
        memory_available: 4 * 1024 * 1024 * 1024,
        uptime_secs: 7200,
        network: None,
    }
}

#[async_trait]
impl DesktopController for MockDesktop {
    async fn sound_on(&self) -> Result<(), DeskhandError> {
        self.record("sound_on")
    }

    async fn sound_off(&self) -> Result<(), DeskhandError> {
        self.record("sound_off")
    }

    async fn volume_up(&self) -> Result<(), DeskhandError> {
        self.record("volume_up")
    }

    async fn volume_down(&self) -> Result<(), DeskhandError> {
        self.record("volume_down")
    }

    async fn microphone_on(&self) -> Result<(), DeskhandError> {
        self.record("microphone_on")
    }

    async fn microphone_off(&self) -> Result<(), DeskhandError> {
        self.record("microphone_off")
    }

    async fn play(&self) -> Result<(), DeskhandError> {
        self.record("play")
    }

    async fn pause(&self) -> Result<(), DeskhandError> {
        self.record("pause")
    }

    async fn next_track(&self) -> Result<(), DeskhandError> {
        self.record("next_track")
    }

    async fn previous_track(&self) -> Result<(), DeskhandError> {
        self.record("previous_track")
    }

    async fn audio_status(&self) -> AudioStatus {
        AudioStatus {
            sound: Toggle::On,
            volume_percent: Some(50),
            microphone: Toggle::Off,
            playback: PlaybackState::Playing,
            track: Some("Artist - Song".to_string()),
        }
    }

    async fn display_off(&self) -> Result<(), DeskhandError> {
        self.record("display_off")
    }

    async fn suspend(&self) -> Result<(), DeskhandError> {
        self.record("suspend")
    }

    async fn reboot(&self) -> Result<(), DeskhandError> {
        self.record("reboot")
    }

    async fn take_screenshots(&self) -> Result<Vec<Screenshot>, DeskhandError> {
        self.record("take_screenshots")?;
        Ok(self.screenshots.lock().unwrap().clone())
    }

    async fn cleanup_files(&self, paths: &[PathBuf]) {
        self.cleaned.lock().unwrap().extend_from_slice(paths);
    }

    async fn system_report(&self) -> Result<SystemReport, DeskhandError> {
        self.record("system_report")?;
        Ok(sample_report())
    }

    fn system_uptime_secs(&self) -> u64 {
        3 * 3600
    }
}

// ============================================================
// Clock and messages
// ============================================================

/// Manually advanced clock.
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(Mutex::new(at))
    }

    pub fn advance(&self, by: ChronoDuration) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

pub const OWNER: i64 = 4242;
pub const CHAT: i64 = 777;

pub fn text_from(user_id: i64, sent_at: DateTime<Utc>, text: &str) -> InboundMessage {
    InboundMessage {
        update_id: 1,
        chat_id: CHAT,
        user_id,
        sent_at,
        content: InboundContent::Text(text.to_string()),
    }
}
