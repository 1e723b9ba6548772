//! Hardware, OS and load report for `/info`.
//!
//! CPU, memory, OS and uptime come from `sysinfo`; the board name from the DMI
//! files under `/sys`; graphics adapters from `lspci`; network throughput from
//! two interface counter snapshots taken over a short window on the interface
//! carrying the default route.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use deskhand_types::errors::DeskhandError;
use deskhand_types::{NetworkThroughput, SystemReport};
use sysinfo::{Networks, System, MINIMUM_CPU_UPDATE_INTERVAL};
use tracing::{debug, warn};

use crate::shell::{CommandRunner, CommandSpec};

const DEFAULT_DMI_DIR: &str = "/sys/devices/virtual/dmi/id";
const DEFAULT_ROUTE_TABLE: &str = "/proc/net/route";
const UNKNOWN: &str = "unknown";

/// Collects [`SystemReport`]s.
pub struct SystemProbe {
    runner: Arc<dyn CommandRunner>,
    network_sample: Duration,
    dmi_dir: PathBuf,
    route_table: PathBuf,
}

impl SystemProbe {
    pub fn new(runner: Arc<dyn CommandRunner>, network_sample: Duration) -> Self {
        Self {
            runner,
            network_sample,
            dmi_dir: PathBuf::from(DEFAULT_DMI_DIR),
            route_table: PathBuf::from(DEFAULT_ROUTE_TABLE),
        }
    }

    /// Read DMI and routing information from other locations.
    pub fn with_paths(mut self, dmi_dir: impl Into<PathBuf>, route_table: impl Into<PathBuf>) -> Self {
        self.dmi_dir = dmi_dir.into();
        self.route_table = route_table.into();
        self
    }

    /// Gather the report. Takes at least the network sampling window.
    pub async fn report(&self) -> Result<SystemReport, DeskhandError> {
        let mut sys = System::new();
        sys.refresh_cpu();
        sys.refresh_memory();

        let interface = self.default_interface().await;
        let mut networks = Networks::new_with_refreshed_list();
        let before = interface
            .as_deref()
            .and_then(|name| interface_totals(&networks, name));
        let started = Instant::now();

        // The CPU usage needs two refreshes at least this far apart.
        tokio::time::sleep(self.network_sample.max(MINIMUM_CPU_UPDATE_INTERVAL)).await;

        sys.refresh_cpu();
        networks.refresh();
        let elapsed = started.elapsed().as_secs_f64();

        let network = match (&interface, before) {
            (Some(name), Some(before)) => interface_totals(&networks, name)
                .map(|after| throughput(before, after, elapsed)),
            (Some(name), None) => {
                warn!(interface = %name, "default route interface has no counters");
                None
            }
            (None, _) => {
                debug!("no default route, skipping network sample");
                None
            }
        };

        let cpus = sys.cpus();
        let cpu = cpus
            .first()
            .map(|c| format!("{} {}", c.vendor_id(), c.brand()).trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string());

        let os = System::long_os_version()
            .or_else(System::name)
            .unwrap_or_else(|| UNKNOWN.to_string());

        Ok(SystemReport {
            motherboard: self.motherboard().await,
            cpu,
            logical_cores: cpus.len(),
            physical_cores: sys.physical_core_count().unwrap_or(0),
            graphics: self.graphics().await,
            os,
            arch: std::env::consts::ARCH.to_string(),
            kernel: System::kernel_version().unwrap_or_else(|| UNKNOWN.to_string()),
            cpu_load_percent: sys.global_cpu_info().cpu_usage(),
            memory_total: sys.total_memory(),
            memory_available: sys.available_memory(),
            uptime_secs: System::uptime(),
            network,
        })
    }

    async fn motherboard(&self) -> String {
        let read = |name: &'static str| {
            let path = self.dmi_dir.join(name);
            async move {
                tokio::fs::read_to_string(path)
                    .await
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default()
            }
        };
        let vendor = read("sys_vendor").await;
        let product = read("product_name").await;
        join_board(&vendor, &product)
    }

    async fn graphics(&self) -> Vec<String> {
        match self.runner.run(&CommandSpec::new("lspci")).await {
            Ok(out) => parse_lspci_graphics(&out.stdout),
            Err(e) => {
                debug!(error = %e, "lspci unavailable");
                Vec::new()
            }
        }
    }

    async fn default_interface(&self) -> Option<String> {
        match tokio::fs::read_to_string(&self.route_table).await {
            Ok(table) => parse_default_route(&table),
            Err(e) => {
                debug!(error = %e, "routing table unreadable");
                None
            }
        }
    }
}

/// `(received, transmitted)` byte counters for one interface.
fn interface_totals(networks: &Networks, name: &str) -> Option<(u64, u64)> {
    networks
        .iter()
        .find(|(iface, _)| iface.as_str() == name)
        .map(|(_, data)| (data.total_received(), data.total_transmitted()))
}

fn throughput(before: (u64, u64), after: (u64, u64), elapsed_secs: f64) -> NetworkThroughput {
    let secs = elapsed_secs.max(f64::EPSILON);
    NetworkThroughput {
        download_bytes_per_sec: after.0.saturating_sub(before.0) as f64 / secs,
        upload_bytes_per_sec: after.1.saturating_sub(before.1) as f64 / secs,
    }
}

fn join_board(vendor: &str, product: &str) -> String {
    let joined = format!("{vendor} {product}").trim().to_string();
    if joined.is_empty() {
        UNKNOWN.to_string()
    } else {
        joined
    }
}

/// Interface of the first default route in `/proc/net/route` format.
pub fn parse_default_route(table: &str) -> Option<String> {
    table.lines().skip(1).find_map(|line| {
        let mut fields = line.split_whitespace();
        let iface = fields.next()?;
        let destination = fields.next()?;
        (destination == "00000000").then(|| iface.to_string())
    })
}

/// Display adapters listed by `lspci`.
pub fn parse_lspci_graphics(output: &str) -> Vec<String> {
    const CLASSES: [&str; 3] = [
        "VGA compatible controller",
        "3D controller",
        "Display controller",
    ];
    output
        .lines()
        .filter(|line| CLASSES.iter().any(|class| line.contains(class)))
        .filter_map(|line| {
            let (_, device) = line.split_once(": ")?;
            Some(device.trim().to_string())
        })
        .filter(|device| !device.is_empty())
        .collect()
}
