/// Desktop control backends for deskhand.
///
/// - **Shell**: command runner seam over `tokio::process`
/// - **Linux**: [`deskhand_types::DesktopController`] for X11 + PulseAudio desktops
/// - **Windows**: the same controller over nircmd, svcl and PowerShell
/// - **System**: hardware/OS/load report
/// - **Storage**: saving uploaded files for the desktop user
/// - **Format**: human-readable durations, sizes and rates
pub mod format;
#[cfg(unix)]
pub mod linux;
pub mod shell;
pub mod storage;
pub mod system;
pub mod windows;

#[cfg(test)]
pub(crate) mod testing;

#[cfg(unix)]
pub use linux::{LinuxDesktop, UserSession};
pub use shell::{CommandRunner, CommandSpec, ShellRunner};
pub use storage::FileStore;
pub use system::SystemProbe;
pub use windows::WindowsDesktop;
