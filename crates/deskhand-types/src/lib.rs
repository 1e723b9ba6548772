/// Shared types, traits, and errors for deskhand.
///
/// This crate is the foundation that all other deskhand crates depend on.
/// It contains:
/// - **Trait contracts** (`traits`) for the chat transport, desktop backend and clock
/// - **Shared data types** (`actions`) used across all subsystems
/// - **Error types** (`errors`) for unified error handling
/// - **Config types** (`config`) and the loader (`config_loader`)
pub mod actions;
pub mod config;
pub mod config_loader;
pub mod errors;
pub mod traits;

// Re-export commonly used types at the crate root for convenience.
pub use actions::*;
pub use errors::DeskhandError;
pub use traits::*;
