/// Command routing, message dispatch and the bot runtime for deskhand.
///
/// - **Router** (`router`): text and button labels to [`router::Command`]s
/// - **Dispatcher** (`dispatcher`): per-message pipeline around the confirmation gate
/// - **Runtime** (`runtime`): the single-actor event loop and heartbeat
/// - **Text** (`text`): every user-facing string and the reply keyboard
pub mod dispatcher;
pub mod logging;
pub mod router;
pub mod runtime;
pub mod text;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::{Disposition, Dispatcher, DispatcherConfig, DispatcherDeps};
pub use router::{Command, CommandRouter};
pub use runtime::{shutdown_signal, Runtime};
