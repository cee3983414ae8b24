//! Middleware shipped with the engine.
//!
//! [`crate::Engine::default`] installs [`logger`] followed by [`recovery`].

mod logger;
mod recovery;

pub use logger::{Logger, LoggerConfig, logger, logger_with_config};
pub use recovery::{Recovery, recovery};
