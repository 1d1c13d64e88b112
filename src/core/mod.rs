//! Core services
//!
//! Configuration, the notification bus, statistics and the runtime that ties
//! them together.

mod config;
mod debug;
mod events;
mod runtime;

pub use config::{AiConfig, ConfigError};
pub use debug::TickStats;
pub use events::{Notification, Notifications};
pub use runtime::{AiRuntime, TickReport};
