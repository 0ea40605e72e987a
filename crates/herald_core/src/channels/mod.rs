//! Chat channel configuration and lookup.

pub mod config;
pub mod registry;

pub use config::{ChannelConfigError, ChannelSettings, ChannelsConfig};
pub use registry::{ChatChannel, ChannelRegistry};
