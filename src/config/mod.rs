pub mod bridge_config;

pub use bridge_config::{BridgeConfig, DiscoveryConfig, RadioConfig, ServerConfig, DEFAULT_CONFIG_FILE};
