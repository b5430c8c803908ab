//! # Configuration Management Module
//!
//! Node behaviour, the host's view of the mesh and logging are configured from one
//! TOML file. Values are validated on load; anything that would end up on the air
//! (ports, dataset, prefixes) is checked by [`crate::validation`].
//!
//! ## Configuration Structure
//!
//! - [`NodeConfig`] - name, hardware address, suffix case
//! - [`PortsConfig`] - command / hello / light UDP ports
//! - [`ListenersConfig`] - which listeners this node opens
//! - [`ReportingConfig`] - periodic hello reporting
//! - [`ButtonConfig`] - what a button press does
//! - [`IndicatorConfig`] - status LED
//! - [`MeshConfig`] - host view of the mesh (role, mesh-local prefix, network data)
//! - [`NetworkConfig`] - optional dataset applied when the stack has none
//! - [`BorderRouterConfig`] - optional on-mesh prefix published at boot
//! - [`LoggingConfig`] - log level and files
//!
//! ## Usage
//!
//! ```rust,no_run
//! use threadnode::config::{Config, Profile};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Config::write_profile("config.toml", Profile::Leader).await?;
//!     let config = Config::load("config.toml").await?;
//!     println!("Node: {} ({:?})", config.node.name, config.button.action);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [node]
//! name = "sensor-1"
//! hardware_address = "00:12:4b:00:01:02:ab:cd"
//!
//! [reporting]
//! periodic = true
//! interval_ms = 1000
//! format = "dashed"
//! destination = "default_route"
//!
//! [mesh]
//! interface = "wpan0"
//! role = "child"
//! mesh_local_prefix = "fd00:1234:5678:9abc::"
//!
//! [[mesh.network_data]]
//! prefix = "fd11:22::"
//! default_route = true
//! rloc16 = 0x4000
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::net::Ipv6Addr;
use std::time::Duration;
use tokio::fs;

use crate::mesh::host::MeshView;
use crate::mesh::{prefix_of, Dataset, MeshRole, OnMeshPrefix, COMMAND_PORT, HELLO_PORT, LIGHT_PORT};
use crate::node::{
    ButtonAction, DestinationPolicy, HelloFormat, NodeIdentity, NodeSettings, Ports, SuffixCase,
};
use crate::validation::{self, ValidationError};

/// Firmware roles a starter configuration can be generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Profile {
    /// Reports hellos to the border router while started.
    Sensor,
    /// Leader / border router: collects hellos, button broadcasts start/stop.
    Leader,
    /// Button node that toggles lights.
    Controller,
    /// Light that follows toggle commands.
    Light,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub node: NodeConfig,
    #[serde(default)]
    pub ports: PortsConfig,
    #[serde(default)]
    pub listeners: ListenersConfig,
    #[serde(default)]
    pub reporting: ReportingConfig,
    #[serde(default)]
    pub button: ButtonConfig,
    #[serde(default)]
    pub indicator: IndicatorConfig,
    #[serde(default)]
    pub mesh: MeshConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_router: Option<BorderRouterConfig>,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    /// 16 hex digits, `:`/`-` separators allowed. Absent means all-zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_address: Option<String>,
    #[serde(default)]
    pub suffix_case: SuffixCase,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PortsConfig {
    pub command: u16,
    pub hello: u16,
    pub light: u16,
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            command: COMMAND_PORT,
            hello: HELLO_PORT,
            light: LIGHT_PORT,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ListenersConfig {
    #[serde(default = "default_true")]
    pub command: bool,
    #[serde(default)]
    pub light: bool,
    /// Arm the hello listener when the node becomes Router or Leader.
    #[serde(default)]
    pub hello: bool,
}

impl Default for ListenersConfig {
    fn default() -> Self {
        Self {
            command: true,
            light: false,
            hello: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReportingConfig {
    #[serde(default = "default_true")]
    pub periodic: bool,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default)]
    pub format: HelloFormat,
    #[serde(default)]
    pub destination: DestinationPolicy,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            periodic: true,
            interval_ms: default_interval_ms(),
            format: HelloFormat::Dashed,
            destination: DestinationPolicy::DefaultRoute,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct ButtonConfig {
    #[serde(default)]
    pub action: ButtonAction,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IndicatorConfig {
    /// LED brightness file. When set, the LED must be acquirable or `start` fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sysfs_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MeshConfig {
    /// Thread network interface, e.g. `wpan0`; used as scope for sends and multicast.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    #[serde(default)]
    pub role: MeshRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh_local_prefix: Option<Ipv6Addr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leader_rloc16: Option<u16>,
    /// RLOC16 this host advertises published prefixes with.
    #[serde(default)]
    pub own_rloc16: u16,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub network_data: Vec<OnMeshPrefix>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub pan_id: u16,
    pub channel: u8,
    /// 32 hex digits.
    pub network_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorderRouterConfig {
    pub prefix: Ipv6Addr,
    #[serde(default = "default_prefix_len")]
    pub length: u8,
    #[serde(default = "default_true")]
    pub preferred: bool,
    #[serde(default = "default_true")]
    pub slaac: bool,
    #[serde(default = "default_true")]
    pub on_mesh: bool,
    #[serde(default = "default_true")]
    pub stable: bool,
    #[serde(default = "default_true")]
    pub default_route: bool,
}

fn default_prefix_len() -> u8 {
    64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    #[serde(default)]
    pub security_file: Option<String>,
}

impl Config {
    /// Load and validate configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config
            .validate()
            .map_err(|e| anyhow!("Invalid config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Load `path` when it exists, otherwise fall back to the default (sensor)
    /// configuration. An existing file that fails to parse or validate is an error.
    pub async fn load_or_default(path: &str) -> Result<Self> {
        match fs::try_exists(path).await {
            Ok(true) => Self::load(path).await,
            Ok(false) => Ok(Config::default()),
            Err(e) => Err(anyhow!("Failed to stat config file {}: {}", path, e)),
        }
    }

    /// Create a default (sensor) configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        Self::write_profile(path, Profile::Sensor).await
    }

    /// Write a starter configuration for one of the firmware profiles
    pub async fn write_profile(path: &str, profile: Profile) -> Result<()> {
        let config = Config::for_profile(profile);
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn for_profile(profile: Profile) -> Self {
        let mut cfg = Config::default();
        match profile {
            Profile::Sensor => {}
            Profile::Leader => {
                cfg.node.name = "leader".to_string();
                cfg.listeners = ListenersConfig {
                    command: false,
                    light: false,
                    hello: true,
                };
                cfg.reporting.periodic = false;
                cfg.button.action = ButtonAction::BroadcastCommand;
                cfg.mesh.role = MeshRole::Leader;
                cfg.mesh.own_rloc16 = 0xfc00;
                cfg.network = Some(NetworkConfig {
                    name: "Campos".to_string(),
                    pan_id: 0xabcd,
                    channel: 15,
                    network_key: "11112222333344445555666677778888".to_string(),
                });
                cfg.border_router = Some(BorderRouterConfig {
                    prefix: Ipv6Addr::new(0xfd11, 0x22, 0, 0, 0, 0, 0, 0),
                    length: 64,
                    preferred: true,
                    slaac: true,
                    on_mesh: true,
                    stable: true,
                    default_route: true,
                });
            }
            Profile::Controller => {
                cfg.node.name = "controller".to_string();
                cfg.listeners.command = false;
                cfg.reporting.periodic = false;
                cfg.button.action = ButtonAction::LightToggle;
            }
            Profile::Light => {
                cfg.node.name = "light".to_string();
                cfg.listeners = ListenersConfig {
                    command: false,
                    light: true,
                    hello: false,
                };
                cfg.reporting.periodic = false;
            }
        }
        cfg
    }

    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        validation::validate_port("ports.command", self.ports.command)?;
        validation::validate_port("ports.hello", self.ports.hello)?;
        validation::validate_port("ports.light", self.ports.light)?;
        validation::validate_interval_ms(self.reporting.interval_ms)?;
        self.identity()?;
        if let Some(net) = &self.network {
            validation::validate_network_name(&net.name)?;
            validation::validate_channel(net.channel)?;
            validation::parse_hex_bytes::<16>("network.network_key", &net.network_key)?;
        }
        if let Some(br) = &self.border_router {
            validation::validate_prefix_length("border_router.length", br.length)?;
        }
        for entry in &self.mesh.network_data {
            validation::validate_prefix_length("mesh.network_data.length", entry.length)?;
        }
        Ok(())
    }

    /// Hardware identity; all-zero when no address is configured.
    pub fn identity(&self) -> std::result::Result<NodeIdentity, ValidationError> {
        match &self.node.hardware_address {
            Some(addr) => addr.parse(),
            None => Ok(NodeIdentity::default()),
        }
    }

    pub fn dataset(&self) -> std::result::Result<Option<Dataset>, ValidationError> {
        let Some(net) = &self.network else {
            return Ok(None);
        };
        Ok(Some(Dataset {
            network_name: net.name.clone(),
            pan_id: net.pan_id,
            channel: net.channel,
            network_key: validation::parse_hex_bytes::<16>("network.network_key", &net.network_key)?,
        }))
    }

    pub fn node_settings(&self) -> std::result::Result<NodeSettings, ValidationError> {
        Ok(NodeSettings {
            ports: Ports {
                command: self.ports.command,
                hello: self.ports.hello,
                light: self.ports.light,
            },
            command_listener: self.listeners.command,
            light_listener: self.listeners.light,
            hello_listener: self.listeners.hello,
            periodic: self.reporting.periodic,
            interval: Duration::from_millis(self.reporting.interval_ms),
            format: self.reporting.format,
            destination: self.reporting.destination,
            suffix_case: self.node.suffix_case,
            button: self.button.action,
            dataset: self.dataset()?,
            border_router: self.border_router.as_ref().map(|br| OnMeshPrefix {
                prefix: br.prefix,
                length: br.length,
                preferred: br.preferred,
                slaac: br.slaac,
                on_mesh: br.on_mesh,
                stable: br.stable,
                default_route: br.default_route,
                rloc16: self.mesh.own_rloc16,
            }),
        })
    }

    /// Static mesh view for the host stack.
    pub fn mesh_view(&self, interface_index: u32) -> MeshView {
        MeshView {
            role: self.mesh.role,
            mesh_local_prefix: self.mesh.mesh_local_prefix.as_ref().map(prefix_of),
            network_data: self.mesh.network_data.clone(),
            leader_rloc16: self.mesh.leader_rloc16,
            own_rloc16: self.mesh.own_rloc16,
            interface_index,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            node: NodeConfig {
                name: "sensor".to_string(),
                hardware_address: None,
                suffix_case: SuffixCase::Upper,
            },
            ports: PortsConfig::default(),
            listeners: ListenersConfig::default(),
            reporting: ReportingConfig::default(),
            button: ButtonConfig::default(),
            indicator: IndicatorConfig::default(),
            mesh: MeshConfig {
                interface: Some("wpan0".to_string()),
                role: MeshRole::Child,
                ..MeshConfig::default()
            },
            network: None,
            border_router: None,
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("threadnode.log".to_string()),
                security_file: Some("threadnode-security.log".to_string()),
            },
        }
    }
}
