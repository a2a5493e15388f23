//! TOML configuration for the gateway.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use sha2::{Digest, Sha256};

use meshgate_core::constants::{
    DEFAULT_CRYPTO_FRAME_SIZE, DEFAULT_MAX_FRAGMENTS, DEFAULT_RADIO_FRAME_SIZE, HEADER_MAXSIZE,
    MAX_DISPLAY_NAME, MAX_FRAGMENTS_LIMIT,
};
use meshgate_core::{CryptoIdentity, Network, RadioNodeId};
use meshgate_interfaces::{StreamFraming, TcpAdapterConfig};
use meshgate_transport::{CodecConfig, HealthConfig, LocalIdentity, RetryPolicy, RouterConfig};

use crate::error::NodeError;

/// Top-level gateway configuration loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub gateway: GatewaySection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub codec: CodecSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub health: HealthSection,
    #[serde(default)]
    pub nodes: NodesSection,
    #[serde(default)]
    pub adapters: AdaptersSection,
}

impl GatewayConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("failed to read config file: {e}")))?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s)
            .map_err(|e| NodeError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), NodeError> {
        for (key, size) in [
            ("codec.radio_frame_size", self.codec.radio_frame_size),
            ("codec.crypto_frame_size", self.codec.crypto_frame_size),
        ] {
            if size <= HEADER_MAXSIZE {
                return Err(NodeError::Config(format!(
                    "{key} = {size} leaves no room for a body; use more than {HEADER_MAXSIZE}"
                )));
            }
        }
        if self.codec.max_fragments == 0 || self.codec.max_fragments > MAX_FRAGMENTS_LIMIT {
            return Err(NodeError::Config(format!(
                "codec.max_fragments must be between 1 and {MAX_FRAGMENTS_LIMIT}, got {}",
                self.codec.max_fragments
            )));
        }
        if self.gateway.display_name.len() > MAX_DISPLAY_NAME {
            return Err(NodeError::Config(format!(
                "gateway.display_name is longer than {MAX_DISPLAY_NAME} bytes"
            )));
        }
        if self.gateway.tick_interval_ms == 0 {
            return Err(NodeError::Config(
                "gateway.tick_interval_ms must be greater than 0".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(NodeError::Config(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        self.local_identity()?;
        for (network, entry) in self.adapters.entries() {
            if let Some(entry) = entry {
                entry.kind()?;
                entry.framing()?;
                if let Some(mtu) = entry.mtu
                    && mtu <= HEADER_MAXSIZE
                {
                    return Err(NodeError::Config(format!(
                        "adapters.{network}.mtu = {mtu} is too small for a frame header"
                    )));
                }
            }
        }
        Ok(())
    }

    /// The gateway's own address on each mesh. Identities not given in the
    /// file are derived from the display name.
    pub fn local_identity(&self) -> Result<LocalIdentity, NodeError> {
        let crypto = match &self.gateway.crypto_identity {
            Some(hex) => hex.parse::<CryptoIdentity>().map_err(|e| {
                NodeError::Config(format!("gateway.crypto_identity {hex:?}: {e}"))
            })?,
            None => derive_crypto_identity(&self.gateway.display_name),
        };
        let radio = match &self.gateway.radio_node_id {
            Some(text) => {
                let node = text.parse::<RadioNodeId>().map_err(|e| {
                    NodeError::Config(format!("gateway.radio_node_id {text:?}: {e}"))
                })?;
                if node.is_broadcast() {
                    return Err(NodeError::Config(
                        "gateway.radio_node_id cannot be the broadcast address".into(),
                    ));
                }
                node
            }
            None => derive_radio_node_id(&crypto),
        };
        Ok(LocalIdentity { crypto, radio })
    }

    /// Build the options structure consumed by the router.
    pub fn to_router_config(&self) -> Result<RouterConfig, NodeError> {
        let mut config = RouterConfig::new(self.local_identity()?);
        let g = &self.gateway;
        config.display_name = g.display_name.clone();
        config.radio_frame_size = self.codec.radio_frame_size;
        config.crypto_frame_size = self.codec.crypto_frame_size;
        config.codec = CodecConfig {
            max_fragments: self.codec.max_fragments,
            reassembly_timeout: Duration::from_secs(self.codec.reassembly_timeout_secs),
            max_pending_assemblies: self.codec.max_pending_assemblies,
        };
        config.retry = RetryPolicy {
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_secs(self.retry.max_delay_secs),
            max_attempts: self.retry.max_attempts,
            overall_deadline: Duration::from_secs(self.retry.overall_deadline_secs),
        };
        config.health = HealthConfig {
            failure_threshold: self.health.failure_threshold,
            cooldown: Duration::from_secs(self.health.cooldown_secs),
            max_cooldown: Duration::from_secs(self.health.max_cooldown_secs),
        };
        config.node_ttl = Duration::from_secs(self.nodes.ttl_secs);
        config.address_wait = Duration::from_secs(g.address_wait_secs);
        config.require_ack = g.require_ack;
        config.ack_timeout = Duration::from_secs(g.ack_timeout_secs);
        config.max_pending_messages = g.max_pending_messages;
        config.announce_interval =
            (g.announce_interval_secs > 0).then(|| Duration::from_secs(g.announce_interval_secs));
        Ok(config)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.gateway.tick_interval_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway.io_timeout_secs)
    }
}

fn derive_crypto_identity(display_name: &str) -> CryptoIdentity {
    let digest = Sha256::new()
        .chain_update(b"meshgate.identity.")
        .chain_update(display_name.as_bytes())
        .finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    CryptoIdentity::new(bytes)
}

fn derive_radio_node_id(crypto: &CryptoIdentity) -> RadioNodeId {
    let digest = Sha256::digest(crypto.as_ref());
    let num = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    match RadioNodeId::new(num) {
        node if node.is_broadcast() || num == 0 => RadioNodeId::new(0x4D47_0001),
        node => node,
    }
}

/// The `[gateway]` section.
#[derive(Debug, Deserialize)]
pub struct GatewaySection {
    /// 32 hex digits. Derived from `display_name` when absent.
    pub crypto_identity: Option<String>,
    /// `!xxxxxxxx` or decimal. Derived from the crypto identity when absent.
    pub radio_node_id: Option<String>,
    #[serde(default = "default_display_name")]
    pub display_name: String,
    /// Custom storage directory path. Defaults to `~/.meshgate/storage`.
    pub storage_path: Option<String>,
    #[serde(default = "default_true")]
    pub enable_storage: bool,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,
    #[serde(default)]
    pub require_ack: bool,
    #[serde(default = "default_ack_timeout_secs")]
    pub ack_timeout_secs: u64,
    #[serde(default = "default_address_wait_secs")]
    pub address_wait_secs: u64,
    #[serde(default = "default_max_pending_messages")]
    pub max_pending_messages: usize,
    /// Seconds between the gateway's own bridged announces. 0 disables.
    #[serde(default = "default_announce_interval_secs")]
    pub announce_interval_secs: u64,
}

fn default_display_name() -> String {
    "meshgate".to_string()
}

fn default_true() -> bool {
    true
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_io_timeout_secs() -> u64 {
    5
}

fn default_ack_timeout_secs() -> u64 {
    30
}

fn default_address_wait_secs() -> u64 {
    60
}

fn default_max_pending_messages() -> usize {
    1024
}

fn default_announce_interval_secs() -> u64 {
    600
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            crypto_identity: None,
            radio_node_id: None,
            display_name: default_display_name(),
            storage_path: None,
            enable_storage: default_true(),
            tick_interval_ms: default_tick_interval_ms(),
            io_timeout_secs: default_io_timeout_secs(),
            require_ack: false,
            ack_timeout_secs: default_ack_timeout_secs(),
            address_wait_secs: default_address_wait_secs(),
            max_pending_messages: default_max_pending_messages(),
            announce_interval_secs: default_announce_interval_secs(),
        }
    }
}

/// The `[logging]` section.
#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// The `[codec]` section.
#[derive(Debug, Deserialize)]
pub struct CodecSection {
    #[serde(default = "default_radio_frame_size")]
    pub radio_frame_size: usize,
    #[serde(default = "default_crypto_frame_size")]
    pub crypto_frame_size: usize,
    #[serde(default = "default_max_fragments")]
    pub max_fragments: usize,
    #[serde(default = "default_reassembly_timeout_secs")]
    pub reassembly_timeout_secs: u64,
    #[serde(default = "default_max_pending_assemblies")]
    pub max_pending_assemblies: usize,
}

fn default_radio_frame_size() -> usize {
    DEFAULT_RADIO_FRAME_SIZE
}

fn default_crypto_frame_size() -> usize {
    DEFAULT_CRYPTO_FRAME_SIZE
}

fn default_max_fragments() -> usize {
    DEFAULT_MAX_FRAGMENTS
}

fn default_reassembly_timeout_secs() -> u64 {
    120
}

fn default_max_pending_assemblies() -> usize {
    64
}

impl Default for CodecSection {
    fn default() -> Self {
        Self {
            radio_frame_size: default_radio_frame_size(),
            crypto_frame_size: default_crypto_frame_size(),
            max_fragments: default_max_fragments(),
            reassembly_timeout_secs: default_reassembly_timeout_secs(),
            max_pending_assemblies: default_max_pending_assemblies(),
        }
    }
}

/// The `[retry]` section.
#[derive(Debug, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_overall_deadline_secs")]
    pub overall_deadline_secs: u64,
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    5
}

fn default_overall_deadline_secs() -> u64 {
    300
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_secs: default_max_delay_secs(),
            max_attempts: default_max_attempts(),
            overall_deadline_secs: default_overall_deadline_secs(),
        }
    }
}

/// The `[health]` section.
#[derive(Debug, Deserialize)]
pub struct HealthSection {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "default_max_cooldown_secs")]
    pub max_cooldown_secs: u64,
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_cooldown_secs() -> u64 {
    10
}

fn default_max_cooldown_secs() -> u64 {
    300
}

impl Default for HealthSection {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_secs: default_cooldown_secs(),
            max_cooldown_secs: default_max_cooldown_secs(),
        }
    }
}

/// The `[nodes]` section.
#[derive(Debug, Deserialize)]
pub struct NodesSection {
    #[serde(default = "default_node_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_node_ttl_secs() -> u64 {
    15 * 60
}

impl Default for NodesSection {
    fn default() -> Self {
        Self {
            ttl_secs: default_node_ttl_secs(),
        }
    }
}

/// The `[adapters]` section: one optional entry per mesh.
#[derive(Debug, Default, Deserialize)]
pub struct AdaptersSection {
    pub crypto_mesh: Option<AdapterEntry>,
    pub radio_mesh: Option<AdapterEntry>,
}

impl AdaptersSection {
    pub fn entry(&self, network: Network) -> Option<&AdapterEntry> {
        match network {
            Network::CryptoMesh => self.crypto_mesh.as_ref(),
            Network::RadioMesh => self.radio_mesh.as_ref(),
        }
    }

    fn entries(&self) -> [(Network, Option<&AdapterEntry>); 2] {
        Network::ALL.map(|n| (n, self.entry(n)))
    }
}

/// How the gateway reaches one daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    Tcp,
    /// Detached in-process adapter for dry runs: reads end at once and writes fail.
    Memory,
}

/// An `[adapters.crypto_mesh]` or `[adapters.radio_mesh]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct AdapterEntry {
    #[serde(default = "default_kind")]
    pub kind: String,
    pub name: Option<String>,
    /// `host:port`, required for `tcp`.
    pub target: Option<String>,
    /// `hdlc` or `stream`. Defaults per network.
    pub framing: Option<String>,
    pub mtu: Option<usize>,
    #[serde(default = "default_reconnect_wait_secs")]
    pub reconnect_wait_secs: u64,
    /// Give up reconnecting after this many failures. Unset retries forever.
    pub max_reconnect_tries: Option<u32>,
}

fn default_kind() -> String {
    "tcp".to_string()
}

fn default_reconnect_wait_secs() -> u64 {
    5
}

impl AdapterEntry {
    pub fn kind(&self) -> Result<AdapterKind, NodeError> {
        parse_kind(&self.kind)
    }

    pub fn framing(&self) -> Result<Option<StreamFraming>, NodeError> {
        self.framing.as_deref().map(parse_framing).transpose()
    }

    /// TCP settings for this entry, layered over the per-network defaults.
    pub fn tcp_config(&self, network: Network) -> Result<TcpAdapterConfig, NodeError> {
        let target = self.target.clone().ok_or_else(|| {
            NodeError::Config(format!("adapters.{network}: tcp adapter needs a target"))
        })?;
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| format!("{network}[{target}]"));
        let mut config = TcpAdapterConfig::new(name, network, target);
        if let Some(framing) = self.framing()? {
            config.framing = framing;
        }
        if let Some(mtu) = self.mtu {
            config.mtu = mtu;
        }
        config.reconnect_wait = Duration::from_secs(self.reconnect_wait_secs);
        config.max_reconnect_tries = self.max_reconnect_tries;
        Ok(config)
    }
}

/// Parse an adapter kind string (case-insensitive).
pub fn parse_kind(s: &str) -> Result<AdapterKind, NodeError> {
    match s.to_lowercase().as_str() {
        "tcp" => Ok(AdapterKind::Tcp),
        "memory" => Ok(AdapterKind::Memory),
        _ => Err(NodeError::Config(format!(
            "unknown adapter kind {s:?}; expected \"tcp\" or \"memory\""
        ))),
    }
}

/// Parse a stream framing string (case-insensitive).
pub fn parse_framing(s: &str) -> Result<StreamFraming, NodeError> {
    match s.to_lowercase().as_str() {
        "hdlc" => Ok(StreamFraming::Hdlc),
        "stream" => Ok(StreamFraming::Stream),
        _ => Err(NodeError::Config(format!(
            "unknown framing {s:?}; expected \"hdlc\" or \"stream\""
        ))),
    }
}

/// Expand a leading `~/` against the home directory.
pub fn parse_path(s: &str) -> PathBuf {
    if let Some(rest) = s.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let config = GatewayConfig::parse("").unwrap();
        assert_eq!(config.gateway.display_name, "meshgate");
        assert!(config.gateway.enable_storage);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.codec.radio_frame_size, 220);
        assert!(config.adapters.crypto_mesh.is_none());
        assert!(config.adapters.radio_mesh.is_none());
    }

    #[test]
    fn defaults_match_router_defaults() {
        let config = GatewayConfig::parse("").unwrap();
        let router = config.to_router_config().unwrap();
        assert_eq!(router.radio_frame_size, 220);
        assert_eq!(router.crypto_frame_size, 500);
        assert_eq!(router.codec.reassembly_timeout, Duration::from_secs(120));
        assert_eq!(router.codec.max_pending_assemblies, 64);
        assert_eq!(router.node_ttl, Duration::from_secs(900));
        assert_eq!(router.retry.base_delay, Duration::from_secs(1));
        assert_eq!(router.retry.max_delay, Duration::from_secs(30));
        assert_eq!(router.retry.max_attempts, 5);
        assert_eq!(router.retry.overall_deadline, Duration::from_secs(300));
        assert_eq!(router.health.failure_threshold, 3);
        assert_eq!(router.health.cooldown, Duration::from_secs(10));
        assert_eq!(router.health.max_cooldown, Duration::from_secs(300));
        assert_eq!(router.address_wait, Duration::from_secs(60));
        assert_eq!(router.announce_interval, Some(Duration::from_secs(600)));
        assert!(!router.require_ack);
        assert_eq!(config.io_timeout(), Duration::from_secs(5));
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[gateway]
crypto_identity = "00112233445566778899aabbccddeeff"
radio_node_id = "!a1b2c3d4"
display_name = "hilltop"
storage_path = "/var/lib/meshgate"
require_ack = true
ack_timeout_secs = 12
announce_interval_secs = 0
max_pending_messages = 16

[logging]
level = "debug"

[codec]
radio_frame_size = 200
max_fragments = 8
reassembly_timeout_secs = 30

[retry]
base_delay_ms = 250
max_attempts = 3

[health]
failure_threshold = 5
cooldown_secs = 2

[nodes]
ttl_secs = 60

[adapters.crypto_mesh]
kind = "tcp"
target = "127.0.0.1:4242"

[adapters.radio_mesh]
kind = "TCP"
target = "10.0.0.5:4403"
framing = "stream"
mtu = 237
max_reconnect_tries = 4
"#;
        let config = GatewayConfig::parse(toml).unwrap();
        let local = config.local_identity().unwrap();
        assert_eq!(local.crypto.to_string(), "00112233445566778899aabbccddeeff");
        assert_eq!(local.radio, RadioNodeId::new(0xa1b2_c3d4));
        assert_eq!(config.logging.level, "debug");

        let router = config.to_router_config().unwrap();
        assert_eq!(router.display_name, "hilltop");
        assert!(router.require_ack);
        assert_eq!(router.ack_timeout, Duration::from_secs(12));
        assert_eq!(router.announce_interval, None);
        assert_eq!(router.max_pending_messages, 16);
        assert_eq!(router.radio_frame_size, 200);
        assert_eq!(router.codec.max_fragments, 8);
        assert_eq!(router.retry.base_delay, Duration::from_millis(250));
        assert_eq!(router.health.failure_threshold, 5);
        assert_eq!(router.node_ttl, Duration::from_secs(60));

        let radio = config.adapters.entry(Network::RadioMesh).unwrap();
        assert_eq!(radio.kind().unwrap(), AdapterKind::Tcp);
        let tcp = radio.tcp_config(Network::RadioMesh).unwrap();
        assert_eq!(tcp.framing, StreamFraming::Stream);
        assert_eq!(tcp.mtu, 237);
        assert_eq!(tcp.max_reconnect_tries, Some(4));
        assert_eq!(tcp.name, "radio_mesh[10.0.0.5:4403]");

        let crypto = config.adapters.entry(Network::CryptoMesh).unwrap();
        let tcp = crypto.tcp_config(Network::CryptoMesh).unwrap();
        assert_eq!(tcp.framing, StreamFraming::Hdlc);
        assert_eq!(tcp.mtu, 500);
    }

    #[test]
    fn derived_identities_are_stable_and_distinct() {
        let a = GatewayConfig::parse("[gateway]\ndisplay_name = \"a\"").unwrap();
        let b = GatewayConfig::parse("[gateway]\ndisplay_name = \"b\"").unwrap();
        let a1 = a.local_identity().unwrap();
        assert_eq!(a1, a.local_identity().unwrap());
        assert_ne!(a1, b.local_identity().unwrap());
        assert!(!a1.radio.is_broadcast());
    }

    #[test]
    fn parse_kind_and_framing_variants() {
        assert_eq!(parse_kind("tcp").unwrap(), AdapterKind::Tcp);
        assert_eq!(parse_kind("Memory").unwrap(), AdapterKind::Memory);
        assert!(parse_kind("serial").is_err());
        assert_eq!(parse_framing("HDLC").unwrap(), StreamFraming::Hdlc);
        assert_eq!(parse_framing("stream").unwrap(), StreamFraming::Stream);
        assert!(parse_framing("kiss").is_err());
    }

    #[test]
    fn rejects_bad_values_with_actionable_text() {
        let cases = [
            ("[codec]\nradio_frame_size = 40", "codec.radio_frame_size"),
            ("[codec]\nmax_fragments = 300", "codec.max_fragments"),
            ("[gateway]\ncrypto_identity = \"abc\"", "gateway.crypto_identity"),
            ("[gateway]\nradio_node_id = \"!ffffffff\"", "broadcast"),
            ("[gateway]\ntick_interval_ms = 0", "tick_interval_ms"),
            ("[retry]\nmax_attempts = 0", "retry.max_attempts"),
            ("[adapters.radio_mesh]\nframing = \"kiss\"", "unknown framing"),
            ("[adapters.radio_mesh]\nkind = \"serial\"", "unknown adapter kind"),
            ("[adapters.crypto_mesh]\nmtu = 20", "adapters.crypto_mesh.mtu"),
        ];
        for (toml, needle) in cases {
            let err = GatewayConfig::parse(toml).unwrap_err().to_string();
            assert!(err.contains(needle), "{toml:?} gave {err:?}");
        }
    }

    #[test]
    fn tcp_entry_without_target_is_an_error() {
        let config = GatewayConfig::parse("[adapters.crypto_mesh]\nkind = \"tcp\"").unwrap();
        let entry = config.adapters.entry(Network::CryptoMesh).unwrap();
        let err = entry.tcp_config(Network::CryptoMesh).unwrap_err();
        assert!(err.to_string().contains("needs a target"));
    }

    #[test]
    fn malformed_toml_is_config_error() {
        assert!(matches!(
            GatewayConfig::parse("[gateway"),
            Err(NodeError::Config(_))
        ));
    }

    #[test]
    fn load_missing_file() {
        let err = GatewayConfig::load(Path::new("/nonexistent/meshgate.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn parse_path_expands_home() {
        assert_eq!(parse_path("/tmp/x"), PathBuf::from("/tmp/x"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(parse_path("~/mg"), home.join("mg"));
        }
    }
}
