use serde::Deserialize;
use std::fmt;
use std::path::Path;

use crate::error::SettingsError;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const CONFIG_PATH_ENV: &str = "ALERT_BRIDGE_CONFIG";
pub const NETWORK_ENV: &str = "DYDX_NETWORK";
pub const MNEMONIC_ENV: &str = "DYDX_V4_MNEMONIC";

const DEFAULT_MAINNET_GRPC: &str = "https://dydx-ops-grpc.kingnodes.com:443";
const DEFAULT_TESTNET_GRPC: &str = "https://test-dydx-grpc.kingnodes.com";
const DEFAULT_MAINNET_INDEXER_HTTP: &str = "https://indexer.dydx.trade";
const DEFAULT_MAINNET_INDEXER_WS: &str = "wss://indexer.dydx.trade/v4/ws";
const DEFAULT_TESTNET_INDEXER_HTTP: &str = "https://indexer.v4testnet.dydx.exchange";
const DEFAULT_TESTNET_INDEXER_WS: &str = "wss://indexer.v4testnet.dydx.exchange/v4/ws";
const DEFAULT_FEE_DENOM: &str =
    "ibc/8E27BA2D5493AF5636760E354E46004562C46AB7EC0CC4C1CA14E9E20E2545B5";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }

    pub fn parse(s: &str) -> Result<Self, SettingsError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "production" | "dydx-mainnet-1" => Ok(Network::Mainnet),
            "testnet" | "dydx-testnet-4" => Ok(Network::Testnet),
            other => Err(SettingsError::UnknownNetwork(other.to_string())),
        }
    }

    pub fn chain_id(&self) -> &'static str {
        match self {
            Network::Mainnet => "dydx-mainnet-1",
            Network::Testnet => "dydx-testnet-4",
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ValidatorSettings {
    pub grpc_endpoint: String,
    pub fee_denom: String,
    /// Node request timeout, milliseconds.
    pub timeout_ms: u64,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct IndexerSettings {
    pub https_endpoint: String,
    pub wss_endpoint: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct DydxV4Settings {
    pub validator: ValidatorSettings,
    pub indexer: IndexerSettings,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TradingSettings {
    /// Fraction applied against the alert price to bound market orders.
    pub slippage: f64,
    /// Lifetime of conditional orders, seconds.
    pub good_til_secs: u64,
    /// Pause after the entry order before protective orders go out.
    pub fill_wait_secs: u64,
}

impl Default for TradingSettings {
    fn default() -> Self {
        Self {
            slippage: 0.05,
            good_til_secs: 120_000,
            fill_wait_secs: 60,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WebhookSettings {
    pub bind: String,
    pub passphrase: Option<String>,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
            passphrase: None,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub network: Network,
    pub dydx_v4: DydxV4Settings,
    pub trading: TradingSettings,
    pub webhook: WebhookSettings,
}

impl Settings {
    pub fn from_toml(raw: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(raw)?)
    }

    /// Loads the config file, falling back to built-in defaults when the default
    /// path is absent. `DYDX_NETWORK` overrides the configured network.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut settings = match path {
            Some(p) => Self::read(p)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::read(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => {
                log::warn!("no config file at {DEFAULT_CONFIG_PATH}, using defaults");
                Self::default()
            }
        };

        if let Ok(net) = std::env::var(NETWORK_ENV) {
            if !net.trim().is_empty() {
                settings.network = Network::parse(&net)?;
            }
        }
        Ok(settings)
    }

    fn read(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn grpc_endpoint(&self) -> String {
        non_empty_or(&self.dydx_v4.validator.grpc_endpoint, || match self.network {
            Network::Mainnet => DEFAULT_MAINNET_GRPC,
            Network::Testnet => DEFAULT_TESTNET_GRPC,
        })
    }

    pub fn indexer_http(&self) -> String {
        non_empty_or(&self.dydx_v4.indexer.https_endpoint, || match self.network {
            Network::Mainnet => DEFAULT_MAINNET_INDEXER_HTTP,
            Network::Testnet => DEFAULT_TESTNET_INDEXER_HTTP,
        })
    }

    pub fn indexer_ws(&self) -> String {
        non_empty_or(&self.dydx_v4.indexer.wss_endpoint, || match self.network {
            Network::Mainnet => DEFAULT_MAINNET_INDEXER_WS,
            Network::Testnet => DEFAULT_TESTNET_INDEXER_WS,
        })
    }

    pub fn fee_denom(&self) -> String {
        non_empty_or(&self.dydx_v4.validator.fee_denom, || DEFAULT_FEE_DENOM)
    }

    pub fn node_timeout_ms(&self) -> u64 {
        match self.dydx_v4.validator.timeout_ms {
            0 => 5_000,
            ms => ms,
        }
    }
}

fn non_empty_or(value: &str, fallback: impl FnOnce() -> &'static str) -> String {
    let value = value.trim();
    if value.is_empty() {
        fallback().to_string()
    } else {
        value.to_string()
    }
}

/// Wallet secret, read once at startup and handed to the exchange client.
#[derive(Clone, Default)]
pub struct Credentials {
    mnemonic: Option<String>,
}

impl Credentials {
    pub fn new(mnemonic: Option<String>) -> Self {
        let mnemonic = mnemonic
            .map(|raw| raw.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|m| !m.is_empty());
        Self { mnemonic }
    }

    pub fn from_env() -> Self {
        let creds = Self::new(std::env::var(MNEMONIC_ENV).ok());
        if creds.mnemonic.is_none() {
            log::warn!("{MNEMONIC_ENV} is not set as environment variable");
        }
        creds
    }

    pub fn mnemonic(&self) -> Option<&str> {
        self.mnemonic.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("mnemonic", &self.mnemonic.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn defaults_follow_network() {
        let s = Settings::default();
        assert_eq!(s.network, Network::Testnet);
        assert_eq!(s.grpc_endpoint(), DEFAULT_TESTNET_GRPC);
        assert_eq!(s.indexer_http(), DEFAULT_TESTNET_INDEXER_HTTP);
        assert_eq!(s.trading.slippage, 0.05);
        assert_eq!(s.trading.good_til_secs, 120_000);
        assert_eq!(s.trading.fill_wait_secs, 60);
        assert_eq!(s.node_timeout_ms(), 5_000);
    }

    #[test]
    fn parses_partial_toml() {
        let s = Settings::from_toml(
            r#"
            network = "mainnet"

            [dydx_v4.indexer]
            https_endpoint = "https://indexer.example"

            [trading]
            fill_wait_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(s.network, Network::Mainnet);
        assert_eq!(s.indexer_http(), "https://indexer.example");
        assert_eq!(s.indexer_ws(), DEFAULT_MAINNET_INDEXER_WS);
        assert_eq!(s.grpc_endpoint(), DEFAULT_MAINNET_GRPC);
        assert_eq!(s.trading.fill_wait_secs, 5);
        assert_eq!(s.trading.slippage, 0.05);
        assert_eq!(s.fee_denom(), DEFAULT_FEE_DENOM);
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let s = Settings::from_toml(include_str!("../config/default.toml")).unwrap();
        let defaults = TradingSettings::default();
        assert_eq!(s.trading.good_til_secs, defaults.good_til_secs);
        assert_eq!(s.trading.fill_wait_secs, defaults.fill_wait_secs);
        assert_eq!(s.trading.slippage, defaults.slippage);
    }

    #[test]
    fn network_aliases() {
        assert_eq!(Network::parse("production").unwrap(), Network::Mainnet);
        assert_eq!(Network::parse(" Testnet ").unwrap(), Network::Testnet);
        assert!(Network::parse("devnet").is_err());
        assert_eq!(Network::Mainnet.chain_id(), "dydx-mainnet-1");
    }

    #[test]
    #[serial]
    fn env_overrides_network() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "network = \"testnet\"").unwrap();

        std::env::set_var(NETWORK_ENV, "mainnet");
        let s = Settings::load(Some(file.path()));
        std::env::remove_var(NETWORK_ENV);

        assert_eq!(s.unwrap().network, Network::Mainnet);
    }

    #[test]
    #[serial]
    fn missing_explicit_file_is_an_error() {
        let err = Settings::load(Some(Path::new("/nonexistent/bridge.toml"))).unwrap_err();
        assert!(matches!(err, SettingsError::Read { .. }));
    }

    #[test]
    fn credentials_normalise_and_redact() {
        let c = Credentials::new(Some("  mirror   actor\n wait ".into()));
        assert_eq!(c.mnemonic(), Some("mirror actor wait"));
        assert!(!format!("{c:?}").contains("mirror"));

        assert_eq!(Credentials::new(Some("   ".into())).mnemonic(), None);
        assert_eq!(Credentials::new(None).mnemonic(), None);
    }
}
