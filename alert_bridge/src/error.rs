use thiserror::Error;

/// Problems with the alert itself, found before anything is sent.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AlertError {
    #[error("price must be > 0")]
    InvalidPrice,
    #[error("size must be > 0 (got {0})")]
    InvalidSize(f64),
    #[error("leverage sizing needs the subaccount equity, which is unavailable")]
    AccountUnavailable,
    #[error("market symbol is empty")]
    EmptyMarket,
}

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("DYDX_V4_MNEMONIC is not set")]
    MissingCredentials,
    #[error("failed to connect to dYdX v4 client: {0}")]
    Connect(#[source] anyhow::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("invalid alert: {0}")]
    InvalidAlert(#[from] AlertError),
    #[error("dYdX v4 account is unavailable")]
    Unavailable,
    #[error("failed to connect to dYdX v4 client")]
    Connect(#[source] ExchangeError),
    #[error("failed to place order: {0}")]
    PlaceOrder(String),
}

impl AdapterError {
    /// Maps a failed submission onto the caller-facing error.
    pub(crate) fn from_submission(leg: &str, err: ExchangeError) -> Self {
        match err {
            ExchangeError::MissingCredentials => AdapterError::Unavailable,
            ExchangeError::Connect(_) => AdapterError::Connect(err),
            ExchangeError::Other(e) => AdapterError::PlaceOrder(format!("{leg}: {e}")),
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unsupported network: {0}")]
    UnknownNetwork(String),
}
