pub mod dydx_v4;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ExchangeError;
use crate::order::OrderSpec;

pub use self::dydx_v4::DydxExchange;

/// The bridge only ever uses subaccount 0.
pub const SUBACCOUNT_NUMBER: u32 = 0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubAccount {
    pub address: String,
    pub subaccount_number: u32,
    pub equity: f64,
    pub free_collateral: f64,
}

impl SubAccount {
    pub fn is_ready(&self) -> bool {
        self.free_collateral > 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub id: String,
    pub client_id: u32,
    pub market: String,
    pub side: String,
    /// Indexer status string, e.g. `OPEN`, `FILLED`, `CANCELED`, `UNTRIGGERED`.
    pub status: String,
}

impl OrderRecord {
    pub fn is_filled(&self) -> bool {
        self.status == "FILLED"
    }
}

/// The narrow slice of the dYdX SDK the bridge depends on.
#[async_trait]
pub trait Exchange: Send + Sync {
    type Session: OrderSession;

    /// Connects once for a whole alert sequence. Every leg goes through the
    /// returned session so the signer's sequence number carries over.
    async fn open_session(&self) -> Result<Self::Session, ExchangeError>;

    async fn get_subaccount(&self) -> Result<SubAccount, ExchangeError>;

    /// Open and historical orders of the subaccount, as reported by the indexer.
    async fn list_orders(&self) -> Result<Vec<OrderRecord>, ExchangeError>;
}

/// A live node connection plus the signing account.
#[async_trait]
pub trait OrderSession: Send {
    /// Broadcasts one order and returns the transaction hash.
    async fn place_order(&mut self, spec: &OrderSpec) -> Result<String, ExchangeError>;
}
