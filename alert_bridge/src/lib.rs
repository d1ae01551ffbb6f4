//! Bridges trading alerts from a webhook to dYdX v4 orders.

pub mod adapter;
pub mod alert;
pub mod error;
pub mod exchange;
pub mod order;
pub mod settings;
pub mod webhook;

pub use adapter::AlertAdapter;
pub use alert::Alert;
pub use error::{AdapterError, AlertError, ExchangeError, SettingsError};
pub use exchange::{DydxExchange, Exchange, OrderRecord, OrderSession, SubAccount};
pub use order::{OrderKind, OrderPlan, OrderResult, OrderSide, OrderSpec};
pub use settings::{Credentials, Network, Settings};
