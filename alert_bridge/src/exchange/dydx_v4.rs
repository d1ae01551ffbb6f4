use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, TimeDelta, Utc};
use dydx::indexer::{
    ApiOrderStatus, Denom, IndexerClient, IndexerConfig, OrderStatus, RestConfig, SockConfig,
    Subaccount,
};
use dydx::node::{
    Account, ChainId, NodeClient, NodeConfig, OrderBuilder, OrderGoodUntil,
    OrderSide as DydxOrderSide, Wallet,
};
use dydx_proto::dydxprotocol::clob::order::TimeInForce as DydxTimeInForce;
use rustls::crypto::ring;
use std::num::NonZeroU32;
use std::str::FromStr;

use super::{Exchange, OrderRecord, OrderSession, SubAccount, SUBACCOUNT_NUMBER};
use crate::error::ExchangeError;
use crate::order::{OrderKind, OrderSide, OrderSpec, TimeInForce};
use crate::settings::{Credentials, Network, Settings};

/// Short-term market orders stay valid for this many blocks.
const SHORT_TERM_BLOCKS: u32 = 10;

/// Exchange backed by a dYdX v4 validator node and indexer.
///
/// Every call builds its own clients; nothing is cached between alerts.
pub struct DydxExchange {
    settings: Settings,
    credentials: Credentials,
}

impl DydxExchange {
    pub fn new(settings: Settings, credentials: Credentials) -> Self {
        let _ = ring::default_provider().install_default();
        Self {
            settings,
            credentials,
        }
    }

    fn wallet(&self) -> Result<Wallet, ExchangeError> {
        let mnemonic = self
            .credentials
            .mnemonic()
            .ok_or(ExchangeError::MissingCredentials)?;
        let wallet = Wallet::from_mnemonic(mnemonic).context("wallet from mnemonic")?;
        Ok(wallet)
    }

    /// Subaccount 0 of the wallet, without touching the network.
    fn subaccount(&self) -> Result<Subaccount, ExchangeError> {
        let account = self
            .wallet()?
            .account_offline(0)
            .context("derive account")?;
        log::info!("dYdX v4 address: {}", account.address());
        let subaccount = account
            .subaccount(SUBACCOUNT_NUMBER)
            .context("derive subaccount")?;
        Ok(subaccount)
    }

    async fn connect_node(&self) -> Result<NodeClient, ExchangeError> {
        let chain_id = match self.settings.network {
            Network::Mainnet => ChainId::Mainnet1,
            Network::Testnet => ChainId::Testnet4,
        };
        let fee_denom = Denom::from_str(&self.settings.fee_denom())
            .map_err(|e| anyhow!("invalid fee denom: {e}"))?;
        let config = NodeConfig {
            endpoint: self.settings.grpc_endpoint(),
            timeout: self.settings.node_timeout_ms(),
            chain_id,
            fee_denom,
            manage_sequencing: true,
        };
        NodeClient::connect(config)
            .await
            .map_err(|e| ExchangeError::Connect(anyhow!("node connect failed: {e}")))
    }

    fn indexer(&self) -> IndexerClient {
        IndexerClient::new(IndexerConfig {
            rest: RestConfig {
                endpoint: self.settings.indexer_http(),
            },
            sock: SockConfig {
                endpoint: self.settings.indexer_ws(),
                timeout: 1_000,
                rate_limit: NonZeroU32::new(2).unwrap_or(NonZeroU32::MIN),
            },
        })
    }

    async fn account(&self, client: &mut NodeClient) -> Result<Account, ExchangeError> {
        let wallet = self.wallet()?;
        let account = wallet
            .account(0, client)
            .await
            .context("load trading account")?;
        Ok(account)
    }
}

/// One node connection and account reused for every leg of an alert.
pub struct DydxSession {
    client: NodeClient,
    account: Account,
    subaccount: Subaccount,
    indexer: IndexerClient,
}

#[async_trait]
impl OrderSession for DydxSession {
    async fn place_order(&mut self, spec: &OrderSpec) -> Result<String, ExchangeError> {
        let market = self
            .indexer
            .markets()
            .get_perpetual_market(&spec.market.clone().into())
            .await
            .context("load market metadata")?;

        let side = to_dydx_side(spec.side);
        let size = to_decimal(spec.size, 8).context("order size")?;
        let price = to_decimal(spec.price, 10).context("order price")?;

        let builder = OrderBuilder::new(market, self.subaccount.clone());
        let builder = match spec.kind {
            OrderKind::Market => {
                let height = self
                    .client
                    .latest_block_height()
                    .await
                    .context("fetch latest height")?;
                builder
                    .market(side, size)
                    .time_in_force(DydxTimeInForce::Unspecified)
                    .until(height.ahead(SHORT_TERM_BLOCKS))
            }
            OrderKind::TakeProfitMarket | OrderKind::StopMarket => {
                let trigger = spec
                    .trigger_price
                    .ok_or_else(|| anyhow!("{} order without trigger price", spec.kind))?;
                let trigger = to_decimal(trigger, 10).context("trigger price")?;
                let builder = if spec.kind == OrderKind::TakeProfitMarket {
                    builder.take_profit_market(side, trigger, size)
                } else {
                    builder.stop_market(side, trigger, size)
                };
                builder
                    .time_in_force(match spec.time_in_force {
                        TimeInForce::GoodTilTime => DydxTimeInForce::Unspecified,
                    })
                    .until(OrderGoodUntil::Time(good_til_time(Utc::now(), spec.good_til_secs)))
            }
        };

        let (_id, order) = builder
            .reduce_only(spec.reduce_only)
            .price(price)
            .build(spec.client_id)
            .context("build order")?;

        let tx_hash = self
            .client
            .place_order(&mut self.account, order)
            .await
            .context("broadcast order")?;
        Ok(tx_hash)
    }
}

#[async_trait]
impl Exchange for DydxExchange {
    type Session = DydxSession;

    async fn open_session(&self) -> Result<DydxSession, ExchangeError> {
        // Fail on missing credentials before opening a connection.
        self.wallet()?;
        let mut client = self.connect_node().await?;
        let account = self.account(&mut client).await?;
        let subaccount = account
            .subaccount(SUBACCOUNT_NUMBER)
            .context("derive subaccount")?;
        log::info!("dYdX v4 address: {}", account.address());

        Ok(DydxSession {
            client,
            account,
            subaccount,
            indexer: self.indexer(),
        })
    }

    async fn get_subaccount(&self) -> Result<SubAccount, ExchangeError> {
        let subaccount = self.subaccount()?;
        let response = self
            .indexer()
            .accounts()
            .get_subaccount(&subaccount)
            .await
            .context("fetch subaccount")?;

        Ok(SubAccount {
            address: response.address.to_string(),
            subaccount_number: SUBACCOUNT_NUMBER,
            equity: to_f64(&response.equity)?,
            free_collateral: to_f64(&response.free_collateral)?,
        })
    }

    async fn list_orders(&self) -> Result<Vec<OrderRecord>, ExchangeError> {
        let subaccount = self.subaccount()?;
        let orders = self
            .indexer()
            .accounts()
            .get_subaccount_orders(&subaccount, None)
            .await
            .context("fetch subaccount orders")?;

        Ok(orders
            .into_iter()
            .map(|o| OrderRecord {
                id: o.id.0,
                client_id: o.client_id.0,
                market: o.ticker.0,
                side: format!("{:?}", o.side).to_ascii_uppercase(),
                status: status_label(&o.status),
            })
            .collect())
    }
}

fn to_dydx_side(side: OrderSide) -> DydxOrderSide {
    match side {
        OrderSide::Buy => DydxOrderSide::Buy,
        OrderSide::Sell => DydxOrderSide::Sell,
    }
}

fn to_decimal(value: f64, decimals: usize) -> Result<BigDecimal> {
    if !value.is_finite() || value <= 0.0 {
        return Err(anyhow!("must be > 0, got {value}"));
    }
    let raw = format!("{value:.decimals$}");
    BigDecimal::from_str(&raw).with_context(|| format!("parse decimal {raw}"))
}

/// Expiry of a conditional order placed at `now`.
fn good_til_time(now: DateTime<Utc>, good_til_secs: u64) -> DateTime<Utc> {
    let secs = i64::try_from(good_til_secs).unwrap_or(i64::MAX);
    TimeDelta::try_seconds(secs)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn to_f64(value: &BigDecimal) -> Result<f64> {
    value
        .to_string()
        .parse::<f64>()
        .with_context(|| format!("decimal out of range: {value}"))
}

fn status_label(status: &ApiOrderStatus) -> String {
    match status {
        ApiOrderStatus::OrderStatus(OrderStatus::Filled) => "FILLED".to_string(),
        ApiOrderStatus::OrderStatus(OrderStatus::Open) => "OPEN".to_string(),
        ApiOrderStatus::OrderStatus(OrderStatus::Canceled) => "CANCELED".to_string(),
        ApiOrderStatus::OrderStatus(OrderStatus::Untriggered) => "UNTRIGGERED".to_string(),
        other => format!("{other:?}").to_ascii_uppercase(),
    }
}
