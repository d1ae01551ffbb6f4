use std::time::Duration;

use crate::alert::{to_exchange_market, Alert};
use crate::error::{AdapterError, AlertError};
use crate::exchange::{Exchange, OrderRecord, OrderSession, SubAccount};
use crate::order::{random_client_ids, ClientIdGenerator, OrderParams, OrderPlan, OrderResult, OrderSpec};
use crate::settings::TradingSettings;

/// Turns alerts into dYdX v4 orders and answers account/order queries.
pub struct AlertAdapter<E> {
    exchange: E,
    trading: TradingSettings,
    next_id: ClientIdGenerator,
}

impl<E: Exchange> AlertAdapter<E> {
    pub fn new(exchange: E, trading: TradingSettings) -> Self {
        Self::with_id_generator(exchange, trading, random_client_ids())
    }

    pub fn with_id_generator(exchange: E, trading: TradingSettings, next_id: ClientIdGenerator) -> Self {
        Self {
            exchange,
            trading,
            next_id,
        }
    }

    pub fn exchange(&self) -> &E {
        &self.exchange
    }

    pub async fn get_subaccount(&self) -> Option<SubAccount> {
        match self.exchange.get_subaccount().await {
            Ok(sub) => Some(sub),
            Err(err) => {
                log::error!("fetch subaccount failed: {err}");
                None
            }
        }
    }

    pub async fn is_account_ready(&self) -> bool {
        let Some(sub) = self.get_subaccount().await else {
            return false;
        };
        log::info!(
            "dydx v4 account {} equity={} free_collateral={}",
            sub.address,
            sub.equity,
            sub.free_collateral
        );
        sub.is_ready()
    }

    pub async fn get_orders(&self) -> Option<Vec<OrderRecord>> {
        match self.exchange.list_orders().await {
            Ok(orders) => Some(orders),
            Err(err) => {
                log::error!("fetch orders failed: {err}");
                None
            }
        }
    }

    pub async fn is_order_filled(&self, client_id: u32) -> bool {
        let Some(orders) = self.get_orders().await else {
            return false;
        };
        let Some(order) = orders.iter().find(|o| o.client_id == client_id) else {
            return false;
        };
        log::info!("dYdX v4 order id: {} status={}", order.id, order.status);
        order.is_filled()
    }

    /// Exchange-facing params for an alert. Only leverage sizing hits the network.
    pub async fn build_order_params(&self, alert: &Alert) -> Result<OrderParams, AdapterError> {
        let market = to_exchange_market(&alert.market);
        if market.is_empty() {
            return Err(AlertError::EmptyMarket.into());
        }

        let equity = if alert.needs_equity() {
            self.get_subaccount().await.map(|sub| sub.equity)
        } else {
            None
        };
        let size = alert.resolve_size(equity)?;

        let params = OrderParams {
            market,
            side: alert.side(),
            size,
            price: alert.price,
        };
        log::info!(
            "order params: market={} side={} size={} price={}",
            params.market,
            params.side,
            params.size,
            params.price
        );
        Ok(params)
    }

    pub async fn build_order_plan(&self, alert: &Alert) -> Result<OrderPlan, AdapterError> {
        let params = self.build_order_params(alert).await?;
        Ok(OrderPlan::build(
            &params,
            alert.take_profit(),
            alert.stop_loss(),
            self.trading.slippage,
            self.trading.good_til_secs,
            &*self.next_id,
        ))
    }

    /// Places the entry order, then the take-profit and stop-loss if requested.
    ///
    /// All legs share one exchange session. A failed entry stops the sequence. A
    /// failed protective order does not stop the other one, but the call still
    /// reports failure afterwards.
    pub async fn place_order(&self, alert: &Alert) -> Result<OrderResult, AdapterError> {
        let plan = self.build_order_plan(alert).await?;
        let primary = &plan.primary;

        let mut session = match self.exchange.open_session().await {
            Ok(session) => session,
            Err(err) => {
                log::error!("open exchange session failed: {err:#}");
                return Err(AdapterError::from_submission("entry", err));
            }
        };

        submit(&mut session, "entry", primary).await?;

        if self.trading.fill_wait_secs > 0 {
            log::info!("waiting {}s for the entry to fill", self.trading.fill_wait_secs);
            tokio::time::sleep(Duration::from_secs(self.trading.fill_wait_secs)).await;
        }

        let mut failed = Vec::new();
        for (leg, spec) in [("take-profit", &plan.take_profit), ("stop-loss", &plan.stop_loss)] {
            let Some(spec) = spec else { continue };
            if let Err(err) = submit(&mut session, leg, spec).await {
                failed.push(err.to_string());
            }
        }

        if !failed.is_empty() {
            return Err(AdapterError::PlaceOrder(failed.join("; ")));
        }

        Ok(OrderResult {
            side: primary.side,
            size: primary.size,
            order_id: primary.client_id.to_string(),
        })
    }
}

async fn submit<S: OrderSession>(session: &mut S, leg: &str, spec: &OrderSpec) -> Result<String, AdapterError> {
    log::info!(
        "placing {leg} {} {} {} size={} price={} trigger={:?} client_id={}",
        spec.kind,
        spec.side,
        spec.market,
        spec.size,
        spec.price,
        spec.trigger_price,
        spec.client_id
    );
    match session.place_order(spec).await {
        Ok(tx_hash) => {
            log::info!("{leg} placed, tx={tx_hash}");
            Ok(tx_hash)
        }
        Err(err) => {
            log::error!("{leg} order failed: {err:#}");
            Err(AdapterError::from_submission(leg, err))
        }
    }
}
