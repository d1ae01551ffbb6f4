use derive_more::Display;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;

/// Client ids live in the non-negative `i32` range.
pub const MAX_CLIENT_ID: u32 = i32::MAX as u32;

/// Source of correlation ids for submitted orders.
pub type ClientIdGenerator = Arc<dyn Fn() -> u32 + Send + Sync>;

pub fn random_client_id() -> u32 {
    rand::thread_rng().gen_range(0..=MAX_CLIENT_ID)
}

pub fn random_client_ids() -> ClientIdGenerator {
    Arc::new(random_client_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    #[display("BUY")]
    Buy,
    #[display("SELL")]
    Sell,
}

impl OrderSide {
    /// "buy" in any case means BUY; everything else is a SELL.
    pub fn from_alert(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("buy") {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    #[display("MARKET")]
    Market,
    #[display("TAKE_PROFIT_MARKET")]
    TakeProfitMarket,
    #[display("STOP_MARKET")]
    StopMarket,
}

impl OrderKind {
    pub fn is_conditional(self) -> bool {
        !matches!(self, OrderKind::Market)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimeInForce {
    GoodTilTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Execution {
    Default,
}

/// Exchange-facing parameters derived from an alert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderParams {
    pub market: String,
    pub side: OrderSide,
    pub size: f64,
    pub price: f64,
}

/// One order ready for submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderSpec {
    pub market: String,
    pub side: OrderSide,
    pub kind: OrderKind,
    pub size: f64,
    /// Worst acceptable price for market orders.
    pub price: f64,
    pub trigger_price: Option<f64>,
    pub reduce_only: bool,
    pub client_id: u32,
    pub time_in_force: TimeInForce,
    pub execution: Execution,
    pub good_til_secs: u64,
}

/// The entry order plus its optional protective orders.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPlan {
    pub primary: OrderSpec,
    pub take_profit: Option<OrderSpec>,
    pub stop_loss: Option<OrderSpec>,
}

impl OrderPlan {
    pub fn build(
        params: &OrderParams,
        take_profit: Option<f64>,
        stop_loss: Option<f64>,
        slippage: f64,
        good_til_secs: u64,
        next_id: &(dyn Fn() -> u32 + Send + Sync),
    ) -> Self {
        let price = match params.side {
            OrderSide::Buy => params.price * (1.0 + slippage),
            OrderSide::Sell => params.price * (1.0 - slippage),
        };

        let primary = OrderSpec {
            market: params.market.clone(),
            side: params.side,
            kind: OrderKind::Market,
            size: params.size,
            price,
            trigger_price: None,
            reduce_only: false,
            client_id: next_id(),
            time_in_force: TimeInForce::GoodTilTime,
            execution: Execution::Default,
            good_til_secs,
        };

        let protective = |kind: OrderKind, trigger: f64| OrderSpec {
            market: params.market.clone(),
            side: params.side.opposite(),
            kind,
            size: params.size,
            price: trigger,
            trigger_price: Some(trigger),
            reduce_only: true,
            client_id: next_id(),
            time_in_force: TimeInForce::GoodTilTime,
            execution: Execution::Default,
            good_til_secs,
        };

        let take_profit = take_profit.map(|tp| protective(OrderKind::TakeProfitMarket, tp));
        let stop_loss = stop_loss.map(|sl| protective(OrderKind::StopMarket, sl));

        Self {
            primary,
            take_profit,
            stop_loss,
        }
    }

    pub fn len(&self) -> usize {
        1 + usize::from(self.take_profit.is_some()) + usize::from(self.stop_loss.is_some())
    }
}

/// What the caller gets back once the sequence went through.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResult {
    pub side: OrderSide,
    pub size: f64,
    pub order_id: String,
}
