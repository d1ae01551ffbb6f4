#![allow(dead_code)]

use alert_bridge::exchange::{Exchange, OrderRecord, OrderSession, SubAccount};
use alert_bridge::order::{ClientIdGenerator, OrderKind, OrderSpec};
use alert_bridge::settings::TradingSettings;
use alert_bridge::{AlertAdapter, ExchangeError};
use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory exchange that records every submission.
#[derive(Default)]
pub struct FakeExchange {
    pub submitted: Arc<Mutex<Vec<OrderSpec>>>,
    pub sessions_opened: Arc<AtomicUsize>,
    pub failing: Vec<OrderKind>,
    pub connect_fails: bool,
    pub missing_credentials: bool,
    pub subaccount: Option<SubAccount>,
    pub orders: Option<Vec<OrderRecord>>,
}

impl FakeExchange {
    pub fn with_equity(equity: f64, free_collateral: f64) -> Self {
        Self {
            subaccount: Some(SubAccount {
                address: "dydx1testaddress".into(),
                subaccount_number: 0,
                equity,
                free_collateral,
            }),
            ..Default::default()
        }
    }

    pub fn without_credentials() -> Self {
        Self {
            missing_credentials: true,
            ..Default::default()
        }
    }

    pub fn failing_on(mut self, kind: OrderKind) -> Self {
        self.failing.push(kind);
        self
    }

    pub fn submitted(&self) -> Vec<OrderSpec> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }
}

pub struct FakeSession {
    submitted: Arc<Mutex<Vec<OrderSpec>>>,
    failing: Vec<OrderKind>,
}

#[async_trait]
impl OrderSession for FakeSession {
    async fn place_order(&mut self, spec: &OrderSpec) -> Result<String, ExchangeError> {
        self.submitted.lock().unwrap().push(spec.clone());
        if self.failing.contains(&spec.kind) {
            return Err(ExchangeError::Other(anyhow!("rejected {}", spec.kind)));
        }
        Ok(format!("TX{}", spec.client_id))
    }
}

#[async_trait]
impl Exchange for FakeExchange {
    type Session = FakeSession;

    async fn open_session(&self) -> Result<FakeSession, ExchangeError> {
        if self.missing_credentials {
            return Err(ExchangeError::MissingCredentials);
        }
        if self.connect_fails {
            return Err(ExchangeError::Connect(anyhow!("connection refused")));
        }
        self.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(FakeSession {
            submitted: Arc::clone(&self.submitted),
            failing: self.failing.clone(),
        })
    }

    async fn get_subaccount(&self) -> Result<SubAccount, ExchangeError> {
        if self.missing_credentials {
            return Err(ExchangeError::MissingCredentials);
        }
        self.subaccount
            .clone()
            .ok_or(ExchangeError::MissingCredentials)
    }

    async fn list_orders(&self) -> Result<Vec<OrderRecord>, ExchangeError> {
        if self.missing_credentials {
            return Err(ExchangeError::MissingCredentials);
        }
        self.orders
            .clone()
            .ok_or_else(|| ExchangeError::Other(anyhow!("indexer unreachable")))
    }
}

pub fn sequential_ids(start: u32) -> ClientIdGenerator {
    let next = AtomicU32::new(start);
    Arc::new(move || next.fetch_add(1, Ordering::SeqCst))
}

pub fn no_wait() -> TradingSettings {
    TradingSettings {
        fill_wait_secs: 0,
        ..Default::default()
    }
}

pub fn adapter(exchange: FakeExchange) -> AlertAdapter<FakeExchange> {
    AlertAdapter::with_id_generator(exchange, no_wait(), sequential_ids(1))
}
