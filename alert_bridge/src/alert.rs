use serde::{Deserialize, Deserializer};

use crate::error::AlertError;
use crate::order::OrderSide;

/// An inbound trading alert, as posted by the signal source.
///
/// Numeric fields accept either JSON numbers or numeric strings, since alert
/// templates often quote their placeholders.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub market: String,
    pub order: String,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub size: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub size_usd: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub size_by_leverage: Option<f64>,
    #[serde(deserialize_with = "de_number")]
    pub price: f64,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub tp: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub sl: Option<f64>,
    #[serde(default)]
    pub reverse: bool,
    #[serde(default)]
    pub passphrase: Option<String>,
}

impl Alert {
    pub fn side(&self) -> OrderSide {
        OrderSide::from_alert(&self.order)
    }

    /// True when sizing depends on the live subaccount equity.
    pub fn needs_equity(&self) -> bool {
        present(self.size_by_leverage).is_some()
    }

    pub fn take_profit(&self) -> Option<f64> {
        present(self.tp)
    }

    pub fn stop_loss(&self) -> Option<f64> {
        present(self.sl)
    }

    /// Resolves the order size from exactly one sizing source.
    ///
    /// Precedence is leverage, then USD notional, then the literal size. A zero
    /// field counts as absent. The reverse flag is applied once, afterwards.
    pub fn resolve_size(&self, equity: Option<f64>) -> Result<f64, AlertError> {
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(AlertError::InvalidPrice);
        }

        let size = if let Some(leverage) = present(self.size_by_leverage) {
            let equity = equity.ok_or(AlertError::AccountUnavailable)?;
            equity * leverage / self.price
        } else if let Some(usd) = present(self.size_usd) {
            usd / self.price
        } else {
            self.size.unwrap_or(0.0)
        };

        let size = double_size_if_reverse_order(self, size);
        if !size.is_finite() || size <= 0.0 {
            return Err(AlertError::InvalidSize(size));
        }
        Ok(size)
    }
}

/// A reversal closes the current position and opens the opposite one, so the
/// order has to cover twice the configured size.
pub fn double_size_if_reverse_order(alert: &Alert, size: f64) -> f64 {
    if alert.reverse {
        size * 2.0
    } else {
        size
    }
}

/// `ETH_USD` -> `ETH-USD`.
pub fn to_exchange_market(market: &str) -> String {
    market.trim().replace('_', "-")
}

/// `ETH-USD` -> `ETH_USD`.
pub fn to_alert_market(market: &str) -> String {
    market.trim().replace('-', "_")
}

fn present(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v != 0.0)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    String(String),
}

impl NumberOrString {
    fn into_f64<E: serde::de::Error>(self) -> Result<Option<f64>, E> {
        match self {
            NumberOrString::Number(n) => Ok(Some(n)),
            NumberOrString::String(s) if s.trim().is_empty() => Ok(None),
            NumberOrString::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| E::custom(format!("not a number: {s}"))),
        }
    }
}

fn de_opt_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        Some(v) => v.into_f64(),
        None => Ok(None),
    }
}

fn de_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    NumberOrString::deserialize(deserializer)?
        .into_f64::<D::Error>()?
        .ok_or_else(|| serde::de::Error::custom("missing number"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert() -> Alert {
        Alert {
            market: "ETH_USD".into(),
            order: "buy".into(),
            size: Some(1.5),
            price: 3000.0,
            ..Default::default()
        }
    }

    #[test]
    fn literal_size_is_used_without_other_sources() {
        assert_eq!(alert().resolve_size(None), Ok(1.5));
    }

    #[test]
    fn usd_notional_divides_by_price() {
        let a = Alert {
            size_usd: Some(600.0),
            ..alert()
        };
        assert_eq!(a.resolve_size(None), Ok(0.2));
    }

    #[test]
    fn leverage_uses_equity() {
        let a = Alert {
            size_by_leverage: Some(2.0),
            size_usd: Some(600.0),
            ..alert()
        };
        assert!(a.needs_equity());
        assert_eq!(a.resolve_size(Some(4500.0)), Ok(3.0));
    }

    #[test]
    fn leverage_without_equity_fails() {
        let a = Alert {
            size_by_leverage: Some(2.0),
            ..alert()
        };
        assert_eq!(a.resolve_size(None), Err(AlertError::AccountUnavailable));
    }

    #[test]
    fn zero_usd_falls_through_to_literal() {
        let a = Alert {
            size_usd: Some(0.0),
            ..alert()
        };
        assert_eq!(a.resolve_size(None), Ok(1.5));
    }

    #[test]
    fn reverse_doubles_once() {
        let a = Alert {
            reverse: true,
            size_usd: Some(3000.0),
            ..alert()
        };
        assert_eq!(a.resolve_size(None), Ok(2.0));
    }

    #[test]
    fn rejects_missing_size_and_bad_price() {
        let a = Alert {
            size: None,
            ..alert()
        };
        assert_eq!(a.resolve_size(None), Err(AlertError::InvalidSize(0.0)));

        let a = Alert {
            price: 0.0,
            ..alert()
        };
        assert_eq!(a.resolve_size(None), Err(AlertError::InvalidPrice));
    }

    #[test]
    fn market_delimiter_round_trips() {
        for m in ["ETH_USD", "BTC_USD", "1INCH_USD"] {
            let exchange = to_exchange_market(m);
            assert!(!exchange.contains('_'));
            assert_eq!(to_alert_market(&exchange), m);
        }
        assert_eq!(to_exchange_market("SOL-USD"), "SOL-USD");
    }

    #[test]
    fn parses_quoted_numbers() {
        let a: Alert = serde_json::from_str(
            r#"{"market":"ETH_USD","order":"Sell","size":"","sizeUsd":"150","price":"3000","tp":2800}"#,
        )
        .unwrap();
        assert_eq!(a.size, None);
        assert_eq!(a.size_usd, Some(150.0));
        assert_eq!(a.price, 3000.0);
        assert_eq!(a.tp, Some(2800.0));
        assert_eq!(a.side(), OrderSide::Sell);
        assert!(!a.reverse);
    }
}
