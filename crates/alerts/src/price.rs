//! BTC spot price lookup for the bot's price check.
//!
//! Fetches the BTC/USD rate from Coinbase's public exchange-rates endpoint.

use std::time::Duration;
use thiserror::Error;

const COINBASE_BTC_RATES_URL: &str = "https://api.coinbase.com/v2/exchange-rates?currency=BTC";

#[derive(Error, Debug)]
pub enum PriceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("USD rate not found in response")]
    MissingRate,
    #[error("Invalid USD rate: {0}")]
    InvalidRate(String),
}

/// Client for the BTC/USD spot price.
#[derive(Debug, Clone)]
pub struct PriceClient {
    client: reqwest::Client,
    url: String,
}

impl PriceClient {
    /// Create a client whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, PriceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: COINBASE_BTC_RATES_URL.to_string(),
        })
    }

    /// Point the client at a different endpoint with the same response shape.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Fetch the current BTC price in USD.
    pub async fn btc_usd(&self) -> Result<f64, PriceError> {
        let response: serde_json::Value = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_usd_rate(&response)
    }
}

/// Extract `data.rates.USD` from a Coinbase exchange-rates response.
pub fn parse_usd_rate(response: &serde_json::Value) -> Result<f64, PriceError> {
    let rate = &response["data"]["rates"]["USD"];

    // Coinbase sends rates as strings; accept plain numbers too.
    let value = match rate {
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| PriceError::InvalidRate(s.clone()))?,
        serde_json::Value::Number(n) => n.as_f64().ok_or(PriceError::MissingRate)?,
        serde_json::Value::Null => return Err(PriceError::MissingRate),
        other => return Err(PriceError::InvalidRate(other.to_string())),
    };

    if !value.is_finite() || value <= 0.0 {
        return Err(PriceError::InvalidRate(value.to_string()));
    }
    Ok(value)
}

/// Change between two observations of a price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceChange {
    pub delta: f64,
    pub percent: f64,
}

impl PriceChange {
    pub fn between(previous: f64, current: f64) -> Option<Self> {
        if previous == 0.0 {
            return None;
        }
        let delta = current - previous;
        Some(Self {
            delta,
            percent: delta * 100.0 / previous,
        })
    }

    pub fn arrow(&self) -> &'static str {
        if self.delta > 0.0 {
            "📈"
        } else if self.delta < 0.0 {
            "📉"
        } else {
            "➡️"
        }
    }
}

/// Format a USD amount with thousands separators and two decimals.
pub fn format_usd(amount: f64) -> String {
    let formatted = format!("{:.2}", amount.abs());
    let (whole, frac) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{}${}.{}", sign, grouped, frac)
}
