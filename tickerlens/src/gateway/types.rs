//! Typed payloads exchanged with upstream collaborators.
//!
//! Each resource has its own struct with explicit required and optional
//! fields; there are no free-form maps.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Live quote for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub code: String,
    pub name: String,
    pub price: f64,
    pub change: f64,
    /// Percent change versus the previous close.
    pub change_rate: f64,
}

/// One daily bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ohlcv {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Participant category used in order-flow breakdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestorClass {
    Foreign,
    Institution,
    Individual,
}

impl fmt::Display for InvestorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InvestorClass::Foreign => "foreign",
            InvestorClass::Institution => "institution",
            InvestorClass::Individual => "individual",
        };
        f.write_str(s)
    }
}

/// Buy/sell totals with per-class net quantities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderFlow {
    pub buy_qty: i64,
    pub sell_qty: i64,
    pub net_by_class: BTreeMap<InvestorClass, i64>,
}

impl OrderFlow {
    /// Net quantity for `class`; zero if the upstream did not report it.
    pub fn net(&self, class: InvestorClass) -> i64 {
        self.net_by_class.get(&class).copied().unwrap_or(0)
    }
}

/// Valuation and profitability figures.
///
/// Every field is optional: upstreams frequently omit one or more.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    pub per: Option<f64>,
    pub pbr: Option<f64>,
    pub roe: Option<f64>,
    pub market_cap: Option<i64>,
    pub operating_profit: Option<i64>,
}

/// Indicator values derived from a daily series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalIndicators {
    pub rsi: f64,
    pub rsi_signal: String,
    pub macd: f64,
    pub macd_signal: String,
    pub ma5: Option<f64>,
    pub ma20: Option<f64>,
    pub ma60: Option<f64>,
    pub ma_signal: String,
}

impl Default for TechnicalIndicators {
    /// Neutral values used when the series is missing or too short.
    fn default() -> Self {
        Self {
            rsi: 50.0,
            rsi_signal: "insufficient data".to_string(),
            macd: 0.0,
            macd_signal: "insufficient data".to_string(),
            ma5: None,
            ma20: None,
            ma60: None,
            ma_signal: "insufficient data".to_string(),
        }
    }
}

/// What the synthesis engine is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisKind {
    /// Digest of narrative text with a sentiment label.
    News,
    /// Forward-looking outlook with recommendation and price levels.
    Outlook,
}

/// Structured input to the synthesis engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesisRequest {
    pub kind: SynthesisKind,
    pub subject: String,
    pub subject_name: String,
    /// Free-form context assembled by the orchestrator.
    pub context: String,
}

/// Suggested price levels attached to an outlook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceLevels {
    pub entry: Option<f64>,
    pub target: Option<f64>,
    pub stop: Option<f64>,
}

/// Output of the synthesis engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synthesis {
    pub recommendation: String,
    /// 0..=100
    pub confidence: u8,
    pub rationale: String,
    #[serde(default)]
    pub price_levels: PriceLevels,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_flow_net_defaults_to_zero() {
        let mut flow = OrderFlow::default();
        flow.net_by_class.insert(InvestorClass::Foreign, 1200);
        assert_eq!(flow.net(InvestorClass::Foreign), 1200);
        assert_eq!(flow.net(InvestorClass::Institution), 0);
    }

    #[test]
    fn test_indicator_defaults() {
        let ind = TechnicalIndicators::default();
        assert_eq!(ind.rsi, 50.0);
        assert_eq!(ind.ma_signal, "insufficient data");
    }

    #[test]
    fn test_synthesis_missing_price_levels_deserializes() {
        let json = r#"{"recommendation":"buy","confidence":70,"rationale":"momentum"}"#;
        let synth: Synthesis = serde_json::from_str(json).unwrap();
        assert_eq!(synth.price_levels, PriceLevels::default());
    }

    #[test]
    fn test_investor_class_serializes_snake_case() {
        let mut flow = OrderFlow::default();
        flow.net_by_class.insert(InvestorClass::Institution, -5);
        let value = serde_json::to_value(&flow).unwrap();
        assert_eq!(value["net_by_class"]["institution"], -5);
    }
}
