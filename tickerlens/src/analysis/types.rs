//! Report records produced by the analysis orchestrator.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cache::CacheLookup;
use crate::gateway::{
    Fundamentals, InvestorClass, Ohlcv, OrderFlow, Quote, Synthesis, TechnicalIndicators,
};
use crate::themes::MatchResult;

/// Which stages run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Every stage, including narrative, theme match and synthesis.
    #[default]
    Full,
    /// Market data only: quote, order flow, series, indicators,
    /// fundamentals.
    Lightweight,
}

impl AnalysisMode {
    pub fn includes(&self, stage: Stage) -> bool {
        match self {
            AnalysisMode::Full => true,
            AnalysisMode::Lightweight => !matches!(
                stage,
                Stage::Narrative | Stage::ThemeMatch | Stage::Synthesis
            ),
        }
    }
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Quote,
    OrderFlow,
    Series,
    Indicators,
    Narrative,
    ThemeMatch,
    Fundamentals,
    Synthesis,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Quote,
        Stage::OrderFlow,
        Stage::Series,
        Stage::Indicators,
        Stage::Narrative,
        Stage::ThemeMatch,
        Stage::Fundamentals,
        Stage::Synthesis,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Quote => "quote",
            Stage::OrderFlow => "order_flow",
            Stage::Series => "series",
            Stage::Indicators => "indicators",
            Stage::Narrative => "narrative",
            Stage::ThemeMatch => "theme_match",
            Stage::Fundamentals => "fundamentals",
            Stage::Synthesis => "synthesis",
        };
        f.write_str(s)
    }
}

/// One analysis call.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub subject: String,
    /// Display name; looked up from the quote when absent.
    pub subject_name: Option<String>,
    pub mode: AnalysisMode,
    /// Bypass every cache layer.
    pub force_refresh: bool,
}

impl AnalysisRequest {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            subject_name: None,
            mode: AnalysisMode::Full,
            force_refresh: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.subject_name = Some(name.into());
        self
    }

    pub fn with_mode(mut self, mode: AnalysisMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn lightweight(self) -> Self {
        self.with_mode(AnalysisMode::Lightweight)
    }

    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }
}

/// Direction of institutional participation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowTrend {
    BothBuying,
    ForeignBuying,
    InstitutionBuying,
    BothSelling,
    Mixed,
    NoData,
}

impl FlowTrend {
    /// Classifies foreign and institution net quantities.
    pub fn classify(foreign_net: i64, institution_net: i64) -> Self {
        if foreign_net > 0 && institution_net > 0 {
            FlowTrend::BothBuying
        } else if foreign_net > 0 {
            FlowTrend::ForeignBuying
        } else if institution_net > 0 {
            FlowTrend::InstitutionBuying
        } else if foreign_net < 0 && institution_net < 0 {
            FlowTrend::BothSelling
        } else {
            FlowTrend::Mixed
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FlowTrend::BothBuying => "foreign and institution buying",
            FlowTrend::ForeignBuying => "foreign buying",
            FlowTrend::InstitutionBuying => "institution buying",
            FlowTrend::BothSelling => "foreign and institution selling",
            FlowTrend::Mixed => "mixed",
            FlowTrend::NoData => "no data",
        }
    }
}

/// Order flow with its derived trend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderFlowSummary {
    pub flow: OrderFlow,
    pub foreign_net: i64,
    pub institution_net: i64,
    pub trend: FlowTrend,
}

impl OrderFlowSummary {
    pub fn from_flow(flow: OrderFlow) -> Self {
        let foreign_net = flow.net(InvestorClass::Foreign);
        let institution_net = flow.net(InvestorClass::Institution);
        Self {
            trend: FlowTrend::classify(foreign_net, institution_net),
            flow,
            foreign_net,
            institution_net,
        }
    }

    /// Zeroed summary used when order flow is unavailable.
    pub fn no_data() -> Self {
        Self {
            flow: OrderFlow::default(),
            foreign_net: 0,
            institution_net: 0,
            trend: FlowTrend::NoData,
        }
    }
}

/// Sentiment attached to a narrative digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    /// Maps a free-form label to a sentiment; unknown labels are neutral.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "positive" | "bullish" | "buy" | "strong buy" => Sentiment::Positive,
            "negative" | "bearish" | "sell" | "strong sell" => Sentiment::Negative,
            _ => Sentiment::Neutral,
        }
    }
}

/// Summarized narrative, as cached under `(subject, news)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeDigest {
    pub summary: String,
    pub sentiment: Sentiment,
    /// Composed narrative text the digest was built from.
    pub sources: String,
}

impl NarrativeDigest {
    pub fn unavailable() -> Self {
        Self {
            summary: "narrative analysis unavailable".to_string(),
            sentiment: Sentiment::Neutral,
            sources: String::new(),
        }
    }
}

/// Narrative stage output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NarrativeReport {
    pub digest: NarrativeDigest,
    pub cache: CacheLookup,
}

/// Theme match stage output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThemeReport {
    pub matches: Vec<MatchResult>,
    /// Top matches rendered as `name(+x.xx%)`, or `no theme data`.
    pub summary: String,
}

/// Synthesis stage output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlookReport {
    pub synthesis: Synthesis,
    pub cache: CacheLookup,
}

/// Default synthesis used when the engine fails.
pub fn neutral_outlook() -> Synthesis {
    Synthesis {
        recommendation: "neutral".to_string(),
        confidence: 0,
        rationale: "outlook unavailable".to_string(),
        price_levels: Default::default(),
    }
}

/// A stage that fell back to its default.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub reason: String,
}

/// Composite result for one subject.
///
/// Fields for stages skipped by the mode are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub subject: String,
    pub name: String,
    pub mode: AnalysisMode,
    pub quote: Option<Quote>,
    pub order_flow: OrderFlowSummary,
    pub series: Vec<Ohlcv>,
    pub indicators: TechnicalIndicators,
    pub narrative: Option<NarrativeReport>,
    pub themes: Option<ThemeReport>,
    pub fundamentals: Fundamentals,
    pub outlook: Option<OutlookReport>,
    /// Stages that ran, in order.
    pub stages: Vec<Stage>,
    /// Stages that substituted a default.
    pub degraded: Vec<StageFailure>,
}

impl AnalysisReport {
    pub fn is_degraded(&self, stage: Stage) -> bool {
        self.degraded.iter().any(|f| f.stage == stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_trend_classification() {
        assert_eq!(FlowTrend::classify(10, 5), FlowTrend::BothBuying);
        assert_eq!(FlowTrend::classify(10, -5), FlowTrend::ForeignBuying);
        assert_eq!(FlowTrend::classify(0, 5), FlowTrend::InstitutionBuying);
        assert_eq!(FlowTrend::classify(-1, -1), FlowTrend::BothSelling);
        assert_eq!(FlowTrend::classify(-1, 0), FlowTrend::Mixed);
        assert_eq!(FlowTrend::classify(0, 0), FlowTrend::Mixed);
    }

    #[test]
    fn test_order_flow_summary() {
        let mut flow = OrderFlow::default();
        flow.net_by_class.insert(InvestorClass::Foreign, 300);
        flow.net_by_class.insert(InvestorClass::Institution, -200);

        let summary = OrderFlowSummary::from_flow(flow);
        assert_eq!(summary.foreign_net, 300);
        assert_eq!(summary.trend, FlowTrend::ForeignBuying);
        assert_eq!(OrderFlowSummary::no_data().trend.label(), "no data");
    }

    #[test]
    fn test_lightweight_mode_stages() {
        let run: Vec<_> = Stage::ALL
            .into_iter()
            .filter(|s| AnalysisMode::Lightweight.includes(*s))
            .collect();
        assert_eq!(
            run,
            vec![
                Stage::Quote,
                Stage::OrderFlow,
                Stage::Series,
                Stage::Indicators,
                Stage::Fundamentals
            ]
        );
        assert!(Stage::ALL.iter().all(|s| AnalysisMode::Full.includes(*s)));
    }

    #[test]
    fn test_sentiment_from_label() {
        assert_eq!(Sentiment::from_label(" Bullish "), Sentiment::Positive);
        assert_eq!(Sentiment::from_label("sell"), Sentiment::Negative);
        assert_eq!(Sentiment::from_label("hold"), Sentiment::Neutral);
    }
}
