//! Per-subject composite analysis.
//!
//! [`AnalysisOrchestrator`] runs a fixed sequence of stages against the
//! market gateway, narrative sources, theme catalog and synthesis engine,
//! substituting a default for every stage that fails.

mod orchestrator;
mod types;

pub use orchestrator::{
    render_theme_summary, AnalysisDeps, AnalysisOptions, AnalysisOrchestrator,
    DEFAULT_MAX_THEME_SUMMARY, NO_THEME_DATA,
};
pub use types::{
    neutral_outlook, AnalysisMode, AnalysisReport, AnalysisRequest, FlowTrend, NarrativeDigest,
    NarrativeReport, OrderFlowSummary, OutlookReport, Sentiment, Stage, StageFailure, ThemeReport,
};
