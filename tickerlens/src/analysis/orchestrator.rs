//! Composite report builder.
//!
//! ```text
//! Quote → OrderFlow → Series → Indicators → [Narrative] → [ThemeMatch] → Fundamentals → [Synthesis]
//! ```
//!
//! Bracketed stages only run in
//! [`AnalysisMode::Full`](super::AnalysisMode::Full). Every stage catches
//! its own failure and substitutes a default; the substitution policy for
//! all stages lives in this file.

use std::fmt::Write as _;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::types::{
    neutral_outlook, AnalysisReport, AnalysisRequest, NarrativeDigest, NarrativeReport,
    OrderFlowSummary, OutlookReport, Sentiment, Stage, StageFailure, ThemeReport,
};
use crate::cache::{
    normalize_subject, CacheKey, CachedResource, ResourceCacheManager, ResourceType,
    TwoLevelCache,
};
use crate::gateway::{
    Fundamentals, IndicatorEngine, MarketDataGateway, Ohlcv, OrderFlow, Quote, Synthesis,
    SynthesisEngine, SynthesisKind, SynthesisRequest, TechnicalIndicators, UpstreamError,
};
use crate::narrative::ParallelFetchOrchestrator;
use crate::themes::{MatchResult, ThemeCatalogCache};

/// Text used when a subject matches no theme.
pub const NO_THEME_DATA: &str = "no theme data";

/// Default number of theme matches in the summary line.
pub const DEFAULT_MAX_THEME_SUMMARY: usize = 3;

/// Tunables for [`AnalysisOrchestrator`].
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOptions {
    pub max_theme_summary: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            max_theme_summary: DEFAULT_MAX_THEME_SUMMARY,
        }
    }
}

/// Everything the orchestrator calls out to.
///
/// Caches are shared handles; the orchestrator never creates its own.
pub struct AnalysisDeps {
    pub market: Arc<dyn MarketDataGateway>,
    pub indicators: Arc<dyn IndicatorEngine>,
    pub narrative: ParallelFetchOrchestrator,
    pub synthesis: Arc<dyn SynthesisEngine>,
    pub catalog: Arc<ThemeCatalogCache>,
    pub cache: Arc<TwoLevelCache>,
    pub resources: Arc<ResourceCacheManager>,
}

/// Builds [`AnalysisReport`]s.
pub struct AnalysisOrchestrator {
    deps: AnalysisDeps,
    options: AnalysisOptions,
}

impl AnalysisOrchestrator {
    pub fn new(deps: AnalysisDeps, options: AnalysisOptions) -> Self {
        Self { deps, options }
    }

    pub fn resources(&self) -> &ResourceCacheManager {
        &self.deps.resources
    }

    /// Runs the pipeline for one subject. Never fails: each stage that
    /// cannot complete is recorded in `degraded` and replaced by its
    /// default.
    pub async fn analyze(&self, request: AnalysisRequest) -> AnalysisReport {
        let start = Instant::now();
        let subject = normalize_subject(&request.subject);
        let force = request.force_refresh;
        let mode = request.mode;
        let mut run = StageLog::default();

        // Quote: always live.
        run.enter(Stage::Quote);
        let quote = match self.deps.market.get_quote(&subject).await {
            Ok(Some(q)) => Some(q),
            Ok(None) => {
                run.degrade(Stage::Quote, "no data");
                None
            }
            Err(e) => {
                run.fail(Stage::Quote, &subject, &e);
                None
            }
        };
        let name = request
            .subject_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| quote.as_ref().map(|q| q.name.clone()))
            .unwrap_or_else(|| subject.clone());

        // Order flow
        run.enter(Stage::OrderFlow);
        let order_flow = self
            .cached_fetch::<OrderFlow, _>(&subject, force, Stage::OrderFlow, &mut run, async {
                self.deps.market.get_order_flow(&subject).await.map(Some)
            })
            .await
            .map(OrderFlowSummary::from_flow)
            .unwrap_or_else(OrderFlowSummary::no_data);

        // Daily series, ascending by date
        run.enter(Stage::Series);
        let series = self
            .cached_fetch::<Arc<Vec<Ohlcv>>, _>(&subject, force, Stage::Series, &mut run, async {
                self.deps.market.get_daily_series(&subject).await.map(|series| {
                    series.map(|mut bars| {
                        bars.sort_by_key(|b| b.date);
                        Arc::new(bars)
                    })
                })
            })
            .await
            .unwrap_or_default();

        // Indicators
        run.enter(Stage::Indicators);
        let indicators = if series.is_empty() {
            run.degrade(Stage::Indicators, "no series");
            TechnicalIndicators::default()
        } else {
            match self.deps.indicators.calculate(&series) {
                Ok(ind) => ind,
                Err(e) => {
                    run.fail(Stage::Indicators, &subject, &e);
                    TechnicalIndicators::default()
                }
            }
        };

        // Narrative
        let narrative = if mode.includes(Stage::Narrative) {
            run.enter(Stage::Narrative);
            Some(self.narrative(&subject, &name, force, &mut run).await)
        } else {
            None
        };

        // Theme match
        let themes = if mode.includes(Stage::ThemeMatch) {
            run.enter(Stage::ThemeMatch);
            Some(self.theme_match(&subject, &name).await)
        } else {
            None
        };

        // Fundamentals
        run.enter(Stage::Fundamentals);
        let fundamentals = self
            .cached_fetch::<Fundamentals, _>(&subject, force, Stage::Fundamentals, &mut run, async {
                self.deps.market.get_fundamentals(&subject).await.map(Some)
            })
            .await
            .unwrap_or_default();

        // Synthesis
        let outlook = if mode.includes(Stage::Synthesis) {
            run.enter(Stage::Synthesis);
            let context = OutlookContext {
                subject: &subject,
                name: &name,
                quote: quote.as_ref(),
                order_flow: &order_flow,
                indicators: &indicators,
                narrative: narrative.as_ref().map(|n| &n.digest),
                themes: themes.as_ref(),
                fundamentals: &fundamentals,
            };
            Some(self.outlook(&context, force, &mut run).await)
        } else {
            None
        };

        info!(
            subject = %subject,
            mode = ?mode,
            force_refresh = force,
            degraded = run.degraded.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "analysis complete"
        );

        AnalysisReport {
            subject,
            name,
            mode,
            quote,
            order_flow,
            series: series.to_vec(),
            indicators,
            narrative,
            themes,
            fundamentals,
            outlook,
            stages: run.stages,
            degraded: run.degraded,
        }
    }

    /// Resource-cache wrapper around one upstream call.
    ///
    /// Skips the cache read on `force` but always stores a fresh value.
    async fn cached_fetch<T, F>(
        &self,
        subject: &str,
        force: bool,
        stage: Stage,
        run: &mut StageLog,
        fetch: F,
    ) -> Option<T>
    where
        T: CachedResource + Clone,
        F: Future<Output = Result<Option<T>, UpstreamError>>,
    {
        if !force {
            if let Some(value) = self.deps.resources.get_typed::<T>(subject) {
                debug!(subject, stage = %stage, "resource cache hit");
                return Some(value);
            }
        }

        match fetch.await {
            Ok(Some(value)) => {
                self.deps.resources.set_typed(subject, value.clone());
                Some(value)
            }
            Ok(None) => {
                run.degrade(stage, "no data");
                None
            }
            Err(e) => {
                run.fail(stage, subject, &e);
                None
            }
        }
    }

    async fn narrative(
        &self,
        subject: &str,
        name: &str,
        force: bool,
        run: &mut StageLog,
    ) -> NarrativeReport {
        let key = CacheKey::new(subject, ResourceType::News);
        let (cached, lookup) = self.deps.cache.load::<NarrativeDigest>(&key, force);
        if let Some(digest) = cached {
            return NarrativeReport {
                digest,
                cache: lookup,
            };
        }

        let composed = self.deps.narrative.fetch(name).await;
        if !composed.has_text() {
            run.degrade(Stage::Narrative, "no narrative text");
            return NarrativeReport {
                digest: NarrativeDigest::unavailable(),
                cache: lookup,
            };
        }

        let request = SynthesisRequest {
            kind: SynthesisKind::News,
            subject: subject.to_string(),
            subject_name: name.to_string(),
            context: composed.context(),
        };
        let digest = match self.deps.synthesis.generate(request).await {
            Ok(synthesis) => {
                let digest = NarrativeDigest {
                    sentiment: Sentiment::from_label(&synthesis.recommendation),
                    summary: synthesis.rationale,
                    sources: composed.context(),
                };
                self.deps.cache.save(&key, &digest);
                digest
            }
            Err(e) => {
                run.fail(Stage::Narrative, subject, &e);
                NarrativeDigest::unavailable()
            }
        };

        NarrativeReport {
            digest,
            cache: lookup,
        }
    }

    /// Matches against the catalog as it stands. `force_refresh` does not
    /// reach here: a catalog rebuild crawls every theme one call at a time
    /// and only runs through [`ThemeCatalogCache::refresh`] or when the
    /// snapshot is stale.
    async fn theme_match(&self, subject: &str, name: &str) -> ThemeReport {
        let mut matches = self.deps.catalog.find(name).await;
        if matches.is_empty() && name != subject {
            matches = self.deps.catalog.find(subject).await;
        }
        let summary = render_theme_summary(&matches, self.options.max_theme_summary);
        debug!(subject, matches = matches.len(), summary = %summary, "theme match");
        ThemeReport { matches, summary }
    }

    async fn outlook(
        &self,
        context: &OutlookContext<'_>,
        force: bool,
        run: &mut StageLog,
    ) -> OutlookReport {
        let key = CacheKey::new(context.subject, ResourceType::Outlook);
        let (cached, lookup) = self.deps.cache.load::<Synthesis>(&key, force);
        if let Some(synthesis) = cached {
            return OutlookReport {
                synthesis,
                cache: lookup,
            };
        }

        let request = SynthesisRequest {
            kind: SynthesisKind::Outlook,
            subject: context.subject.to_string(),
            subject_name: context.name.to_string(),
            context: context.render(),
        };
        let synthesis = match self.deps.synthesis.generate(request).await {
            Ok(synthesis) => {
                self.deps.cache.save(&key, &synthesis);
                synthesis
            }
            Err(e) => {
                run.fail(Stage::Synthesis, context.subject, &e);
                neutral_outlook()
            }
        };

        OutlookReport {
            synthesis,
            cache: lookup,
        }
    }
}

/// Renders up to `max` matches as `name(+x.xx%)` joined by `, `.
pub fn render_theme_summary(matches: &[MatchResult], max: usize) -> String {
    if matches.is_empty() || max == 0 {
        return NO_THEME_DATA.to_string();
    }
    matches
        .iter()
        .take(max)
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Inputs gathered for the outlook synthesis.
struct OutlookContext<'a> {
    subject: &'a str,
    name: &'a str,
    quote: Option<&'a Quote>,
    order_flow: &'a OrderFlowSummary,
    indicators: &'a TechnicalIndicators,
    narrative: Option<&'a NarrativeDigest>,
    themes: Option<&'a ThemeReport>,
    fundamentals: &'a Fundamentals,
}

impl OutlookContext<'_> {
    fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "subject: {} ({})", self.name, self.subject);
        match self.quote {
            Some(q) => {
                let _ = writeln!(
                    out,
                    "price: {} ({:+} / {:+.2}%)",
                    q.price, q.change, q.change_rate
                );
            }
            None => {
                let _ = writeln!(out, "price: unavailable");
            }
        }
        let _ = writeln!(
            out,
            "order flow: foreign {} / institution {} ({})",
            self.order_flow.foreign_net,
            self.order_flow.institution_net,
            self.order_flow.trend.label()
        );
        let ind = self.indicators;
        let _ = writeln!(
            out,
            "indicators: rsi {:.1} ({}), macd {:.2} ({}), ma {}",
            ind.rsi, ind.rsi_signal, ind.macd, ind.macd_signal, ind.ma_signal
        );
        if let Some(n) = self.narrative {
            let _ = writeln!(out, "narrative: {:?} {}", n.sentiment, n.summary);
        }
        if let Some(t) = self.themes {
            let _ = writeln!(out, "themes: {}", t.summary);
        }
        let f = self.fundamentals;
        let _ = writeln!(
            out,
            "fundamentals: per {} pbr {} roe {}",
            fmt_opt(f.per),
            fmt_opt(f.pbr),
            fmt_opt(f.roe)
        );
        out
    }
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{:.2}", x)).unwrap_or_else(|| "n/a".to_string())
}

/// Stages run and defaults substituted during one analysis.
#[derive(Default)]
struct StageLog {
    stages: Vec<Stage>,
    degraded: Vec<StageFailure>,
}

impl StageLog {
    fn enter(&mut self, stage: Stage) {
        self.stages.push(stage);
    }

    fn degrade(&mut self, stage: Stage, reason: &str) {
        debug!(stage = %stage, reason, "stage using default");
        self.degraded.push(StageFailure {
            stage,
            reason: reason.to_string(),
        });
    }

    fn fail(&mut self, stage: Stage, subject: &str, error: &UpstreamError) {
        warn!(stage = %stage, subject, error = %error, "stage failed, using default");
        self.degraded.push(StageFailure {
            stage,
            reason: error.to_string(),
        });
    }
}
