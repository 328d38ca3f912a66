//! Collaborator contracts.
//!
//! All async methods return boxed futures so the traits stay dyn-compatible
//! and collaborators can be held as `Arc<dyn Trait>`.

use std::future::Future;
use std::pin::Pin;

use super::error::UpstreamError;
use super::types::{
    Fundamentals, Ohlcv, OrderFlow, Quote, Synthesis, SynthesisRequest, TechnicalIndicators,
};

/// Boxed future type for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Market data provider.
///
/// Implementations handle their own authentication and retry. `Ok(None)`
/// means the upstream answered but had nothing for the subject.
pub trait MarketDataGateway: Send + Sync {
    fn get_quote<'a>(&'a self, subject: &'a str) -> BoxFuture<'a, Result<Option<Quote>, UpstreamError>>;

    fn get_daily_series<'a>(
        &'a self,
        subject: &'a str,
    ) -> BoxFuture<'a, Result<Option<Vec<Ohlcv>>, UpstreamError>>;

    fn get_order_flow<'a>(&'a self, subject: &'a str) -> BoxFuture<'a, Result<OrderFlow, UpstreamError>>;

    fn get_fundamentals<'a>(
        &'a self,
        subject: &'a str,
    ) -> BoxFuture<'a, Result<Fundamentals, UpstreamError>>;
}

/// Source of free-form narrative text about a subject.
pub trait NarrativeSource: Send + Sync {
    /// Short label used in composed output.
    fn name(&self) -> &str;

    fn fetch<'a>(&'a self, subject_name: &'a str) -> BoxFuture<'a, Result<Option<String>, UpstreamError>>;
}

/// Produces recommendations from structured context.
pub trait SynthesisEngine: Send + Sync {
    fn generate(&self, request: SynthesisRequest) -> BoxFuture<'_, Result<Synthesis, UpstreamError>>;
}

/// Computes technical indicators from an ascending daily series.
pub trait IndicatorEngine: Send + Sync {
    fn calculate(&self, series: &[Ohlcv]) -> Result<TechnicalIndicators, UpstreamError>;
}
