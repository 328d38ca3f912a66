//! External collaborator contracts and payload types.
//!
//! Nothing in this module talks to the network. Concrete brokerage clients,
//! scrapers, and text-generation backends live outside the crate and plug in
//! through these traits.

mod error;
mod traits;
mod types;

pub use error::UpstreamError;
pub use traits::{BoxFuture, IndicatorEngine, MarketDataGateway, NarrativeSource, SynthesisEngine};
pub use types::{
    Fundamentals, InvestorClass, Ohlcv, OrderFlow, PriceLevels, Quote, Synthesis, SynthesisKind,
    SynthesisRequest, TechnicalIndicators,
};
