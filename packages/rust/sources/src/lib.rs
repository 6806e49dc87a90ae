//! External data sources for Dossier.
//!
//! This crate provides:
//! - [`SourceAdapter`]: the lookup contract every source implements
//! - [`SanctionsAdapter`]: fuzzy name search against a sanctions/watchlist API
//! - [`DorkSearchAdapter`]: birth-data phrase searches on the open web
//! - [`search`]: the web search seam ([`SearchEngine`], [`HtmlSearchEngine`])

pub mod adapters;
pub mod search;

pub use adapters::{
    BIRTH_DATA_PHRASES, DorkSearchAdapter, LookupError, SanctionsAdapter, SourceAdapter,
    dork_queries, map_sanctions_response,
};
pub use search::{HtmlSearchEngine, SearchEngine};
