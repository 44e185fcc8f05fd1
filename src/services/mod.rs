//! Service layer: the typed tool surface the wire front-end marshals into

pub mod omnisearch;

pub use omnisearch::{
    ConfigReport, ConfigureRequest, OmnisearchService, PerformanceInsightsReport,
    ProviderHealthEntry, ProviderHealthReport, QueryAnalysisReport,
};
