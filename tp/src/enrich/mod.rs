//! Enrichment fallback: destination context when no live source answers

mod catalog;
mod fetcher;
mod source;

pub use catalog::{CatalogError, Destination, DestinationCatalog, FallbackSource, SourceSelection};
pub use fetcher::{Enrichment, EnrichmentFetcher, SourceContent};
pub use source::{ContentSource, FetchError, HttpContentSource};

#[cfg(test)]
pub(crate) use source::mock;
