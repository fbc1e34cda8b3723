//! Price cache

mod price_cache;

pub use price_cache::{CacheLookup, PriceCache, PriceCacheEntry};
