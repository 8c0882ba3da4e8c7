//! Interfaces to the engine's external collaborators: the transactional store,
//! the listing cache, and the currency rate source. Exact backends are out of
//! scope; the engine is implemented entirely against these traits.

mod cache;
mod rate_source;
mod storage;

pub use cache::{CacheError, ListingCache};
pub use rate_source::{RateSource, RateSourceError, RateTable};
pub use storage::{
    CommitStore,
    FulfillmentChange,
    MarketReads,
    StorageError,
};
