//! Outbound HTTP: retrying single-request layer, pagination-aware
//! multi-page fetch, and the cache-aware origin fetcher.

pub mod client;
pub mod origin;
pub mod pagination;

pub use client::{FetchOptions, FetchedPages, PageResponse};
pub use origin::{OriginFetcher, RestDataSource};
pub use pagination::{Pagination, PaginationStrategy, ParamTranslation};
