//! weft — a specification-driven API aggregation runtime.
//!
//! A client submits a declarative endpoint specification describing one or
//! more upstream REST calls, argument wiring between those calls, pagination
//! strategy, and a chain of field-level transformations. The runtime plans
//! the calls, fetches them through a revalidating origin cache, applies the
//! transformations, encodes the result, and memoizes the encoded artifact in
//! a response cache keyed by the specification's fingerprint.
//!
//! ```no_run
//! use weft::{Executor, Settings};
//!
//! # async fn example(spec_string: &str) -> Result<(), weft::Error> {
//! let executor = Executor::new(Settings::default()).await?;
//! let response = executor.get_endpoint_data(spec_string).await;
//! assert!(response.is_ok());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod executor;
pub mod http;
pub mod logging;
pub mod serialize;
pub mod spec;
pub mod stats;
pub mod transform;

pub use config::Settings;
pub use error::{Error, ErrorKind};
pub use executor::{Executor, ResponseStatus, ServiceResponse};
pub use serialize::{Encoding, Payload, Serializer};
pub use spec::planner::Planner;
pub use spec::EndpointSpec;
