//! Token metadata resolution

pub mod error;
pub mod fetch;
pub mod resolver;
pub mod uri;

pub use error::{ResolutionError, ResolutionErrorKind};
pub use fetch::{FetchError, FetchResponse, HttpFetcher, ReqwestFetcher};
pub use resolver::{MetadataResolver, ResolutionBatch};
pub use uri::TokenUri;
