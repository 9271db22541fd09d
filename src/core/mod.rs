//! Service infrastructure shared by the REST handlers.

pub mod cache;
pub mod context;
pub mod extract;
pub mod password;
pub mod pkce;
pub mod response;
pub mod schedule;

pub use cache::{CacheStats, TtlCache};
pub use context::{ServiceContext, TokenPair, cache_keys};
pub use extract::{JsonBody, PathParam, QueryParams, nullable};
pub use response::{ApiResponse, Pagination};
pub use signage_core::{AuthInfo, JwtValidator, TokenGenerator};
