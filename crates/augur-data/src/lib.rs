pub mod cache;
pub mod error;
pub mod health;
pub mod provider;
pub mod rate_limit;
pub mod resolver;
pub mod verifier;

pub use cache::{CacheLayer, CacheLookup, CacheState};
pub use error::DataError;
pub use health::HealthTracker;
pub use provider::{ComprehensiveData, DataProvider, DataQualitySummary};
pub use rate_limit::RateLimitedQueue;
pub use resolver::{SourceFallbackResolver, SourceFetcher, DEFAULT_API_FAMILY};
pub use verifier::{CrossSourceVerifier, VerificationResult};
