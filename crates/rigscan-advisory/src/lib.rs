//! rigscan-advisory - qualitative commentary on inspection results
//!
//! Numbers are computed by the pipeline; advisors only add prose. Every
//! advisor implements [`InsightGenerator`]; the pipeline never lets an
//! advisory failure reach the run's error list.

pub mod fallback;
pub mod local;
pub mod prompt;
pub mod provider;
pub mod remote;

pub use fallback::FallbackAdvisor;
pub use local::LocalAdvisor;
pub use provider::{AdvisoryError, AdvisoryResult, InsightGenerator, SummaryContext};
pub use remote::{RemoteAdvisor, DEFAULT_BASE_URL, DEFAULT_MODEL};
