//! In-process caching for LLM responses.

mod response_cache;

pub use response_cache::ResponseCache;
