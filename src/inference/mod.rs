//! Relationship inference: column filtering, name-based FK detection and
//! sampled value matching.

pub mod filter;
pub mod name;
pub mod value;

pub use filter::{filter_entity_candidates, ColumnClassification, FilterOutcome};
pub use name::{NameInferenceTask, TableLookup};
pub use value::{compute_match_rate, is_joinable, ValueMatchTask};
