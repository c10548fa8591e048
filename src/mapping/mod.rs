//! Oracle column → Salesforce field mapping discovery
//!
//! Every column of a CO table is scored against every createable field of
//! the target object on name similarity, type compatibility, the pattern its
//! sampled values follow and a small synonym vocabulary. The best candidates
//! are kept and duplicate claims on one field are settled in favour of the
//! strongest column.

pub mod mapper;
pub mod patterns;
pub mod score;
pub mod synonyms;

pub use mapper::{
    Candidate, ColumnMapping, FieldMapper, MappingReport, MappingRow, MappingStatus, DEFAULT_THRESHOLD,
    MAX_CANDIDATES,
};
pub use patterns::{detect_pattern, ValuePattern};
pub use score::{dtype_match, name_similarity, pattern_bonus, synonym_bonus, ScoreBreakdown};
