pub mod config;
pub mod diff;
pub mod error;
pub mod fuzzy_matcher;
pub mod load;
pub mod mapping;
pub mod metadata;
pub mod record;
pub mod report;
pub mod salesforce;
pub mod sit;
pub mod source;
pub mod transform;
pub mod validation;

// Re-export commonly used types
pub use error::{MigrationError, Result};
pub use record::Record;
pub use transform::MigrationObject;
