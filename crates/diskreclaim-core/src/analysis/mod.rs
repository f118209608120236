/// Analysis modules: classification, age filtering and duplicate detection.

pub mod age;
pub mod category;
pub mod duplicates;

pub use category::{categorise_extension, classify, summarise_categories, Category, CategoryStats};
pub use duplicates::{find_duplicates, DedupOptions, DedupOutcome, DuplicateFile, DuplicateGroup, Fingerprint};
