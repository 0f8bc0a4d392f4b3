pub mod dedup;

pub use dedup::DedupCache;
