pub mod checksum;
pub mod classifier;
pub mod diff;
pub mod types;
