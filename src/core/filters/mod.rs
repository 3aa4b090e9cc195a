pub mod ivt;

pub use ivt::{IvtConfig, IvtFilter, IvtVerdict};
