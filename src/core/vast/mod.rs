pub mod builder;
pub mod model;
pub mod parser;

pub use builder::generate;
pub use model::{
    InlineAd, MediaFile, TrackingEvent, VastAd, VastDocument, VastVersion, WrapperAd,
};
pub use parser::{WrapperFetcher, parse, unwrap_wrappers};

/// Conventional wrapper chase limit; a chain deeper than this is
/// assumed circular or abusive
pub const MAX_WRAPPER_DEPTH: usize = 5;
