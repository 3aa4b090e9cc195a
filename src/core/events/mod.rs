pub mod dataurl;
pub mod model;
pub mod recorder;
pub mod sinks;

pub use dataurl::DataUrl;
pub use model::{AuctionRecord, BidderOutcomeRecord, EventRecord, WinEvent, WinnerRecord};
pub use recorder::{EventRecorder, RecorderConfig};
pub use sinks::{AnalyticsSink, LogSink, MemorySink, SinkMultiplexer};
