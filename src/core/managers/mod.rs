pub mod publishers;
pub mod winstats;

pub use publishers::PublisherManager;
pub use winstats::WinStats;
