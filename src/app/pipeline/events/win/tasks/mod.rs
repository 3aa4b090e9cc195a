mod extract_event;
pub use extract_event::ExtractWinEventTask;

mod record_win;
pub use record_win::RecordWinTask;
