mod stop_server;
pub use stop_server::StopServerTask;

mod flush_events;
pub use flush_events::FlushEventsTask;
