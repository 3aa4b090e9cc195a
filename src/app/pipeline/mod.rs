pub mod events;
pub mod ortb;
pub mod syncing;
