pub mod client;
pub mod encoding;

pub use client::{CalloutError, CalloutResult, Dispatch, HttpDispatcher};
