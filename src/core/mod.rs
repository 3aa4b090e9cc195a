pub mod adapters;
pub mod auth;
pub mod breaker;
pub mod demand;
pub mod economics;
pub mod enrichment;
pub mod events;
pub mod filters;
pub mod managers;
pub mod metrics;
pub mod models;
pub mod observability;
pub mod ortb;
pub mod pipeline;
pub mod privacy;
pub mod ratelimit;
pub mod spec;
pub mod usersync;
pub mod validation;
pub mod vast;
