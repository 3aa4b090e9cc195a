mod config_load;
pub use config_load::ConfigLoadTask;

mod observability;
pub use observability::ConfigureObservabilityTask;

mod device_load;
pub use device_load::DeviceLookupLoadTask;

mod geoip_load;
pub use geoip_load::GeoLookupLoadTask;

mod adapters_load;
pub use adapters_load::AdaptersLoadTask;

mod pubs_load;
pub use pubs_load::PubsLoadTask;

mod services_init;
pub use services_init::ServicesInitTask;

mod sync_store_init;
pub use sync_store_init::SyncStoreInitTask;

mod recorder_start;
pub use recorder_start::RecorderStartTask;

mod rtb_pipeline;
pub use rtb_pipeline::BuildRtbPipelineTask;

mod sync_pipelines;
pub use sync_pipelines::BuildSyncPipelinesTask;

mod event_pipeline;
pub use event_pipeline::BuildWinEventPipelineTask;

mod start_server;
pub use start_server::StartServerTask;
