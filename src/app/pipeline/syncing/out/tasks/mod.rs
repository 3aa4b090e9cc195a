mod extract_fpid;
pub use extract_fpid::ExtractFpidTask;

mod parse_consent;
pub use parse_consent::ParseSyncConsentTask;

mod build_response;
pub use build_response::BuildSyncResponseTask;
