mod validate_setuid;
pub use validate_setuid::ValidateSetuidTask;

mod store_uid;
pub use store_uid::StoreUidTask;
