pub mod gate;
pub mod scrub;
pub mod tcf;
pub mod usp;

pub use gate::{PrivacyConfig, PrivacyDirectives};
pub use tcf::TcfConsent;
pub use usp::UsPrivacy;
