/// A prefix added to every first-party ID we mint, so we can validate
/// our own IDs and catch partners echoing foreign IDs back at us
pub const CONST_ARX_FPID_PREFIX: &str = "ax-";

/// Cookie name carrying the first-party exchange ID
pub const CONST_ARX_FPID_COOKIE: &str = "axid";

/// Cookie name marking a user who opted out of syncing entirely
pub const CONST_ARX_OPTOUT_COOKIE: &str = "ax_optout";

/// Macro placeholder in partner sync urls which we replace with the
/// local first-party ID
pub const CONST_ARX_FPID_MACRO: &str = "{AXID}";
