use crate::core::usersync::constants;
use uuid::Uuid;

/// Check the value carries our first-party prefix - partner callbacks
/// occasionally echo their own IDs into our parameter
pub fn validate_fpid(fpid: &str) -> bool {
    fpid.trim().starts_with(constants::CONST_ARX_FPID_PREFIX)
}

/// Mint a fresh first-party ID
pub fn generate_fpid() -> String {
    format!("{}{}", constants::CONST_ARX_FPID_PREFIX, Uuid::new_v4())
}

/// Substitute our fpid into a partner sync url's macro slot. The id
/// is percent-encoded - it lands in a query parameter.
pub fn fill_sync_url(template: &str, fpid: &str) -> String {
    template.replace(
        constants::CONST_ARX_FPID_MACRO,
        &urlencoding::encode(fpid),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fpid_validation() {
        assert!(validate_fpid(&generate_fpid()));
        assert!(validate_fpid(" ax-abc "));
        assert!(!validate_fpid("partner-uid-123"));
    }

    #[test]
    fn sync_url_substitution_encodes() {
        let url = fill_sync_url("https://dsp.example/sync?xid={AXID}", "ax-a/b");
        assert_eq!(url, "https://dsp.example/sync?xid=ax-a%2Fb");
    }
}
