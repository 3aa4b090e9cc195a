//! Minimal TCF v2 consent-string parser: the core segment fields up
//! to and including the vendor-consent section, which is all the gate
//! needs to answer "does vendor N have consent". Anything malformed
//! is an error - the caller fails closed.

use anyhow::{Error, anyhow, bail};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::collections::HashSet;

struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read(&mut self, bits: usize) -> Result<u64, Error> {
        if bits > 64 {
            bail!("Bit read too wide: {}", bits);
        }

        let mut out: u64 = 0;

        for _ in 0..bits {
            let byte = self
                .data
                .get(self.pos / 8)
                .ok_or_else(|| anyhow!("Consent string truncated at bit {}", self.pos))?;

            let bit = (byte >> (7 - (self.pos % 8))) & 1;
            out = (out << 1) | bit as u64;
            self.pos += 1;
        }

        Ok(out)
    }

    fn skip(&mut self, bits: usize) -> Result<(), Error> {
        let end = self.pos + bits;
        if end > self.data.len() * 8 {
            bail!("Consent string truncated while skipping {} bits", bits);
        }
        self.pos = end;
        Ok(())
    }
}

/// Decoded subset of a TCF v2 consent string
#[derive(Debug, Clone)]
pub struct TcfConsent {
    pub version: u8,
    pub vendor_list_version: u16,
    /// Purposes 1..=24 consent bitmask, purpose 1 in the high bit
    purposes: u32,
    consented_vendors: HashSet<u16>,
}

impl TcfConsent {
    /// Parses the core segment of a consent string. Segments after the
    /// first dot (disclosed vendors, publisher TC) are ignored.
    pub fn parse(consent: &str) -> Result<TcfConsent, Error> {
        let core = consent.split('.').next().unwrap_or_default();
        if core.is_empty() {
            bail!("Empty consent string");
        }

        let bytes = URL_SAFE_NO_PAD
            .decode(core)
            .map_err(|e| anyhow!("Consent string is not base64url: {}", e))?;

        let mut reader = BitReader::new(&bytes);

        let version = reader.read(6)? as u8;
        if version != 2 {
            bail!("Unsupported TCF version {}", version);
        }

        reader.skip(36)?; // created
        reader.skip(36)?; // last updated
        reader.skip(12)?; // cmp id
        reader.skip(12)?; // cmp version
        reader.skip(6)?; // consent screen
        reader.skip(12)?; // consent language
        let vendor_list_version = reader.read(12)? as u16;
        reader.skip(6)?; // tcf policy version
        reader.skip(1)?; // is service specific
        reader.skip(1)?; // use non-standard stacks
        reader.skip(12)?; // special feature opt-ins
        let purposes = reader.read(24)? as u32;
        reader.skip(24)?; // purposes li transparency
        reader.skip(1)?; // purpose one treatment
        reader.skip(12)?; // publisher cc

        let consented_vendors = read_vendor_section(&mut reader)?;

        Ok(TcfConsent {
            version,
            vendor_list_version,
            purposes,
            consented_vendors,
        })
    }

    /// Whether the given GVL vendor id carries the consent bit
    pub fn vendor_consent(&self, gvl_id: u16) -> bool {
        self.consented_vendors.contains(&gvl_id)
    }

    /// Purpose consent for purposes 1..=24
    pub fn purpose_consent(&self, purpose: u8) -> bool {
        if purpose == 0 || purpose > 24 {
            return false;
        }

        (self.purposes >> (24 - purpose)) & 1 == 1
    }
}

fn read_vendor_section(reader: &mut BitReader) -> Result<HashSet<u16>, Error> {
    let max_vendor_id = reader.read(16)? as u16;
    let is_range = reader.read(1)? == 1;

    let mut vendors = HashSet::new();

    if !is_range {
        for id in 1..=max_vendor_id {
            if reader.read(1)? == 1 {
                vendors.insert(id);
            }
        }
        return Ok(vendors);
    }

    let num_entries = reader.read(12)? as usize;

    for _ in 0..num_entries {
        let is_a_range = reader.read(1)? == 1;
        let start = reader.read(16)? as u16;

        let end = if is_a_range {
            reader.read(16)? as u16
        } else {
            start
        };

        if end < start || end > max_vendor_id {
            bail!("Vendor range {}..{} out of bounds", start, end);
        }

        for id in start..=end {
            vendors.insert(id);
        }
    }

    Ok(vendors)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Assembles a syntactically valid v2 core segment with the given
    /// vendor-consent bitfield set
    fn build_consent(consented: &[u16], purposes: u32) -> String {
        let max_vendor = consented.iter().copied().max().unwrap_or(0);

        let mut bits: Vec<bool> = Vec::new();
        let mut push = |value: u64, width: usize| {
            for i in (0..width).rev() {
                bits.push((value >> i) & 1 == 1);
            }
        };

        push(2, 6); // version
        push(0, 36); // created
        push(0, 36); // last updated
        push(1, 12); // cmp id
        push(1, 12); // cmp version
        push(1, 6); // consent screen
        push(0, 12); // language
        push(48, 12); // vendor list version
        push(2, 6); // policy version
        push(1, 1); // service specific
        push(0, 1); // non-standard stacks
        push(0, 12); // special features
        push(purposes as u64, 24); // purposes consent
        push(0, 24); // purposes li
        push(0, 1); // purpose one treatment
        push(0, 12); // publisher cc

        push(max_vendor as u64, 16); // max vendor id
        push(0, 1); // bitfield encoding
        for id in 1..=max_vendor {
            bits.push(consented.contains(&id));
        }

        let mut bytes = vec![0u8; bits.len().div_ceil(8)];
        for (i, bit) in bits.iter().enumerate() {
            if *bit {
                bytes[i / 8] |= 1 << (7 - (i % 8));
            }
        }

        URL_SAFE_NO_PAD.encode(bytes)
    }

    #[test]
    fn reads_vendor_bitfield() {
        let consent = build_consent(&[3, 7, 12], 0);
        let parsed = TcfConsent::parse(&consent).unwrap();

        assert_eq!(parsed.version, 2);
        assert_eq!(parsed.vendor_list_version, 48);
        assert!(parsed.vendor_consent(3));
        assert!(parsed.vendor_consent(7));
        assert!(parsed.vendor_consent(12));
        assert!(!parsed.vendor_consent(4));
        assert!(!parsed.vendor_consent(13));
    }

    #[test]
    fn reads_purpose_bits() {
        // purpose 1 and purpose 3
        let purposes = (1 << 23) | (1 << 21);
        let consent = build_consent(&[1], purposes);
        let parsed = TcfConsent::parse(&consent).unwrap();

        assert!(parsed.purpose_consent(1));
        assert!(!parsed.purpose_consent(2));
        assert!(parsed.purpose_consent(3));
    }

    #[test]
    fn garbage_fails() {
        assert!(TcfConsent::parse("not-base64!!!").is_err());
        assert!(TcfConsent::parse("").is_err());
    }

    #[test]
    fn truncated_string_fails() {
        let consent = build_consent(&[30], 0);
        let cut = &consent[..consent.len() / 2];

        assert!(TcfConsent::parse(cut).is_err());
    }

    #[test]
    fn v1_strings_are_rejected() {
        // version field = 1
        let bytes = vec![0b0000_0100, 0, 0, 0];
        let consent = URL_SAFE_NO_PAD.encode(bytes);

        assert!(TcfConsent::parse(&consent).is_err());
    }
}
