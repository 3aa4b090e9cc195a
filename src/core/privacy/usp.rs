//! US-Privacy (CCPA) string handling, the four-character
//! `<version><notice><opt-out><lspa>` form

use anyhow::{Error, bail};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsPrivacy {
    pub version: u8,
    pub notice: char,
    pub opt_out_sale: char,
    pub lspa: char,
}

impl UsPrivacy {
    pub fn parse(raw: &str) -> Result<UsPrivacy, Error> {
        let chars: Vec<char> = raw.trim().chars().collect();

        if chars.len() != 4 {
            bail!("US-Privacy string must be 4 chars, got {:?}", raw);
        }

        let version = match chars[0].to_digit(10) {
            Some(v) if v >= 1 => v as u8,
            _ => bail!("Invalid US-Privacy version char {:?}", chars[0]),
        };

        for c in &chars[1..] {
            if !matches!(c.to_ascii_uppercase(), 'Y' | 'N' | '-') {
                bail!("Invalid US-Privacy flag char {:?}", c);
            }
        }

        Ok(UsPrivacy {
            version,
            notice: chars[1].to_ascii_uppercase(),
            opt_out_sale: chars[2].to_ascii_uppercase(),
            lspa: chars[3].to_ascii_uppercase(),
        })
    }

    /// True when the user explicitly opted out of sale
    pub fn is_opt_out(&self) -> bool {
        self.opt_out_sale == 'Y'
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_common_forms() {
        assert!(!UsPrivacy::parse("1---").unwrap().is_opt_out());
        assert!(!UsPrivacy::parse("1YNN").unwrap().is_opt_out());
        assert!(UsPrivacy::parse("1YYN").unwrap().is_opt_out());
        assert!(UsPrivacy::parse("1yyn").unwrap().is_opt_out());
    }

    #[test]
    fn rejects_malformed_strings() {
        assert!(UsPrivacy::parse("").is_err());
        assert!(UsPrivacy::parse("1Y").is_err());
        assert!(UsPrivacy::parse("XYNN").is_err());
        assert!(UsPrivacy::parse("1YZN").is_err());
    }
}
