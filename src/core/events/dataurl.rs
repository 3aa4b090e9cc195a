use anyhow::{Result, anyhow, bail};
use url::Url;

/// A typed key-value URL builder with finalization semantics: built
/// up through the pipeline, then frozen before it lands in markup.
///
/// # Example
/// ```ignore
/// let mut url = DataUrl::new("arx.example", "event/win")?;
/// url.add_string("aid", "abc")?.add_float("cp", 1.50)?;
/// url.finalize();
/// let s = url.url(true)?; // https://arx.example/event/win?aid=abc&cp=1.5
/// ```
#[derive(Clone, Debug)]
pub struct DataUrl {
    url: Url,
    finalized: bool,
}

impl DataUrl {
    /// Domain goes without a protocol; slashes on the path are
    /// handled either way
    pub fn new(domain: &str, path: &str) -> Result<Self> {
        let domain = domain.trim_end_matches('/');
        let path = path.trim_start_matches('/');

        let url = Url::parse(&format!("https://{}/{}", domain, path))?;

        Ok(Self {
            url,
            finalized: false,
        })
    }

    /// Parses an existing event url; the result is frozen
    pub fn from(url_str: &str) -> Result<Self> {
        Ok(Self {
            url: Url::parse(url_str)?,
            finalized: true,
        })
    }

    pub fn add_string(&mut self, key: &str, value: &str) -> Result<&mut Self> {
        if self.finalized {
            bail!("Cannot add parameters to a finalized DataUrl");
        }
        self.url.query_pairs_mut().append_pair(key, value);
        Ok(self)
    }

    pub fn add_int(&mut self, key: &str, value: i64) -> Result<&mut Self> {
        self.add_string(key, &value.to_string())
    }

    pub fn add_float(&mut self, key: &str, value: f64) -> Result<&mut Self> {
        self.add_string(key, &value.to_string())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.to_string())
    }

    pub fn get_required_string(&self, key: &str) -> Result<String> {
        self.get_string(key)
            .ok_or_else(|| anyhow!("Missing required url param '{}'", key))
    }

    pub fn get_required_int(&self, key: &str) -> Result<i64> {
        self.get_required_string(key)?
            .parse()
            .map_err(|e| anyhow!("Param '{}' is not an int: {}", key, e))
    }

    pub fn get_required_float(&self, key: &str) -> Result<f64> {
        self.get_required_string(key)?
            .parse()
            .map_err(|e| anyhow!("Param '{}' is not a float: {}", key, e))
    }

    pub fn finalize(&mut self) {
        self.finalized = true;
    }

    /// Renders the final url with the chosen scheme
    pub fn url(&self, https: bool) -> Result<String> {
        let mut out = self.url.clone();

        out.set_scheme(if https { "https" } else { "http" })
            .map_err(|_| anyhow!("Failed setting url scheme"))?;

        Ok(out.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_and_reads_back() {
        let mut url = DataUrl::new("arx.example", "/event/win").unwrap();
        url.add_string("aid", "a 1").unwrap().add_float("cp", 1.5).unwrap();
        url.finalize();

        let rendered = url.url(true).unwrap();
        assert!(rendered.starts_with("https://arx.example/event/win?"));
        assert!(rendered.contains("aid=a+1"), "params are form-encoded");

        let parsed = DataUrl::from(&rendered).unwrap();
        assert_eq!(parsed.get_required_string("aid").unwrap(), "a 1");
        assert_eq!(parsed.get_required_float("cp").unwrap(), 1.5);
    }

    #[test]
    fn finalized_url_is_immutable() {
        let mut url = DataUrl::new("arx.example", "e").unwrap();
        url.finalize();

        assert!(url.add_string("k", "v").is_err());
    }

    #[test]
    fn missing_params_error() {
        let url = DataUrl::from("https://arx.example/e?a=1").unwrap();

        assert!(url.get_required_string("b").is_err());
        assert!(url.get_required_int("a").is_ok());
    }
}
