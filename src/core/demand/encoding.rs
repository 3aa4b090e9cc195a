use crate::core::ortb::{BidRequest, BidResponse};
use anyhow::anyhow;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;

#[derive(Debug, Clone)]
pub struct Header {
    pub key: &'static str,
    pub value: String,
}

impl Header {
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

pub struct RequestEncoder {
    pub headers: Vec<Header>,
    pub data: Vec<u8>,
}

impl RequestEncoder {
    fn compress(data: Vec<u8>) -> Result<Vec<u8>, anyhow::Error> {
        let mut encoder = GzEncoder::new(Vec::with_capacity(1024), Compression::fast());
        encoder.write_all(&data)?;

        Ok(encoder.finish()?)
    }

    /// Encodes the request body and its content headers. Compression
    /// happens here so adapters stay pure - no I/O, just bytes out.
    pub fn encode(req: &BidRequest, gzip: bool) -> Result<Self, anyhow::Error> {
        let mut headers = vec![Header::new("content-type", "application/json")];

        let mut data = serde_json::to_vec(req).map_err(anyhow::Error::from)?;

        if gzip {
            headers.push(Header::new("content-encoding", "gzip"));
            data = Self::compress(data)?;
        }

        Ok(Self { headers, data })
    }
}

pub struct ResponseDecoder;

impl ResponseDecoder {
    /// Decodes a raw (already decompressed) response body. An empty
    /// body is the caller's problem - 204s never reach this point.
    pub fn decode(data: &[u8]) -> Result<BidResponse, anyhow::Error> {
        serde_json::from_slice(data).map_err(|e| anyhow!("Failed decoding json response: {}", e))
    }
}
