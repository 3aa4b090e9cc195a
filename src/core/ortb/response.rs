use super::{is_zero_u32, is_zero_u64};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct BidResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub seatbid: Vec<SeatBid>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bidid: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cur: String,
    /// No-bid reason code, standard values plus the exchange range
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbr: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
}

impl BidResponse {
    pub fn bid_count(&self) -> usize {
        self.seatbid.iter().map(|s| s.bid.len()).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct SeatBid {
    pub bid: Vec<Bid>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub seat: String,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub group: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Bid {
    pub id: String,
    pub impid: String,
    pub price: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub adid: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub nurl: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub burl: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub lurl: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub adm: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub adomain: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bundle: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub iurl: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cid: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub crid: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cat: Vec<String>,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub w: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub h: u32,
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub dur: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtype: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_typical_bidder_response() {
        let json = r#"{
            "id": "abc",
            "cur": "USD",
            "seatbid": [{
                "seat": "dsp-1",
                "bid": [{
                    "id": "b1",
                    "impid": "1",
                    "price": 2.31,
                    "adm": "<div>ad</div>",
                    "crid": "cr-9",
                    "adomain": ["adv.example"],
                    "w": 300,
                    "h": 250
                }]
            }]
        }"#;

        let res: BidResponse = serde_json::from_str(json).unwrap();

        assert_eq!(res.bid_count(), 1);
        assert_eq!(res.seatbid[0].bid[0].price, 2.31);
        assert_eq!(res.seatbid[0].bid[0].adomain, vec!["adv.example"]);
    }

    #[test]
    fn nbr_round_trips() {
        let res = BidResponseBuilder::default()
            .id("abc".to_string())
            .nbr(Some(500))
            .build()
            .unwrap();

        let json = serde_json::to_string(&res).unwrap();
        assert!(json.contains("\"nbr\":500"));

        let back: BidResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back.nbr, Some(500));
    }
}
