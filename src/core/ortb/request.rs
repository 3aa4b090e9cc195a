use super::{MediaType, is_zero_f64, is_zero_u32, is_zero_u64};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound OpenRTB bid request. At most one of `site` or `app` may be
/// present - use ['channel()'] for the exclusive view. Cloning is a deep
/// copy, which is what isolates adapter mutations from each other.
#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct BidRequest {
    pub id: String,
    pub imp: Vec<Imp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<Site>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<App>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regs: Option<Regs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    /// Client supplied auction budget in ms, 0 when unset
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub tmax: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cur: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bcat: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub badv: Vec<String>,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub test: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub at: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
}

/// Exclusive inventory-context view over the optional site/app pair
#[derive(Debug, Clone, Copy)]
pub enum Channel<'a> {
    Site(&'a Site),
    App(&'a App),
}

impl BidRequest {
    /// Returns the inventory context, or None when neither (or both,
    /// which validation rejects upstream) is usable
    pub fn channel(&self) -> Option<Channel<'_>> {
        match (&self.site, &self.app) {
            (Some(site), None) => Some(Channel::Site(site)),
            (None, Some(app)) => Some(Channel::App(app)),
            _ => None,
        }
    }

    pub fn imp_by_id(&self, impid: &str) -> Option<&Imp> {
        self.imp.iter().find(|imp| imp.id == impid)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Imp {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<Banner>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<Video>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<Audio>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native: Option<Native>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pmp: Option<Pmp>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tagid: String,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub bidfloor: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bidfloorcur: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
}

impl Imp {
    pub fn media_types(&self) -> Vec<MediaType> {
        let mut types = Vec::with_capacity(2);

        if self.banner.is_some() {
            types.push(MediaType::Banner);
        }
        if self.video.is_some() {
            types.push(MediaType::Video);
        }
        if self.audio.is_some() {
            types.push(MediaType::Audio);
        }
        if self.native.is_some() {
            types.push(MediaType::Native);
        }

        types
    }

    pub fn offers(&self, media: MediaType) -> bool {
        match media {
            MediaType::Banner => self.banner.is_some(),
            MediaType::Video => self.video.is_some(),
            MediaType::Audio => self.audio.is_some(),
            MediaType::Native => self.native.is_some(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Banner {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub w: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub format: Vec<Format>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos: Option<u32>,
}

impl Banner {
    /// All allowed sizes, primary w/h first then the format list
    pub fn allowed_sizes(&self) -> Vec<(u32, u32)> {
        let mut sizes = Vec::with_capacity(self.format.len() + 1);

        if let (Some(w), Some(h)) = (self.w, self.h) {
            sizes.push((w, h));
        }

        for f in &self.format {
            if !sizes.contains(&(f.w, f.h)) {
                sizes.push((f.w, f.h));
            }
        }

        sizes
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Format {
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Video {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mimes: Vec<String>,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub minduration: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub maxduration: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub w: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linearity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Audio {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mimes: Vec<String>,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub minduration: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub maxduration: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Native {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub request: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ver: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Pmp {
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub private_auction: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deals: Vec<Deal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Deal {
    pub id: String,
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub bidfloor: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bidfloorcur: String,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub at: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Site {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub domain: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub page: String,
    #[serde(rename = "ref", skip_serializing_if = "String::is_empty")]
    pub referrer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<Publisher>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cat: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct App {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bundle: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub domain: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub storeurl: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<Publisher>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Publisher {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub domain: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Device {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ua: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ip: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ipv6: String,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub devicetype: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub make: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub os: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub osv: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo: Option<Geo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dnt: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lmt: Option<u32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ifa: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Geo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub country: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub region: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub city: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub zip: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub metro: String,
    #[serde(rename = "type", skip_serializing_if = "is_zero_u32")]
    pub kind: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct User {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub buyeruid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yob: Option<u32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub gender: String,
    /// TCF v2 consent string, OpenRTB 2.6 location. Older requests
    /// carry it at `user.ext.consent` - see ['consent_string()']
    #[serde(skip_serializing_if = "String::is_empty")]
    pub consent: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub eids: Vec<Eid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo: Option<Geo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
}

impl User {
    pub fn consent_string(&self) -> Option<&str> {
        if !self.consent.is_empty() {
            return Some(&self.consent);
        }

        self.ext
            .as_ref()
            .and_then(|ext| ext.get("consent"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Eid {
    pub source: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub uids: Vec<Uid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Uid {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atype: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Regs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coppa: Option<u32>,
    /// OpenRTB 2.6 location; older requests use `regs.ext.gdpr`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gdpr: Option<u32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub us_privacy: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub gpp: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub gpp_sid: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
}

impl Regs {
    pub fn gdpr_flag(&self) -> Option<u32> {
        if self.gdpr.is_some() {
            return self.gdpr;
        }

        self.ext
            .as_ref()
            .and_then(|ext| ext.get("gdpr"))
            .and_then(|v| v.as_u64())
            .map(|v| v as u32)
    }

    pub fn us_privacy_string(&self) -> Option<&str> {
        if !self.us_privacy.is_empty() {
            return Some(&self.us_privacy);
        }

        self.ext
            .as_ref()
            .and_then(|ext| ext.get("us_privacy"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Source {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fd: Option<u32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_is_exclusive() {
        let mut req = BidRequestBuilder::default()
            .id("r1".to_string())
            .site(Some(Site {
                domain: "news.example".to_string(),
                ..Default::default()
            }))
            .build()
            .unwrap();

        assert!(matches!(req.channel(), Some(Channel::Site(_))));

        req.app = Some(App::default());
        assert!(req.channel().is_none(), "both present must yield none");
    }

    #[test]
    fn consent_falls_back_to_ext() {
        let user = User {
            ext: Some(serde_json::json!({"consent": "COtybn4..."})),
            ..Default::default()
        };

        assert_eq!(user.consent_string(), Some("COtybn4..."));
    }

    #[test]
    fn gdpr_flag_falls_back_to_ext() {
        let regs = Regs {
            ext: Some(serde_json::json!({"gdpr": 1})),
            ..Default::default()
        };

        assert_eq!(regs.gdpr_flag(), Some(1));
    }

    #[test]
    fn deserializes_minimal_wire_request() {
        let json = r#"{
            "id": "abc",
            "imp": [{"id": "1", "banner": {"w": 300, "h": 250}, "bidfloor": 1.5}],
            "site": {"domain": "pub.example", "page": "https://pub.example/a"},
            "tmax": 750
        }"#;

        let req: BidRequest = serde_json::from_str(json).unwrap();

        assert_eq!(req.id, "abc");
        assert_eq!(req.tmax, 750);
        assert_eq!(req.imp.len(), 1);
        assert_eq!(req.imp[0].bidfloor, 1.5);
        assert_eq!(req.imp[0].media_types(), vec![MediaType::Banner]);
    }

    #[test]
    fn serialization_drops_empty_fields() {
        let req = BidRequestBuilder::default()
            .id("r2".to_string())
            .build()
            .unwrap();

        let json = serde_json::to_string(&req).unwrap();

        assert!(!json.contains("tmax"));
        assert!(!json.contains("device"));
        assert!(!json.contains("bcat"));
    }

    #[test]
    fn banner_allowed_sizes_dedupe() {
        let banner = Banner {
            w: Some(300),
            h: Some(250),
            format: vec![Format { w: 300, h: 250 }, Format { w: 728, h: 90 }],
            ..Default::default()
        };

        assert_eq!(banner.allowed_sizes(), vec![(300, 250), (728, 90)]);
    }
}
