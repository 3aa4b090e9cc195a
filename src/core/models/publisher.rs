use derive_builder::Builder;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
pub struct Publisher {
    pub id: String,
    pub enabled: bool,
    pub name: String,
    /// Publisher-level floor in USD CPM, folded into every
    /// impression's effective floor
    pub floor: f64,
    /// Domains this publisher may send traffic from, empty for any
    pub domains: Vec<String>,
}
