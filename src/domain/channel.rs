use serde::{Deserialize, Serialize};
use std::fmt;

/// Mobile-money provider a payer is collected through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Mtn,
    Vod,
    Tgo,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Mtn => "mtn",
            Channel::Vod => "vod",
            Channel::Tgo => "tgo",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const GHANA_ROUTES: &[(&str, Channel)] = &[
    ("23350", Channel::Mtn),
    ("23354", Channel::Mtn),
    ("23355", Channel::Mtn),
    ("23356", Channel::Mtn),
    ("23357", Channel::Mtn),
    ("23359", Channel::Mtn),
    ("23320", Channel::Vod),
    ("23324", Channel::Mtn),
    ("23327", Channel::Vod),
    ("23326", Channel::Tgo),
    ("23323", Channel::Tgo),
    ("23328", Channel::Tgo),
];

/// Longest-prefix routing table from phone number to payment channel.
///
/// Routing is total: numbers matching no prefix go to the default channel.
#[derive(Debug, Clone)]
pub struct ChannelRouter {
    routes: Vec<(String, Channel)>,
    default: Channel,
}

impl Default for ChannelRouter {
    fn default() -> Self {
        Self::new(
            GHANA_ROUTES
                .iter()
                .map(|(prefix, channel)| (prefix.to_string(), *channel)),
            Channel::Mtn,
        )
    }
}

impl ChannelRouter {
    pub fn new(routes: impl IntoIterator<Item = (String, Channel)>, default: Channel) -> Self {
        Self {
            routes: routes.into_iter().collect(),
            default,
        }
    }

    pub fn route(&self, phone: &str) -> Channel {
        let number = normalize_msisdn(phone);
        self.routes
            .iter()
            .filter(|(prefix, _)| number.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, channel)| *channel)
            .unwrap_or(self.default)
    }
}

/// Strips formatting and rewrites local `0XX…` numbers to the `233XX…` form.
pub fn normalize_msisdn(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.strip_prefix('0') {
        Some(local) if !local.starts_with('0') && local.len() == 9 => format!("233{local}"),
        _ => digits,
    }
}
