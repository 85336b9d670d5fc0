use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Steam account linked to a local user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedAccount {
    #[serde(rename = "externalId64")]
    pub steam_id64: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "avatarUrl")]
    pub avatar_url: String,
    #[serde(rename = "profileUrl")]
    pub profile_url: String,
    /// Absent on rows linked before the timestamp was recorded.
    #[serde(rename = "linkedAt")]
    pub linked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct LinkedAccountRow {
    pub steam_id64: Option<String>,
    pub steam_username: Option<String>,
    pub steam_avatar: Option<String>,
    pub steam_profile_url: Option<String>,
    pub steam_connected_at: Option<DateTime<Utc>>,
}

impl LinkedAccountRow {
    /// A user without a stored Steam id has no link, whatever else is set.
    pub fn into_linked(self) -> Option<LinkedAccount> {
        let steam_id64 = self.steam_id64?;
        Some(LinkedAccount {
            steam_id64,
            display_name: self.steam_username.unwrap_or_default(),
            avatar_url: self.steam_avatar.unwrap_or_default(),
            profile_url: self.steam_profile_url.unwrap_or_default(),
            linked_at: self.steam_connected_at,
        })
    }
}

/// Public profile as returned by the storefront.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SteamProfile {
    pub steam_id64: String,
    pub display_name: String,
    pub avatar_url: String,
    pub profile_url: String,
    pub is_public: bool,
}

/// Profile echoed back to the caller after a successful link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkedProfile {
    #[serde(rename = "externalId64")]
    pub steam_id64: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "avatarUrl")]
    pub avatar_url: String,
    #[serde(rename = "profileUrl")]
    pub profile_url: String,
}

impl From<SteamProfile> for LinkedProfile {
    fn from(p: SteamProfile) -> Self {
        Self {
            steam_id64: p.steam_id64,
            display_name: p.display_name,
            avatar_url: p.avatar_url,
            profile_url: p.profile_url,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConnectSteamRequest {
    #[serde(rename = "steamId", alias = "identifier")]
    pub steam_id: String,
}

#[derive(Debug, Serialize)]
pub struct SteamStatus {
    pub connected: bool,
    pub profile: Option<LinkedAccount>,
    #[serde(rename = "importedCount")]
    pub imported_count: i64,
}
