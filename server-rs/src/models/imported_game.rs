use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Source a record was imported from. Steam is the only storefront today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Storefront {
    Steam,
}

impl Storefront {
    pub fn as_str(&self) -> &'static str {
        match self {
            Storefront::Steam => "STEAM",
        }
    }
}

impl TryFrom<String> for Storefront {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "STEAM" => Ok(Storefront::Steam),
            _ => Err(UnknownVariant(value)),
        }
    }
}

/// Progress of the downstream catalog-matching process for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Pending,
    Matched,
    Unmatched,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "PENDING",
            MatchStatus::Matched => "MATCHED",
            MatchStatus::Unmatched => "UNMATCHED",
        }
    }
}

impl TryFrom<String> for MatchStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "PENDING" => Ok(MatchStatus::Pending),
            "MATCHED" => Ok(MatchStatus::Matched),
            "UNMATCHED" => Ok(MatchStatus::Unmatched),
            _ => Err(UnknownVariant(value)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown variant `{0}`")]
pub struct UnknownVariant(String);

/// Minutes played per operating system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlatformPlaytime {
    #[sqlx(rename = "playtime_windows")]
    pub windows: i32,
    #[sqlx(rename = "playtime_mac")]
    pub mac: i32,
    #[sqlx(rename = "playtime_linux")]
    pub linux: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ImportedGame {
    pub id: Uuid,
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub storefront: Storefront,
    #[serde(rename = "storefrontGameId")]
    pub storefront_game_id: String,
    #[serde(rename = "playtimeTotal")]
    #[sqlx(rename = "playtime")]
    pub playtime_total: i32,
    #[serde(rename = "playtimePerPlatform")]
    #[sqlx(flatten)]
    pub playtime_per_platform: PlatformPlaytime,
    #[serde(rename = "iconUrl")]
    #[sqlx(rename = "img_icon_url")]
    pub icon_url: Option<String>,
    #[serde(rename = "logoUrl")]
    #[sqlx(rename = "img_logo_url")]
    pub logo_url: Option<String>,
    #[serde(rename = "lastPlayedAt")]
    pub last_played_at: Option<DateTime<Utc>>,
    #[serde(rename = "matchStatus")]
    #[sqlx(try_from = "String")]
    pub match_status: MatchStatus,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "deletedAt")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Column list matching `ImportedGame`'s `FromRow` mapping.
pub const IMPORTED_GAME_COLUMNS: &str = "id, user_id, name, storefront, storefront_game_id, \
     playtime, playtime_windows, playtime_mac, playtime_linux, img_icon_url, img_logo_url, \
     last_played_at, match_status, created_at, updated_at, deleted_at";

/// One title as reported by the storefront's owned-games endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedGame {
    pub storefront_game_id: String,
    pub name: String,
    pub playtime_total: i32,
    pub playtime_per_platform: PlatformPlaytime,
    pub icon_url: Option<String>,
    pub logo_url: Option<String>,
    pub last_played_epoch_secs: i64,
}

impl OwnedGame {
    /// Storefronts report "never played" as a zero epoch.
    pub fn last_played_at(&self) -> Option<DateTime<Utc>> {
        if self.last_played_epoch_secs > 0 {
            Utc.timestamp_opt(self.last_played_epoch_secs, 0).single()
        } else {
            None
        }
    }
}

/// Partial update of an imported record. `None` leaves the field alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportedGamePatch {
    #[serde(rename = "matchStatus")]
    pub match_status: Option<MatchStatus>,
    pub name: Option<String>,
}

impl ImportedGamePatch {
    pub fn is_empty(&self) -> bool {
        self.match_status.is_none() && self.name.is_none()
    }

    pub fn apply(&self, game: &mut ImportedGame) {
        if let Some(status) = self.match_status {
            game.match_status = status;
        }
        if let Some(name) = &self.name {
            game.name = name.clone();
        }
    }
}

/// Counts reported by one sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub imported: usize,
    pub total: usize,
    pub filtered: usize,
}
