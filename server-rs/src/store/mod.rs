//! Persistence seam for linked accounts and imported games.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{ImportedGame, ImportedGamePatch, LinkedAccount, OwnedGame};
use crate::services::library_query::{LibraryQuery, ResultPage};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// How one upsert run split between new and refreshed records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub created: usize,
    pub updated: usize,
}

impl UpsertOutcome {
    pub fn processed(&self) -> usize {
        self.created + self.updated
    }
}

#[async_trait]
pub trait LibraryStore: Send + Sync {
    async fn ping(&self) -> bool;

    /// `None` when the user does not exist or has no Steam link.
    async fn find_linked_account(&self, user_id: Uuid) -> AppResult<Option<LinkedAccount>>;

    /// Overwrites every link field. Returns `false` when the user is unknown.
    async fn save_linked_account(&self, user_id: Uuid, account: &LinkedAccount) -> AppResult<bool>;

    /// Returns whether a link was present.
    async fn clear_linked_account(&self, user_id: Uuid) -> AppResult<bool>;

    /// Inserts or refreshes each game as one unit of work: either every row
    /// is written or none is. New rows start `PENDING`; existing rows keep
    /// their match status. `games` must not repeat a storefront game id.
    async fn upsert_imported_games(&self, user_id: Uuid, games: &[OwnedGame]) -> AppResult<UpsertOutcome>;

    async fn query_imported_games(
        &self,
        user_id: Uuid,
        query: &LibraryQuery,
        now: DateTime<Utc>,
    ) -> AppResult<ResultPage<ImportedGame>>;

    async fn count_imported_games(&self, user_id: Uuid) -> AppResult<i64>;

    /// Applies the present fields of `patch` to a live record owned by the user.
    async fn patch_imported_game(
        &self,
        user_id: Uuid,
        game_id: Uuid,
        patch: &ImportedGamePatch,
    ) -> AppResult<Option<ImportedGame>>;

    async fn soft_delete_imported_game(&self, user_id: Uuid, game_id: Uuid) -> AppResult<bool>;
}
