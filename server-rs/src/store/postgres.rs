use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{LibraryStore, UpsertOutcome};
use crate::error::AppResult;
use crate::models::{
    ImportedGame, ImportedGamePatch, LinkedAccount, LinkedAccountRow, OwnedGame, Storefront,
    IMPORTED_GAME_COLUMNS,
};
use crate::services::library_query::{LibraryQuery, ResultPage};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LibraryStore for PgStore {
    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn find_linked_account(&self, user_id: Uuid) -> AppResult<Option<LinkedAccount>> {
        let row: Option<LinkedAccountRow> = sqlx::query_as(
            "SELECT steam_id64, steam_username, steam_avatar, steam_profile_url, steam_connected_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(LinkedAccountRow::into_linked))
    }

    async fn save_linked_account(&self, user_id: Uuid, account: &LinkedAccount) -> AppResult<bool> {
        let result = sqlx::query(
            r#"UPDATE users SET
                steam_id64 = $2,
                steam_username = $3,
                steam_avatar = $4,
                steam_profile_url = $5,
                steam_connected_at = $6
            WHERE id = $1"#,
        )
        .bind(user_id)
        .bind(&account.steam_id64)
        .bind(&account.display_name)
        .bind(&account.avatar_url)
        .bind(&account.profile_url)
        .bind(account.linked_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear_linked_account(&self, user_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            r#"UPDATE users SET
                steam_id64 = NULL,
                steam_username = NULL,
                steam_avatar = NULL,
                steam_profile_url = NULL,
                steam_connected_at = NULL
            WHERE id = $1 AND steam_id64 IS NOT NULL"#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn upsert_imported_games(&self, user_id: Uuid, games: &[OwnedGame]) -> AppResult<UpsertOutcome> {
        let mut outcome = UpsertOutcome::default();
        let mut tx = self.pool.begin().await?;

        for game in games {
            // xmax is zero only for a row this statement inserted.
            let inserted: bool = sqlx::query_scalar(
                r#"INSERT INTO imported_games (
                    user_id, name, storefront, storefront_game_id,
                    playtime, playtime_windows, playtime_mac, playtime_linux,
                    img_icon_url, img_logo_url, last_played_at, match_status,
                    created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'PENDING', NOW(), NOW())
                ON CONFLICT (user_id, storefront, storefront_game_id) WHERE deleted_at IS NULL
                DO UPDATE SET
                    name = EXCLUDED.name,
                    playtime = EXCLUDED.playtime,
                    playtime_windows = EXCLUDED.playtime_windows,
                    playtime_mac = EXCLUDED.playtime_mac,
                    playtime_linux = EXCLUDED.playtime_linux,
                    img_icon_url = EXCLUDED.img_icon_url,
                    img_logo_url = EXCLUDED.img_logo_url,
                    last_played_at = EXCLUDED.last_played_at,
                    updated_at = NOW()
                RETURNING (xmax = 0)"#,
            )
            .bind(user_id)
            .bind(&game.name)
            .bind(Storefront::Steam.as_str())
            .bind(&game.storefront_game_id)
            .bind(game.playtime_total)
            .bind(game.playtime_per_platform.windows)
            .bind(game.playtime_per_platform.mac)
            .bind(game.playtime_per_platform.linux)
            .bind(&game.icon_url)
            .bind(&game.logo_url)
            .bind(game.last_played_at())
            .fetch_one(&mut *tx)
            .await?;

            if inserted {
                outcome.created += 1;
            } else {
                outcome.updated += 1;
            }
        }

        tx.commit().await?;
        Ok(outcome)
    }

    async fn query_imported_games(
        &self,
        user_id: Uuid,
        query: &LibraryQuery,
        now: DateTime<Utc>,
    ) -> AppResult<ResultPage<ImportedGame>> {
        // Count and page must see the same snapshot.
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let total: i64 = query
            .count_sql(user_id, now)
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await?;

        let items: Vec<ImportedGame> = if total > 0 {
            query
                .page_sql(user_id, now)
                .build_query_as()
                .fetch_all(&mut *tx)
                .await?
        } else {
            Vec::new()
        };

        tx.commit().await?;
        Ok(ResultPage::new(items, total, query))
    }

    async fn count_imported_games(&self, user_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM imported_games WHERE user_id = $1 AND deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn patch_imported_game(
        &self,
        user_id: Uuid,
        game_id: Uuid,
        patch: &ImportedGamePatch,
    ) -> AppResult<Option<ImportedGame>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE imported_games SET updated_at = NOW()");
        if let Some(status) = patch.match_status {
            qb.push(", match_status = ").push_bind(status.as_str());
        }
        if let Some(name) = &patch.name {
            qb.push(", name = ").push_bind(name.clone());
        }
        qb.push(" WHERE id = ")
            .push_bind(game_id)
            .push(" AND user_id = ")
            .push_bind(user_id)
            .push(" AND deleted_at IS NULL RETURNING ")
            .push(IMPORTED_GAME_COLUMNS);

        let game = qb
            .build_query_as::<ImportedGame>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(game)
    }

    async fn soft_delete_imported_game(&self, user_id: Uuid, game_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE imported_games SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL",
        )
        .bind(game_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
