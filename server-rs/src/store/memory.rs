use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{LibraryStore, UpsertOutcome};
use crate::error::AppResult;
use crate::models::{
    ImportedGame, ImportedGamePatch, LinkedAccount, MatchStatus, OwnedGame, Storefront,
};
use crate::services::library_query::{LibraryQuery, ResultPage};

/// In-process store for local development and tests.
///
/// Users come into existence the first time they link an account; there is
/// no separate user table to seed.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryState>>,
}

type LiveKey = (Uuid, Storefront, String);

#[derive(Default)]
struct MemoryState {
    links: HashMap<Uuid, Option<LinkedAccount>>,
    games: Vec<ImportedGame>,
    /// Position in `games` of every live record.
    live: HashMap<LiveKey, usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record ever written for the user, soft-deleted ones included.
    pub async fn all_records(&self, user_id: Uuid) -> Vec<ImportedGame> {
        let state = self.inner.read().await;
        state
            .games
            .iter()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LibraryStore for MemoryStore {
    async fn ping(&self) -> bool {
        true
    }

    async fn find_linked_account(&self, user_id: Uuid) -> AppResult<Option<LinkedAccount>> {
        let state = self.inner.read().await;
        Ok(state.links.get(&user_id).cloned().flatten())
    }

    async fn save_linked_account(&self, user_id: Uuid, account: &LinkedAccount) -> AppResult<bool> {
        let mut state = self.inner.write().await;
        state.links.insert(user_id, Some(account.clone()));
        Ok(true)
    }

    async fn clear_linked_account(&self, user_id: Uuid) -> AppResult<bool> {
        let mut state = self.inner.write().await;
        Ok(state
            .links
            .get_mut(&user_id)
            .and_then(Option::take)
            .is_some())
    }

    async fn upsert_imported_games(&self, user_id: Uuid, games: &[OwnedGame]) -> AppResult<UpsertOutcome> {
        // Nothing below can fail, so holding the write lock for the whole run
        // keeps it all-or-nothing for readers.
        let mut guard = self.inner.write().await;
        let state = &mut *guard;
        let now = Utc::now();
        let mut outcome = UpsertOutcome::default();

        for game in games {
            let key = (user_id, Storefront::Steam, game.storefront_game_id.clone());
            match state.live.get(&key).copied() {
                Some(i) => {
                    let record = &mut state.games[i];
                    record.name = game.name.clone();
                    record.playtime_total = game.playtime_total;
                    record.playtime_per_platform = game.playtime_per_platform;
                    record.icon_url = game.icon_url.clone();
                    record.logo_url = game.logo_url.clone();
                    record.last_played_at = game.last_played_at();
                    record.updated_at = now;
                    outcome.updated += 1;
                }
                None => {
                    state.live.insert(key, state.games.len());
                    state.games.push(ImportedGame {
                        id: Uuid::new_v4(),
                        user_id,
                        name: game.name.clone(),
                        storefront: Storefront::Steam,
                        storefront_game_id: game.storefront_game_id.clone(),
                        playtime_total: game.playtime_total,
                        playtime_per_platform: game.playtime_per_platform,
                        icon_url: game.icon_url.clone(),
                        logo_url: game.logo_url.clone(),
                        last_played_at: game.last_played_at(),
                        match_status: MatchStatus::Pending,
                        created_at: now,
                        updated_at: now,
                        deleted_at: None,
                    });
                    outcome.created += 1;
                }
            }
        }

        Ok(outcome)
    }

    async fn query_imported_games(
        &self,
        user_id: Uuid,
        query: &LibraryQuery,
        now: DateTime<Utc>,
    ) -> AppResult<ResultPage<ImportedGame>> {
        let state = self.inner.read().await;
        let mut matching: Vec<&ImportedGame> = state
            .games
            .iter()
            .filter(|g| g.user_id == user_id && query.matches(g, now))
            .collect();
        matching.sort_by(|a, b| query.sort_by.compare(a, b));

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .cloned()
            .collect();
        Ok(ResultPage::new(items, total, query))
    }

    async fn count_imported_games(&self, user_id: Uuid) -> AppResult<i64> {
        let state = self.inner.read().await;
        Ok(state
            .games
            .iter()
            .filter(|g| g.user_id == user_id && g.deleted_at.is_none())
            .count() as i64)
    }

    async fn patch_imported_game(
        &self,
        user_id: Uuid,
        game_id: Uuid,
        patch: &ImportedGamePatch,
    ) -> AppResult<Option<ImportedGame>> {
        let mut state = self.inner.write().await;
        let record = state
            .games
            .iter_mut()
            .find(|g| g.id == game_id && g.user_id == user_id && g.deleted_at.is_none());

        Ok(record.map(|record| {
            patch.apply(record);
            record.updated_at = Utc::now();
            record.clone()
        }))
    }

    async fn soft_delete_imported_game(&self, user_id: Uuid, game_id: Uuid) -> AppResult<bool> {
        let mut guard = self.inner.write().await;
        let state = &mut *guard;
        let now = Utc::now();
        let Some(record) = state
            .games
            .iter_mut()
            .find(|g| g.id == game_id && g.user_id == user_id && g.deleted_at.is_none())
        else {
            return Ok(false);
        };

        record.deleted_at = Some(now);
        record.updated_at = now;
        let key = (record.user_id, record.storefront, record.storefront_game_id.clone());
        state.live.remove(&key);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    use crate::models::PlatformPlaytime;
    use crate::services::library_query::{ImportedGamesParams, SortBy};

    fn owned(app_id: &str, name: &str, playtime: i32) -> OwnedGame {
        OwnedGame {
            storefront_game_id: app_id.to_string(),
            name: name.to_string(),
            playtime_total: playtime,
            playtime_per_platform: PlatformPlaytime {
                windows: playtime,
                mac: 0,
                linux: 0,
            },
            icon_url: None,
            logo_url: None,
            last_played_epoch_secs: 0,
        }
    }

    #[tokio::test]
    async fn upsert_creates_then_updates_in_place() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();

        let first = store
            .upsert_imported_games(user, &[owned("10", "Counter-Strike", 5)])
            .await
            .unwrap();
        assert_eq!(first, UpsertOutcome { created: 1, updated: 0 });

        let second = store
            .upsert_imported_games(user, &[owned("10", "Counter-Strike", 50)])
            .await
            .unwrap();
        assert_eq!(second, UpsertOutcome { created: 0, updated: 1 });

        let records = store.all_records(user).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].playtime_total, 50);
        assert!(records[0].updated_at >= records[0].created_at);
    }

    #[tokio::test]
    async fn soft_deleted_title_is_recreated_on_next_upsert() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        store
            .upsert_imported_games(user, &[owned("20", "Half-Life", 0)])
            .await
            .unwrap();
        let original = store.all_records(user).await[0].clone();

        assert!(store.soft_delete_imported_game(user, original.id).await.unwrap());
        assert!(!store.soft_delete_imported_game(user, original.id).await.unwrap());
        assert_eq!(store.count_imported_games(user).await.unwrap(), 0);

        let outcome = store
            .upsert_imported_games(user, &[owned("20", "Half-Life", 0)])
            .await
            .unwrap();
        assert_eq!(outcome.created, 1);
        assert_eq!(store.all_records(user).await.len(), 2);
        assert_eq!(store.count_imported_games(user).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn records_are_scoped_to_their_owner() {
        let store = MemoryStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        store
            .upsert_imported_games(alice, &[owned("30", "Portal", 10)])
            .await
            .unwrap();
        let game_id = store.all_records(alice).await[0].id;

        let patch = ImportedGamePatch {
            match_status: Some(MatchStatus::Matched),
            name: None,
        };
        assert!(store.patch_imported_game(bob, game_id, &patch).await.unwrap().is_none());
        assert!(!store.soft_delete_imported_game(bob, game_id).await.unwrap());

        let page = store
            .query_imported_games(bob, &LibraryQuery::default(), Utc::now())
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn clearing_a_link_reports_whether_one_existed() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        assert!(!store.clear_linked_account(user).await.unwrap());

        let account = LinkedAccount {
            steam_id64: "76561198012345678".into(),
            display_name: "gaben".into(),
            avatar_url: "https://avatars.example/a.jpg".into(),
            profile_url: "https://steamcommunity.com/id/gaben/".into(),
            linked_at: Some(Utc::now()),
        };
        store.save_linked_account(user, &account).await.unwrap();
        assert_eq!(store.find_linked_account(user).await.unwrap(), Some(account));

        assert!(store.clear_linked_account(user).await.unwrap());
        assert_eq!(store.find_linked_account(user).await.unwrap(), None);
    }

    /// Three titles with distinct names, playtimes, add dates and last-played
    /// dates. `b` has never been played.
    async fn seeded_library(user: Uuid) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .upsert_imported_games(
                user,
                &[owned("1", "a", 300), owned("2", "b", 200), owned("3", "c", 100)],
            )
            .await
            .unwrap();

        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut state = store.inner.write().await;
        for record in state.games.iter_mut() {
            let (added, played) = match record.name.as_str() {
                "a" => (2, Some(10)),
                "b" => (1, None),
                _ => (3, Some(5)),
            };
            record.created_at = base + Duration::days(added);
            record.last_played_at = played.map(|d| base + Duration::days(d));
        }
        drop(state);
        store
    }

    async fn names(
        store: &MemoryStore,
        user: Uuid,
        params: ImportedGamesParams,
    ) -> (Vec<String>, ResultPage<ImportedGame>) {
        let page = store
            .query_imported_games(user, &LibraryQuery::from(params), Utc::now())
            .await
            .unwrap();
        (page.items.iter().map(|g| g.name.clone()).collect(), page)
    }

    #[tokio::test]
    async fn every_sort_order_is_applied() {
        let user = Uuid::new_v4();
        let store = seeded_library(user).await;

        let expected = [
            (SortBy::NameAsc, ["a", "b", "c"]),
            (SortBy::NameDesc, ["c", "b", "a"]),
            (SortBy::PlaytimeAsc, ["c", "b", "a"]),
            (SortBy::PlaytimeDesc, ["a", "b", "c"]),
            (SortBy::LastPlayedAsc, ["c", "a", "b"]),
            (SortBy::LastPlayedDesc, ["a", "c", "b"]),
            (SortBy::AddedDesc, ["c", "a", "b"]),
        ];
        for (sort_by, order) in expected {
            let params = ImportedGamesParams {
                sort_by: Some(sort_by),
                ..Default::default()
            };
            let (got, _) = names(&store, user, params).await;
            assert_eq!(got, order, "{sort_by:?}");
        }
    }

    #[tokio::test]
    async fn second_page_holds_the_remainder() {
        let user = Uuid::new_v4();
        let store = seeded_library(user).await;

        let params = ImportedGamesParams {
            page: Some(2),
            limit: Some(2),
            sort_by: Some(SortBy::NameAsc),
            ..Default::default()
        };
        let (got, page) = names(&store, user, params).await;
        assert_eq!(got, ["c"]);
        assert_eq!((page.page, page.limit, page.total, page.total_pages), (2, 2, 3, 2));

        let params = ImportedGamesParams {
            page: Some(3),
            limit: Some(2),
            ..Default::default()
        };
        let (got, page) = names(&store, user, params).await;
        assert!(got.is_empty());
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn same_title_is_tracked_per_user() {
        let store = MemoryStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        store
            .upsert_imported_games(alice, &[owned("10", "Counter-Strike", 5)])
            .await
            .unwrap();
        let outcome = store
            .upsert_imported_games(bob, &[owned("10", "Counter-Strike", 7)])
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome { created: 1, updated: 0 });

        let alice_cs = store.all_records(alice).await[0].clone();
        assert!(store.soft_delete_imported_game(alice, alice_cs.id).await.unwrap());

        let outcome = store
            .upsert_imported_games(bob, &[owned("10", "Counter-Strike", 9)])
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome { created: 0, updated: 1 });
        assert_eq!(store.all_records(bob).await[0].playtime_total, 9);
        assert_eq!(store.all_records(alice).await[0].playtime_total, 5);
    }
}
