//! Filtering, sorting and pagination over a user's imported games.
//!
//! Each filter knows how to render itself as SQL for the Postgres store and
//! how to test a record in memory, so both stores share one definition of
//! what a filter means.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{ImportedGame, Storefront, IMPORTED_GAME_COLUMNS};
use crate::store::LibraryStore;

pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaytimeStatus {
    #[default]
    All,
    Played,
    NeverPlayed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum PlaytimeRange {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "under_1h")]
    Under1h,
    #[serde(rename = "1_to_10h")]
    From1To10h,
    #[serde(rename = "10_to_50h")]
    From10To50h,
    #[serde(rename = "over_50h")]
    Over50h,
}

impl PlaytimeRange {
    /// Half-open bounds in minutes, `[lower, upper)`.
    fn bounds(&self) -> Option<(i32, Option<i32>)> {
        match self {
            PlaytimeRange::All => None,
            PlaytimeRange::Under1h => Some((0, Some(60))),
            PlaytimeRange::From1To10h => Some((60, Some(600))),
            PlaytimeRange::From10To50h => Some((600, Some(3000))),
            PlaytimeRange::Over50h => Some((3000, None)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    #[default]
    All,
    Windows,
    Mac,
    Linux,
}

impl Platform {
    fn column(&self) -> Option<&'static str> {
        match self {
            Platform::All => None,
            Platform::Windows => Some("playtime_windows"),
            Platform::Mac => Some("playtime_mac"),
            Platform::Linux => Some("playtime_linux"),
        }
    }

    fn minutes(&self, game: &ImportedGame) -> Option<i32> {
        let p = &game.playtime_per_platform;
        match self {
            Platform::All => None,
            Platform::Windows => Some(p.windows),
            Platform::Mac => Some(p.mac),
            Platform::Linux => Some(p.linux),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum LastPlayed {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "30_days")]
    Within30Days,
    #[serde(rename = "1_year")]
    WithinYear,
    #[serde(rename = "over_1_year")]
    OverYear,
    #[serde(rename = "never")]
    Never,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    NameAsc,
    NameDesc,
    PlaytimeAsc,
    PlaytimeDesc,
    LastPlayedAsc,
    LastPlayedDesc,
    #[default]
    AddedDesc,
}

impl SortBy {
    /// ORDER BY body. Ties fall back to `id` so pages never overlap.
    ///
    /// Names compare bytewise under the "C" collation, the same order `str`
    /// comparison gives in `compare`.
    pub fn order_by_sql(&self) -> &'static str {
        match self {
            SortBy::NameAsc => r#"name COLLATE "C" ASC, id ASC"#,
            SortBy::NameDesc => r#"name COLLATE "C" DESC, id ASC"#,
            SortBy::PlaytimeAsc => "playtime ASC, id ASC",
            SortBy::PlaytimeDesc => "playtime DESC, id ASC",
            SortBy::LastPlayedAsc => "last_played_at ASC NULLS LAST, id ASC",
            SortBy::LastPlayedDesc => "last_played_at DESC NULLS LAST, id ASC",
            SortBy::AddedDesc => "created_at DESC, id ASC",
        }
    }

    pub fn compare(&self, a: &ImportedGame, b: &ImportedGame) -> Ordering {
        let primary = match self {
            SortBy::NameAsc => a.name.cmp(&b.name),
            SortBy::NameDesc => b.name.cmp(&a.name),
            SortBy::PlaytimeAsc => a.playtime_total.cmp(&b.playtime_total),
            SortBy::PlaytimeDesc => b.playtime_total.cmp(&a.playtime_total),
            SortBy::LastPlayedAsc => nulls_last(a.last_played_at, b.last_played_at, false),
            SortBy::LastPlayedDesc => nulls_last(a.last_played_at, b.last_played_at, true),
            SortBy::AddedDesc => b.created_at.cmp(&a.created_at),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

fn nulls_last(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if descending => b.cmp(&a),
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Raw query-string parameters for the imported games listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportedGamesParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    #[serde(rename = "playtimeStatus")]
    pub playtime_status: Option<PlaytimeStatus>,
    #[serde(rename = "playtimeRange")]
    pub playtime_range: Option<PlaytimeRange>,
    pub platform: Option<Platform>,
    #[serde(rename = "lastPlayed")]
    pub last_played: Option<LastPlayed>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<SortBy>,
}

/// Normalized query: page and limit clamped, blank search dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryQuery {
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
    pub playtime_status: PlaytimeStatus,
    pub playtime_range: PlaytimeRange,
    pub platform: Platform,
    pub last_played: LastPlayed,
    pub sort_by: SortBy,
}

impl Default for LibraryQuery {
    fn default() -> Self {
        ImportedGamesParams::default().into()
    }
}

impl From<ImportedGamesParams> for LibraryQuery {
    fn from(p: ImportedGamesParams) -> Self {
        let page = p.page.unwrap_or(1).clamp(1, i64::from(u32::MAX)) as u32;
        let limit = p
            .limit
            .unwrap_or(i64::from(DEFAULT_PAGE_SIZE))
            .clamp(1, i64::from(MAX_PAGE_SIZE)) as u32;
        let search = p
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Self {
            page,
            limit,
            search,
            playtime_status: p.playtime_status.unwrap_or_default(),
            playtime_range: p.playtime_range.unwrap_or_default(),
            platform: p.platform.unwrap_or_default(),
            last_played: p.last_played.unwrap_or_default(),
            sort_by: p.sort_by.unwrap_or_default(),
        }
    }
}

impl LibraryQuery {
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// Appends `WHERE ...` for this query, scoped to the user's live records.
    pub fn push_filters(&self, qb: &mut QueryBuilder<'_, Postgres>, user_id: Uuid, now: DateTime<Utc>) {
        qb.push(" WHERE user_id = ")
            .push_bind(user_id)
            .push(" AND storefront = ")
            .push_bind(Storefront::Steam.as_str())
            .push(" AND deleted_at IS NULL");

        if let Some(search) = &self.search {
            qb.push(" AND name ILIKE ")
                .push_bind(format!("%{}%", escape_like(search)))
                .push(r" ESCAPE '\'");
        }

        match self.playtime_status {
            PlaytimeStatus::All => {}
            PlaytimeStatus::Played => {
                qb.push(" AND playtime > 0");
            }
            PlaytimeStatus::NeverPlayed => {
                qb.push(" AND playtime = 0");
            }
        }

        if let Some((lower, upper)) = self.playtime_range.bounds() {
            qb.push(" AND playtime >= ").push_bind(lower);
            if let Some(upper) = upper {
                qb.push(" AND playtime < ").push_bind(upper);
            }
        }

        if let Some(column) = self.platform.column() {
            qb.push(format!(" AND {column} > 0"));
        }

        match self.last_played {
            LastPlayed::All => {}
            LastPlayed::Within30Days => {
                qb.push(" AND last_played_at >= ")
                    .push_bind(now - Duration::days(30));
            }
            LastPlayed::WithinYear => {
                qb.push(" AND last_played_at >= ")
                    .push_bind(now - Duration::days(365));
            }
            LastPlayed::OverYear => {
                qb.push(" AND last_played_at < ")
                    .push_bind(now - Duration::days(365));
            }
            LastPlayed::Never => {
                qb.push(" AND last_played_at IS NULL");
            }
        }
    }

    /// Full page query: filters, ordering and LIMIT/OFFSET.
    pub fn page_sql(&self, user_id: Uuid, now: DateTime<Utc>) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(format!("SELECT {IMPORTED_GAME_COLUMNS} FROM imported_games"));
        self.push_filters(&mut qb, user_id, now);
        qb.push(" ORDER BY ")
            .push(self.sort_by.order_by_sql())
            .push(" LIMIT ")
            .push_bind(i64::from(self.limit))
            .push(" OFFSET ")
            .push_bind(self.offset() as i64);
        qb
    }

    pub fn count_sql(&self, user_id: Uuid, now: DateTime<Utc>) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM imported_games");
        self.push_filters(&mut qb, user_id, now);
        qb
    }

    /// In-memory equivalent of `push_filters`, minus the user scope.
    pub fn matches(&self, game: &ImportedGame, now: DateTime<Utc>) -> bool {
        if game.storefront != Storefront::Steam || game.deleted_at.is_some() {
            return false;
        }

        if let Some(search) = &self.search {
            if !game.name.to_lowercase().contains(&search.to_lowercase()) {
                return false;
            }
        }

        let played = game.playtime_total;
        let status_ok = match self.playtime_status {
            PlaytimeStatus::All => true,
            PlaytimeStatus::Played => played > 0,
            PlaytimeStatus::NeverPlayed => played == 0,
        };
        if !status_ok {
            return false;
        }

        if let Some((lower, upper)) = self.playtime_range.bounds() {
            if played < lower || upper.is_some_and(|upper| played >= upper) {
                return false;
            }
        }

        if let Some(minutes) = self.platform.minutes(game) {
            if minutes <= 0 {
                return false;
            }
        }

        match (self.last_played, game.last_played_at) {
            (LastPlayed::All, _) => true,
            (LastPlayed::Never, last) => last.is_none(),
            (_, None) => false,
            (LastPlayed::Within30Days, Some(at)) => at >= now - Duration::days(30),
            (LastPlayed::WithinYear, Some(at)) => at >= now - Duration::days(365),
            (LastPlayed::OverYear, Some(at)) => at < now - Duration::days(365),
        }
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultPage<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

impl<T> ResultPage<T> {
    pub fn new(items: Vec<T>, total: i64, query: &LibraryQuery) -> Self {
        let limit = i64::from(query.limit);
        Self {
            items,
            total,
            page: query.page,
            limit: query.limit,
            total_pages: (total + limit - 1) / limit,
        }
    }
}

/// Returns one page of the user's imported games. Read-only.
pub async fn list_imported_games(
    store: &dyn LibraryStore,
    user_id: Uuid,
    params: ImportedGamesParams,
) -> AppResult<ResultPage<ImportedGame>> {
    let query = LibraryQuery::from(params);
    let page = store.query_imported_games(user_id, &query, Utc::now()).await?;

    tracing::debug!(
        user_id = %user_id,
        total = page.total,
        page = page.page,
        "Listed imported games"
    );
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MatchStatus, PlatformPlaytime};
    use chrono::TimeZone;

    fn game(name: &str, playtime: i32) -> ImportedGame {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        ImportedGame {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            name: name.to_string(),
            storefront: Storefront::Steam,
            storefront_game_id: name.len().to_string(),
            playtime_total: playtime,
            playtime_per_platform: PlatformPlaytime::default(),
            icon_url: None,
            logo_url: None,
            last_played_at: None,
            match_status: MatchStatus::Pending,
            created_at: created,
            updated_at: created,
            deleted_at: None,
        }
    }

    fn params(query: &str) -> ImportedGamesParams {
        serde_json::from_value(serde_json::json!(query_to_map(query))).unwrap()
    }

    fn query_to_map(query: &str) -> serde_json::Map<String, serde_json::Value> {
        query
            .split('&')
            .filter_map(|kv| kv.split_once('='))
            .map(|(k, v)| {
                let value = match v.parse::<i64>() {
                    Ok(n) if k == "page" || k == "limit" => serde_json::json!(n),
                    _ => serde_json::json!(v),
                };
                (k.to_string(), value)
            })
            .collect()
    }

    #[test]
    fn page_and_limit_are_clamped() {
        let q = LibraryQuery::from(params("page=0&limit=200"));
        assert_eq!((q.page, q.limit), (1, 100));

        let q = LibraryQuery::from(params("page=-4&limit=0"));
        assert_eq!((q.page, q.limit), (1, 1));

        let q = LibraryQuery::default();
        assert_eq!((q.page, q.limit), (1, DEFAULT_PAGE_SIZE));
        assert_eq!(q.sort_by, SortBy::AddedDesc);
    }

    #[test]
    fn enum_values_use_wire_names() {
        let q = LibraryQuery::from(params(
            "playtimeRange=1_to_10h&lastPlayed=over_1_year&platform=linux&sortBy=last_played_desc&playtimeStatus=never_played",
        ));
        assert_eq!(q.playtime_range, PlaytimeRange::From1To10h);
        assert_eq!(q.last_played, LastPlayed::OverYear);
        assert_eq!(q.platform, Platform::Linux);
        assert_eq!(q.sort_by, SortBy::LastPlayedDesc);
        assert_eq!(q.playtime_status, PlaytimeStatus::NeverPlayed);
    }

    #[test]
    fn unknown_enum_value_is_rejected() {
        let result: Result<ImportedGamesParams, _> =
            serde_json::from_value(serde_json::json!({ "platform": "amiga" }));
        assert!(result.is_err());
    }

    #[test]
    fn total_pages_rounds_up_and_is_zero_when_empty() {
        let q = LibraryQuery::from(params("limit=10"));
        assert_eq!(ResultPage::<()>::new(vec![], 0, &q).total_pages, 0);
        assert_eq!(ResultPage::<()>::new(vec![], 10, &q).total_pages, 1);
        assert_eq!(ResultPage::<()>::new(vec![], 11, &q).total_pages, 2);
    }

    #[test]
    fn playtime_range_bounds_are_half_open() {
        let now = Utc::now();
        let q = LibraryQuery::from(params("playtimeRange=1_to_10h"));
        assert!(!q.matches(&game("a", 59), now));
        assert!(q.matches(&game("a", 60), now));
        assert!(q.matches(&game("a", 599), now));
        assert!(!q.matches(&game("a", 600), now));
    }

    #[test]
    fn status_and_range_compose_with_and() {
        let now = Utc::now();
        let q = LibraryQuery::from(params("playtimeStatus=never_played&playtimeRange=over_50h"));
        assert!(!q.matches(&game("a", 0), now));
        assert!(!q.matches(&game("a", 4000), now));
    }

    #[test]
    fn last_played_windows_exclude_nulls_except_never() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let mut recent = game("recent", 10);
        recent.last_played_at = Some(now - Duration::days(3));
        let mut old = game("old", 10);
        old.last_played_at = Some(now - Duration::days(400));
        let never = game("never", 0);

        let within = LibraryQuery::from(params("lastPlayed=30_days"));
        assert!(within.matches(&recent, now));
        assert!(!within.matches(&old, now));
        assert!(!within.matches(&never, now));

        let over = LibraryQuery::from(params("lastPlayed=over_1_year"));
        assert!(!over.matches(&recent, now));
        assert!(over.matches(&old, now));
        assert!(!over.matches(&never, now));

        let none = LibraryQuery::from(params("lastPlayed=never"));
        assert!(none.matches(&never, now));
        assert!(!none.matches(&recent, now));
    }

    #[test]
    fn last_played_sorts_put_nulls_last_both_ways() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut a = game("a", 1);
        a.last_played_at = Some(base);
        let mut b = game("b", 1);
        b.last_played_at = Some(base + Duration::days(1));
        let c = game("c", 0);

        for sort in [SortBy::LastPlayedAsc, SortBy::LastPlayedDesc] {
            let mut games = vec![c.clone(), a.clone(), b.clone()];
            games.sort_by(|x, y| sort.compare(x, y));
            assert_eq!(games[2].name, "c", "{sort:?}");
        }

        let mut games = vec![c.clone(), a.clone(), b.clone()];
        games.sort_by(|x, y| SortBy::LastPlayedDesc.compare(x, y));
        let names: Vec<_> = games.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, ["b", "a", "c"]);
    }

    #[test]
    fn name_sorts_are_bytewise_in_memory_and_in_sql() {
        let mut games = vec![game("cherry", 0), game("apple", 0), game("Banana", 0)];
        games.sort_by(|x, y| SortBy::NameAsc.compare(x, y));
        let names: Vec<_> = games.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, ["Banana", "apple", "cherry"]);

        let q = LibraryQuery::from(params("sortBy=name_desc"));
        let qb = q.page_sql(Uuid::nil(), Utc::now());
        assert!(qb.sql().contains(r#"ORDER BY name COLLATE "C" DESC, id ASC"#), "{}", qb.sql());
    }

    #[test]
    fn live_steam_records_are_the_only_candidates() {
        let now = Utc::now();
        let q = LibraryQuery::default();
        let qb = q.count_sql(Uuid::nil(), now);
        assert!(qb.sql().contains("AND storefront = $2 AND deleted_at IS NULL"), "{}", qb.sql());

        let live = game("Portal", 10);
        assert!(q.matches(&live, now));
        let dismissed = ImportedGame {
            deleted_at: Some(now),
            ..live
        };
        assert!(!q.matches(&dismissed, now));
    }

    #[test]
    fn search_is_escaped_and_case_insensitive_in_sql() {
        let q = LibraryQuery::from(params("search=100%_done"));
        let qb = q.count_sql(Uuid::nil(), Utc::now());
        let sql = qb.sql();
        assert!(sql.contains("name ILIKE $3 ESCAPE '\\'"), "{sql}");
        assert_eq!(escape_like("100%_done"), r"100\%\_done");

        assert!(LibraryQuery::from(params("search=zelda"))
            .matches(&game("The Legend of ZELDA", 0), Utc::now()));
    }

    #[test]
    fn page_sql_orders_and_paginates() {
        let q = LibraryQuery::from(params(
            "page=3&limit=10&platform=mac&playtimeRange=over_50h&sortBy=last_played_asc",
        ));
        assert_eq!(q.offset(), 20);

        let qb = q.page_sql(Uuid::nil(), Utc::now());
        let sql = qb.sql();
        assert!(sql.starts_with("SELECT id, user_id, name"), "{sql}");
        assert!(sql.contains("deleted_at IS NULL"));
        assert!(sql.contains("AND playtime >= $3"));
        assert!(!sql.contains("playtime <"));
        assert!(sql.contains("AND playtime_mac > 0"));
        assert!(
            sql.ends_with("ORDER BY last_played_at ASC NULLS LAST, id ASC LIMIT $4 OFFSET $5"),
            "{sql}"
        );
    }
}
