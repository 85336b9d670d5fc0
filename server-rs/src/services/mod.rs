pub mod imported_games;
pub mod library_query;
pub mod library_sync;
pub mod steam_client;
pub mod steam_link;
