pub mod health;
pub mod imported_games;
pub mod steam;
