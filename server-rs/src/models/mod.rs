pub mod imported_game;
pub mod user;

pub use imported_game::*;
pub use user::*;
