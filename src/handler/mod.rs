pub mod auth;
pub mod extract;
pub mod health;
pub mod passwords;
pub mod profile;
pub mod responses;
pub mod social;
pub mod tokens;
