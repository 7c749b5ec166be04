pub mod accounts;
pub mod auth;
pub mod config;
pub mod email;
pub mod passwords;
pub mod social;
pub mod tokens;
pub mod verification;
