pub mod accounts;
pub mod one_time_tokens;
pub mod refresh_tokens;
pub mod social_accounts;
