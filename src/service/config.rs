use std::{env, sync::Arc};

use crate::config::Config;

pub trait ConfigService: Send + Sync {
    fn port(&self) -> u16;
    fn values(&self) -> &Config;
}

pub struct ConfigServiceImpl {
    config: Arc<Config>,
}

impl ConfigServiceImpl {
    fn strip_wrapping_quotes(value: &str) -> &str {
        if value.len() >= 2 {
            let bytes = value.as_bytes();
            let first = bytes[0];
            let last = bytes[value.len() - 1];
            if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
                return &value[1..value.len() - 1];
            }
        }
        value
    }

    fn env_nonempty(key: &str) -> Option<String> {
        env::var(key).ok().and_then(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return None;
            }
            let normalized = Self::strip_wrapping_quotes(trimmed).trim();
            if normalized.is_empty() {
                None
            } else {
                Some(normalized.to_string())
            }
        })
    }

    fn env_u16(key: &str) -> Option<u16> {
        Self::env_nonempty(key).and_then(|value| value.parse::<u16>().ok())
    }

    fn env_u64(key: &str) -> Option<u64> {
        Self::env_nonempty(key).and_then(|value| value.parse::<u64>().ok())
    }

    fn env_bool(key: &str, default: bool) -> bool {
        Self::env_nonempty(key)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(default)
    }

    fn env_lower_nonempty(key: &str) -> Option<String> {
        Self::env_nonempty(key).map(|value| value.to_ascii_lowercase())
    }

    pub fn new() -> Self {
        let port = Self::env_u16("PORT").unwrap_or(3333);

        let jwt_secret = Self::env_nonempty("JWT_SECRET").expect("JWT_SECRET is not set");
        let access_token_ttl_seconds =
            Self::env_u64("ACCESS_TOKEN_TTL_SECONDS").unwrap_or(60 * 60);
        let refresh_token_ttl_seconds =
            Self::env_u64("REFRESH_TOKEN_TTL_SECONDS").unwrap_or(60 * 60 * 24 * 7);
        let rotate_refresh_tokens = Self::env_bool("ROTATE_REFRESH_TOKENS", true);

        let verify_email_token_ttl_seconds =
            Self::env_u64("VERIFY_EMAIL_TOKEN_TTL_SECONDS").unwrap_or(60 * 60 * 24);
        let reset_token_ttl_seconds = Self::env_u64("RESET_TOKEN_TTL_SECONDS").unwrap_or(60 * 60);

        let google_api_base = Self::env_nonempty("SOCIAL_GOOGLE_API_BASE")
            .unwrap_or_else(|| "https://www.googleapis.com".to_string());
        let facebook_api_base = Self::env_nonempty("SOCIAL_FACEBOOK_API_BASE")
            .unwrap_or_else(|| "https://graph.facebook.com".to_string());
        let github_api_base = Self::env_nonempty("SOCIAL_GITHUB_API_BASE")
            .unwrap_or_else(|| "https://api.github.com".to_string());
        let provider_timeout_seconds = Self::env_u64("SOCIAL_PROVIDER_TIMEOUT_SECONDS").unwrap_or(10);

        let email_from = Self::env_nonempty("EMAIL_FROM");
        let email_provider = Self::env_lower_nonempty("EMAIL_PROVIDER");
        let verify_email_url_base = Self::env_nonempty("VERIFY_EMAIL_URL_BASE");
        let reset_password_url_base = Self::env_nonempty("RESET_PASSWORD_URL_BASE");
        let resend_api_key = Self::env_nonempty("RESEND_API_KEY");
        let smtp_host = Self::env_nonempty("SMTP_HOST");
        let smtp_port = Self::env_u16("SMTP_PORT");
        let smtp_username = Self::env_nonempty("SMTP_USERNAME");
        let smtp_password = Self::env_nonempty("SMTP_PASSWORD");
        let smtp_starttls = Self::env_bool("SMTP_STARTTLS", false);

        Self {
            config: Arc::new(Config {
                port,
                jwt_secret,
                access_token_ttl_seconds,
                refresh_token_ttl_seconds,
                rotate_refresh_tokens,
                verify_email_token_ttl_seconds,
                reset_token_ttl_seconds,
                google_api_base,
                facebook_api_base,
                github_api_base,
                provider_timeout_seconds,
                email_from,
                email_provider,
                verify_email_url_base,
                reset_password_url_base,
                resend_api_key,
                smtp_host,
                smtp_port,
                smtp_username,
                smtp_password,
                smtp_starttls,
            }),
        }
    }
}

impl ConfigService for ConfigServiceImpl {
    fn port(&self) -> u16 {
        self.config.port
    }

    fn values(&self) -> &Config {
        &self.config
    }
}
