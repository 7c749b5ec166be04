#[derive(Clone)]
pub struct Config {
    pub port: u16,

    pub jwt_secret: String,
    pub access_token_ttl_seconds: u64,
    pub refresh_token_ttl_seconds: u64,
    pub rotate_refresh_tokens: bool,

    pub verify_email_token_ttl_seconds: u64,
    pub reset_token_ttl_seconds: u64,

    // Provider verification endpoints are overridable so local stacks can
    // point them at a mock.
    pub google_api_base: String,
    pub facebook_api_base: String,
    pub github_api_base: String,
    pub provider_timeout_seconds: u64,

    // Optional email delivery (cold-start friendly). When set, registration
    // and password reset send mail via SMTP or Resend.
    pub email_from: Option<String>,
    pub email_provider: Option<String>,
    pub verify_email_url_base: Option<String>,
    pub reset_password_url_base: Option<String>,
    pub resend_api_key: Option<String>,

    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_starttls: bool,
}
