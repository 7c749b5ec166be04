use reqwest::StatusCode;
use serde::Deserialize;
use std::{env, time::Duration};
use tokio::time::sleep;
use uuid::Uuid;

#[derive(Deserialize)]
struct UserBody {
    id: String,
    email: String,
    username: Option<String>,
    first_name: Option<String>,
    is_active: bool,
    email_verified: bool,
    updated_by_email: Option<String>,
}

#[derive(Deserialize)]
struct AuthTokensBody {
    access: String,
    refresh: String,
    user: UserBody,
}

#[derive(Deserialize)]
struct RefreshBody {
    access: String,
    refresh: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
    errors: serde_json::Value,
}

// Black-box flow against a running stack; enable with RUN_SMOKE_AUTH=1.
#[tokio::test]
async fn smoke_account_flow() {
    dotenvy::dotenv().ok();

    let run_smoke = env::var("RUN_SMOKE_AUTH")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if !run_smoke {
        eprintln!("skipping smoke_account_flow (set RUN_SMOKE_AUTH=1 to enable)");
        return;
    }

    let base_url = env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:3333".to_string());
    let retries: usize = env::var("SMOKE_AUTH_RETRIES")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(30);
    let retry_delay_ms: u64 = env::var("SMOKE_AUTH_RETRY_DELAY_MS")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(300);

    let client = reqwest::Client::new();
    wait_for_health(&client, &base_url, retries, retry_delay_ms).await;

    let email = format!("smoke+{}@example.com", Uuid::new_v4().simple());
    let password = "Aa1!aaaa";

    // Register: 201 with tokens and the user projection.
    let register = client
        .post(format!("{}/api/v1/auth/register", base_url))
        .json(&serde_json::json!({
            "email": email,
            "password": password,
            "password2": password,
        }))
        .send()
        .await
        .expect("register request failed");
    assert_eq!(register.status(), StatusCode::CREATED);
    let register_body: AuthTokensBody = register.json().await.expect("register json");
    assert_eq!(register_body.user.email, email);
    assert!(register_body.user.is_active);
    assert!(!register_body.user.email_verified);
    assert!(register_body.user.username.is_some());
    assert!(!register_body.access.is_empty());
    assert!(!register_body.refresh.is_empty());

    // Duplicate registration is a 400 keyed on the email field.
    let duplicate = client
        .post(format!("{}/api/v1/auth/register", base_url))
        .json(&serde_json::json!({
            "email": email,
            "password": password,
            "password2": password,
        }))
        .send()
        .await
        .expect("duplicate register request failed");
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);
    let duplicate_body: ErrorBody = duplicate.json().await.expect("duplicate json");
    assert!(duplicate_body.errors.get("email").is_some());

    // Wrong password and unknown email produce the same envelope.
    let wrong_password = login_error(&client, &base_url, &email, "Wrong1!aa").await;
    let unknown_email = login_error(
        &client,
        &base_url,
        &format!("ghost+{}@example.com", Uuid::new_v4().simple()),
        password,
    )
    .await;
    assert_eq!(wrong_password.0, StatusCode::BAD_REQUEST);
    assert_eq!(wrong_password.0, unknown_email.0);
    assert_eq!(wrong_password.1.message, unknown_email.1.message);

    // Credential login succeeds and the access token opens the profile.
    let login = client
        .post(format!("{}/api/v1/auth/login", base_url))
        .json(&serde_json::json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("login request failed");
    assert_eq!(login.status(), StatusCode::OK);
    let login_body: AuthTokensBody = login.json().await.expect("login json");
    assert_eq!(login_body.user.id, register_body.user.id);

    // Unauthenticated profile access is a 401.
    let anonymous = client
        .get(format!("{}/api/v1/auth/profile", base_url))
        .send()
        .await
        .expect("anonymous profile request failed");
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let profile = client
        .get(format!("{}/api/v1/auth/profile", base_url))
        .bearer_auth(&login_body.access)
        .send()
        .await
        .expect("profile request failed");
    assert_eq!(profile.status(), StatusCode::OK);
    let profile_body: UserBody = profile.json().await.expect("profile json");
    assert_eq!(profile_body.email, email);

    // Partial update sets the field and attributes the change to the account
    // itself.
    let update = client
        .patch(format!("{}/api/v1/auth/profile", base_url))
        .bearer_auth(&login_body.access)
        .json(&serde_json::json!({ "first_name": "B" }))
        .send()
        .await
        .expect("profile update request failed");
    assert_eq!(update.status(), StatusCode::OK);
    let update_body: UserBody = update.json().await.expect("update json");
    assert_eq!(update_body.first_name.as_deref(), Some("B"));
    assert_eq!(update_body.updated_by_email.as_deref(), Some(email.as_str()));

    // Refresh rotates: the new pair works, the old refresh token is dead.
    let refreshed = client
        .post(format!("{}/api/v1/auth/token/refresh", base_url))
        .json(&serde_json::json!({ "refresh": login_body.refresh }))
        .send()
        .await
        .expect("refresh request failed");
    assert_eq!(refreshed.status(), StatusCode::OK);
    let refreshed_body: RefreshBody = refreshed.json().await.expect("refresh json");
    assert!(!refreshed_body.access.is_empty());
    let rotated = refreshed_body.refresh.expect("rotation enabled by default");

    let replay = client
        .post(format!("{}/api/v1/auth/token/refresh", base_url))
        .json(&serde_json::json!({ "refresh": login_body.refresh }))
        .send()
        .await
        .expect("replayed refresh request failed");
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);

    // Logout revokes, and the revoked token cannot refresh again.
    let logout = client
        .post(format!("{}/api/v1/auth/logout", base_url))
        .bearer_auth(&refreshed_body.access)
        .json(&serde_json::json!({ "refresh": rotated }))
        .send()
        .await
        .expect("logout request failed");
    assert_eq!(logout.status(), StatusCode::OK);

    let after_logout = client
        .post(format!("{}/api/v1/auth/token/refresh", base_url))
        .json(&serde_json::json!({ "refresh": rotated }))
        .send()
        .await
        .expect("refresh after logout request failed");
    assert_eq!(after_logout.status(), StatusCode::UNAUTHORIZED);

    // Missing refresh token on logout is a 400, not a 401.
    let missing = client
        .post(format!("{}/api/v1/auth/logout", base_url))
        .bearer_auth(&refreshed_body.access)
        .json(&serde_json::json!({}))
        .send()
        .await
        .expect("logout without token request failed");
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
}

async fn login_error(
    client: &reqwest::Client,
    base_url: &str,
    email: &str,
    password: &str,
) -> (StatusCode, ErrorBody) {
    let response = client
        .post(format!("{}/api/v1/auth/login", base_url))
        .json(&serde_json::json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("login request failed");
    let status = response.status();
    let body: ErrorBody = response.json().await.expect("login error json");
    (status, body)
}

async fn wait_for_health(client: &reqwest::Client, base_url: &str, retries: usize, delay_ms: u64) {
    let url = format!("{}/api/v1/health", base_url);
    for attempt in 0..retries {
        match client.get(&url).send().await {
            Ok(response) if response.status() == StatusCode::OK => return,
            _ => {
                if attempt + 1 >= retries {
                    panic!(
                        "service not ready after {} attempts (base_url={})",
                        retries, base_url
                    );
                }
                sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
