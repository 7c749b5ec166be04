use lettre::{
    message::{header, Mailbox, Message},
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};
use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use uuid::Uuid;

use crate::config::Config;

#[derive(Serialize)]
struct ResendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
}

fn build_link_email_html(heading: &str, lead: &str, url: &str) -> String {
    format!(
        concat!(
            "<div style=\"font-family:ui-sans-serif,system-ui,-apple-system,Segoe UI,Roboto,Helvetica,Arial;line-height:1.5\">",
            "<h2 style=\"margin:0 0 12px\">{heading}</h2>",
            "<p style=\"margin:0 0 12px\">{lead}</p>",
            "<p style=\"margin:0 0 12px\"><a href=\"{url}\">{url}</a></p>",
            "<p style=\"margin:18px 0 0;color:#666;font-size:12px\">If you did not request this, you can ignore this email.</p>",
            "</div>"
        ),
        heading = heading,
        lead = lead,
        url = url
    )
}

/// Best-effort delivery of the email-verification link. A missing sender or
/// URL base silently skips delivery so local stacks keep working.
pub async fn try_send_verification_email(
    cfg: &Config,
    to: &str,
    verify_token: &str,
) -> Result<(), String> {
    let (Some(from), Some(url_base)) = (
        cfg.email_from.as_deref(),
        cfg.verify_email_url_base.as_deref(),
    ) else {
        return Ok(());
    };
    let verify_url = format!(
        "{}?token={}",
        url_base.trim_end_matches('/'),
        urlencoding::encode(verify_token)
    );
    let html = build_link_email_html(
        "Verify your email",
        "Click this link to verify your email:",
        &verify_url,
    );
    dispatch(cfg, from, to, "Verify your email", &html).await
}

/// Best-effort delivery of the password-reset link (uid + single-use token).
pub async fn try_send_reset_email(
    cfg: &Config,
    to: &str,
    account_uid: Uuid,
    reset_token: &str,
) -> Result<(), String> {
    let (Some(from), Some(url_base)) = (
        cfg.email_from.as_deref(),
        cfg.reset_password_url_base.as_deref(),
    ) else {
        return Ok(());
    };
    let reset_url = format!(
        "{}?uid={}&token={}",
        url_base.trim_end_matches('/'),
        account_uid,
        urlencoding::encode(reset_token)
    );
    let html = build_link_email_html(
        "Reset your password",
        "Click this link to choose a new password:",
        &reset_url,
    );
    dispatch(cfg, from, to, "Reset your password", &html).await
}

async fn dispatch(
    cfg: &Config,
    from: &str,
    to: &str,
    subject: &str,
    html: &str,
) -> Result<(), String> {
    let provider = cfg.email_provider.as_deref().unwrap_or("auto");
    match provider {
        "smtp" => {
            let (Some(host), Some(port)) = (cfg.smtp_host.as_deref(), cfg.smtp_port) else {
                return Err("EMAIL_PROVIDER=smtp but SMTP_HOST/SMTP_PORT are missing".to_string());
            };
            send_smtp(cfg, host, port, from, to, subject, html).await
        }
        "resend" => {
            let Some(api_key) = cfg.resend_api_key.as_deref() else {
                return Err("EMAIL_PROVIDER=resend but RESEND_API_KEY is missing".to_string());
            };
            send_resend(api_key, from, to, subject, html).await
        }
        "auto" => {
            if let (Some(host), Some(port)) = (cfg.smtp_host.as_deref(), cfg.smtp_port) {
                return send_smtp(cfg, host, port, from, to, subject, html).await;
            }
            if let Some(api_key) = cfg.resend_api_key.as_deref() {
                return send_resend(api_key, from, to, subject, html).await;
            }
            Ok(())
        }
        other => Err(format!(
            "unsupported EMAIL_PROVIDER={}, expected smtp|resend|auto",
            other
        )),
    }
}

async fn send_resend(
    api_key: &str,
    from: &str,
    to: &str,
    subject: &str,
    html: &str,
) -> Result<(), String> {
    let client = reqwest::Client::new();

    let payload = ResendEmailRequest {
        from,
        to: vec![to],
        subject,
        html,
    };

    let res = client
        .post("https://api.resend.com/emails")
        .header("Authorization", format!("Bearer {}", api_key))
        .json(&payload)
        .send()
        .await
        .map_err(|err| format!("resend request failed: {}", err))?;

    if res.status() == StatusCode::OK || res.status() == StatusCode::CREATED {
        return Ok(());
    }

    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    Err(format!("resend returned {}: {}", status, body))
}

async fn send_smtp(
    cfg: &Config,
    host: &str,
    port: u16,
    from: &str,
    to: &str,
    subject: &str,
    html: &str,
) -> Result<(), String> {
    let from: Mailbox = from
        .parse()
        .map_err(|err| format!("invalid EMAIL_FROM: {}", err))?;
    let to: Mailbox = to
        .parse()
        .map_err(|err| format!("invalid recipient email: {}", err))?;

    let msg = Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .header(header::ContentType::TEXT_HTML)
        .body(html.to_string())
        .map_err(|err| format!("build message failed: {}", err))?;

    let mut builder = if cfg.smtp_starttls {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|err| format!("smtp transport init failed: {}", err))?
            .port(port)
            .timeout(Some(Duration::from_secs(10)))
    } else {
        // Mailpit (local/CI) uses plain SMTP by default.
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(port)
            .timeout(Some(Duration::from_secs(10)))
    };

    if let (Some(username), Some(password)) = (cfg.smtp_username.as_deref(), cfg.smtp_password.as_deref()) {
        builder = builder.credentials(lettre::transport::smtp::authentication::Credentials::new(
            username.to_string(),
            password.to_string(),
        ));
    }

    let transport = builder.build();
    transport
        .send(msg)
        .await
        .map_err(|err| format!("smtp send failed: {}", err))?;

    Ok(())
}
