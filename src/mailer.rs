//! Email transport.
//!
//! Defines the [`Mailer`] trait and two implementations:
//! - **[`MailjetMailer`]**: sends through the Mailjet Send API v3.1.
//! - **[`LogMailer`]**: writes the email to the log instead of sending it.
//!
//! Bodies arrive fully rendered; escaping and highlighting happen in
//! [`crate::render`].

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::config::{MailjetCredentials, NotifyConfig, Transport};

const MAILJET_SEND_URL: &str = "https://api.mailjet.com/v3.1/send";

/// A rendered HTML email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub to_email: String,
    pub to_name: String,
    pub from_email: String,
    pub from_name: String,
    pub subject: String,
    pub html: String,
}

impl Email {
    /// Address an email to the configured recipient from the configured
    /// contact.
    pub fn from_notify(notify: &NotifyConfig, subject: impl Into<String>, html: String) -> Self {
        Self {
            to_email: notify.recipient().to_string(),
            to_name: notify.recipient_name().to_string(),
            from_email: notify.contact_email.clone(),
            from_name: notify.contact_name.clone(),
            subject: subject.into(),
            html,
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Transport name for logs (e.g. `"mailjet"`).
    fn name(&self) -> &str;

    async fn send(&self, email: &Email) -> Result<()>;
}

// ============ Mailjet ============

pub struct MailjetMailer {
    client: reqwest::Client,
    credentials: MailjetCredentials,
    endpoint: String,
}

impl MailjetMailer {
    pub fn new(credentials: MailjetCredentials) -> Result<Self> {
        Self::with_endpoint(credentials, MAILJET_SEND_URL)
    }

    /// Send to a different endpoint (e.g. a local stub).
    pub fn with_endpoint(credentials: MailjetCredentials, endpoint: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            credentials,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl Mailer for MailjetMailer {
    fn name(&self) -> &str {
        "mailjet"
    }

    async fn send(&self, email: &Email) -> Result<()> {
        let resp = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.credentials.api_key, Some(&self.credentials.api_secret))
            .json(&mailjet_payload(email))
            .send()
            .await?;

        let status = resp.status();
        let body: serde_json::Value = if status.is_success() {
            resp.json().await?
        } else {
            let text = resp.text().await.unwrap_or_default();
            bail!("Mailjet API error {}: {}", status, text);
        };

        check_mailjet_response(&body)
    }
}

/// Request body for `POST /v3.1/send`. An empty recipient name is left out.
fn mailjet_payload(email: &Email) -> serde_json::Value {
    let mut to = serde_json::json!({ "Email": email.to_email });
    if !email.to_name.is_empty() {
        to["Name"] = serde_json::Value::from(email.to_name.as_str());
    }
    serde_json::json!({
        "Messages": [{
            "From": { "Email": email.from_email, "Name": email.from_name },
            "To": [to],
            "Subject": email.subject,
            "HTMLPart": email.html,
        }]
    })
}

/// Mailjet answers 200 with a per-message status; anything but `success`
/// is a failure.
fn check_mailjet_response(body: &serde_json::Value) -> Result<()> {
    let messages = body
        .get("Messages")
        .and_then(|m| m.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Mailjet response: missing Messages array"))?;

    for message in messages {
        let status = message
            .get("Status")
            .and_then(|s| s.as_str())
            .unwrap_or("unknown");
        if status != "success" {
            let errors = message.get("Errors").cloned().unwrap_or_default();
            bail!("Mailjet rejected message ({}): {}", status, errors);
        }
    }
    Ok(())
}

// ============ Log ============

/// Logs emails instead of sending them. Used by `--dry-run` and
/// `notify.transport = "log"`.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, email: &Email) -> Result<()> {
        tracing::info!(
            to = %email.to_email,
            subject = %email.subject,
            "email not sent (log transport)"
        );
        tracing::debug!(html = %email.html, "email body");
        Ok(())
    }
}

/// Create the [`Mailer`] selected by `notify.transport`.
pub fn create_mailer(
    transport: Transport,
    mailjet: Option<&MailjetCredentials>,
) -> Result<Box<dyn Mailer>> {
    match transport {
        Transport::Log => Ok(Box::new(LogMailer)),
        Transport::Mailjet => {
            let Some(credentials) = mailjet.cloned() else {
                bail!("mailjet transport selected but no credentials were loaded");
            };
            Ok(Box::new(MailjetMailer::new(credentials)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> Email {
        Email {
            to_email: "to@example.org".into(),
            to_name: "To".into(),
            from_email: "from@example.org".into(),
            from_name: "Site Tracker".into(),
            subject: "New availability".into(),
            html: "<p>hi</p>".into(),
        }
    }

    #[test]
    fn test_mailjet_payload_shape() {
        let payload = mailjet_payload(&email());
        let msg = &payload["Messages"][0];
        assert_eq!(msg["From"]["Email"], "from@example.org");
        assert_eq!(msg["To"][0]["Email"], "to@example.org");
        assert_eq!(msg["HTMLPart"], "<p>hi</p>");
    }

    fn notify(recipient: Option<&str>, recipient_name: Option<&str>) -> NotifyConfig {
        NotifyConfig {
            transport: Transport::Log,
            contact_email: "me@example.org".into(),
            contact_name: "Me".into(),
            recipient: recipient.map(String::from),
            recipient_name: recipient_name.map(String::from),
        }
    }

    #[test]
    fn test_email_to_contact_by_default() {
        let email = Email::from_notify(&notify(None, None), "s", "<p/>".into());
        assert_eq!(email.to_email, "me@example.org");
        assert_eq!(email.to_name, "Me");
        assert_eq!(email.from_name, "Me");
    }

    #[test]
    fn test_separate_recipient_does_not_borrow_contact_name() {
        let email = Email::from_notify(&notify(Some("pat@example.org"), None), "s", "<p/>".into());
        assert_eq!(email.to_email, "pat@example.org");
        assert_eq!(email.to_name, "");

        let payload = mailjet_payload(&email);
        let to = &payload["Messages"][0]["To"][0];
        assert_eq!(to["Email"], "pat@example.org");
        assert!(to.get("Name").is_none());
        assert_eq!(payload["Messages"][0]["From"]["Name"], "Me");

        let email = Email::from_notify(
            &notify(Some("pat@example.org"), Some("Pat")),
            "s",
            "<p/>".into(),
        );
        assert_eq!(mailjet_payload(&email)["Messages"][0]["To"][0]["Name"], "Pat");
    }

    #[test]
    fn test_mailjet_without_credentials_is_error() {
        assert!(create_mailer(Transport::Mailjet, None).is_err());
        assert_eq!(create_mailer(Transport::Log, None).unwrap().name(), "log");
    }

    #[test]
    fn test_mailjet_success_response() {
        let body = serde_json::json!({ "Messages": [{ "Status": "success" }] });
        assert!(check_mailjet_response(&body).is_ok());
    }

    #[test]
    fn test_mailjet_error_response() {
        let body = serde_json::json!({
            "Messages": [{ "Status": "error", "Errors": [{ "ErrorMessage": "bad sender" }] }]
        });
        let err = check_mailjet_response(&body).unwrap_err();
        assert!(err.to_string().contains("bad sender"));
    }

    #[test]
    fn test_mailjet_missing_messages() {
        assert!(check_mailjet_response(&serde_json::json!({})).is_err());
    }

    async fn stub_send(
        headers: axum::http::HeaderMap,
        axum::Json(body): axum::Json<serde_json::Value>,
    ) -> axum::Json<serde_json::Value> {
        let authorized = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("Basic "));
        let has_subject = body["Messages"][0]["Subject"].is_string();
        let status = if authorized && has_subject { "success" } else { "error" };
        axum::Json(serde_json::json!({ "Messages": [{ "Status": status }] }))
    }

    #[tokio::test]
    async fn test_mailjet_send_against_stub() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = axum::Router::new().route("/v3.1/send", axum::routing::post(stub_send));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let credentials = MailjetCredentials {
            api_key: "key".into(),
            api_secret: "secret".into(),
        };
        let mailer =
            MailjetMailer::with_endpoint(credentials, &format!("http://{}/v3.1/send", addr))
                .unwrap();
        mailer.send(&email()).await.unwrap();
    }

    #[tokio::test]
    async fn test_mailjet_http_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = axum::Router::new().route(
            "/v3.1/send",
            axum::routing::post(|| async { (axum::http::StatusCode::UNAUTHORIZED, "bad auth") }),
        );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let credentials = MailjetCredentials {
            api_key: "key".into(),
            api_secret: "wrong".into(),
        };
        let mailer =
            MailjetMailer::with_endpoint(credentials, &format!("http://{}/v3.1/send", addr))
                .unwrap();
        let err = mailer.send(&email()).await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }
}
