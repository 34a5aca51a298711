use serde::Serialize;

use crate::error::AppError;

const VERIFICATION_EMAIL_TEMPLATE: &str = r#"
<div style="font-family: sans-serif; max-width: 480px; margin: 0 auto;">
  <h2 style="color: #6366f1;">Verify your PayZen account</h2>
  <p>Hi {name},</p>
  <p>Use the code below to verify your email address. It expires in one hour.</p>
  <p style="font-size: 32px; letter-spacing: 8px; font-weight: bold;">{code}</p>
  <p>Enter it at <a href="{verify_url}">{verify_url}</a>.</p>
  <p style="color: #9ca3af; font-size: 12px;">If you did not create a PayZen account, you can ignore this email.</p>
</div>
"#;

#[derive(Clone)]
pub struct EmailClient {
    http_client: reqwest::Client,
    base_url: String,
    sender: String,
    client_url: String,
}

#[derive(Serialize)]
struct SendEmailRequest {
    from: String,
    to: String,
    subject: String,
    html: String,
}

impl EmailClient {
    pub fn new(
        base_url: String,
        sender: String,
        client_url: String,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            http_client,
            base_url,
            sender,
            client_url,
        }
    }

    /// Deliver a verification code to a new or unverified account.
    ///
    /// Delivery failure is fatal for the triggering request: an account
    /// nobody can verify is worse than a failed registration.
    pub async fn send_verification_email(
        &self,
        recipient: &str,
        code: &str,
        name: &str,
    ) -> Result<(), AppError> {
        let url = format!("{}/email", self.base_url);
        let verify_url = format!("{}/verify-email", self.client_url);
        let html = VERIFICATION_EMAIL_TEMPLATE
            .replace("{name}", name)
            .replace("{code}", code)
            .replace("{verify_url}", &verify_url);

        let request = SendEmailRequest {
            from: self.sender.clone(),
            to: recipient.to_string(),
            subject: "Verify your PayZen account".to_string(),
            html,
        };

        self.http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send email: {}", e);
                AppError::Email(format!("Failed to send email: {}", e))
            })?
            .error_for_status()
            .map_err(|e| {
                tracing::error!("Email service returned error: {}", e);
                AppError::Email(format!("Email service error: {}", e))
            })?;

        tracing::info!(recipient = %recipient, "Verification email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_placeholders_filled() {
        let html = VERIFICATION_EMAIL_TEMPLATE
            .replace("{name}", "Ada")
            .replace("{code}", "123456")
            .replace("{verify_url}", "https://app.payzen.test/verify-email");

        assert!(html.contains("Ada"));
        assert!(html.contains("123456"));
        assert!(!html.contains("{name}"));
        assert!(!html.contains("{code}"));
        assert!(!html.contains("{verify_url}"));
    }
}
