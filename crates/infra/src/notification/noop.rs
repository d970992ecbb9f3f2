//! Noop メール送信実装
//!
//! メールを実際に送信せず、ログ出力のみ行う。
//! `MAIL_TRANSPORT=noop` で SMTP サーバーなしに動作確認するときに使用する。

use async_trait::async_trait;
use lettre::Message;
use pingmailer_domain::notification::{DeliveryError, SmtpSettings};

use super::MailTransport;

/// Noop メール送信（ログ出力のみ）
#[derive(Debug, Clone, Default)]
pub struct NoopMailTransport;

#[async_trait]
impl MailTransport for NoopMailTransport {
    async fn send(&self, smtp: &SmtpSettings, message: &Message) -> Result<(), DeliveryError> {
        let to = message
            .envelope()
            .to()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");

        tracing::info!(
            smtp.host = %smtp.host,
            smtp.port = smtp.port,
            to = %to,
            "Noop: メール送信をスキップ"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pingmailer_domain::notification::{EmailMessage, RenderedMessage};

    use super::*;
    use crate::notification::compose_message;

    #[tokio::test]
    async fn test_sendがエラーを返さない() {
        let smtp = SmtpSettings {
            host:     "smtp.example.com".to_string(),
            port:     587,
            username: "user".to_string(),
            password: "pass".to_string(),
        };
        let message = compose_message(&EmailMessage {
            from:    "sender@example.com".to_string(),
            to:      "rcpt@example.com".to_string(),
            content: RenderedMessage {
                subject:    "テスト件名".to_string(),
                plain_body: "テスト".to_string(),
                html_body:  "<p>テスト</p>".to_string(),
            },
        })
        .unwrap();

        let result = NoopMailTransport.send(&smtp, &message).await;

        assert!(result.is_ok());
    }
}
