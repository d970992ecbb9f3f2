//! SMTP メール送信実装
//!
//! lettre の `AsyncSmtpTransport` を使用してメールを送信する。
//! ポート 465 は暗黙の TLS、それ以外は STARTTLS を試みる（サーバーが対応していれば）。

use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport,
    AsyncTransport,
    Message,
    Tokio1Executor,
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
};
use pingmailer_domain::notification::{DeliveryError, SmtpSettings};

use super::MailTransport;

/// 暗黙の TLS（SMTPS）で接続するポート
const IMPLICIT_TLS_PORT: u16 = 465;

/// 接続・コマンドのタイムアウト
pub const DEFAULT_SMTP_TIMEOUT: Duration = Duration::from_secs(2);

/// SMTP メール送信
#[derive(Debug, Clone)]
pub struct SmtpMailTransport {
    timeout: Duration,
}

impl SmtpMailTransport {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_SMTP_TIMEOUT,
        }
    }

    fn build_transport(
        &self,
        smtp: &SmtpSettings,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, DeliveryError> {
        let tls_parameters = TlsParameters::new(smtp.host.clone())
            .map_err(|e| DeliveryError::Transport(format!("TLS 設定の構築に失敗: {e}")))?;
        let tls = if smtp.port == IMPLICIT_TLS_PORT {
            Tls::Wrapper(tls_parameters)
        } else {
            Tls::Opportunistic(tls_parameters)
        };

        Ok(
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.host)
                .port(smtp.port)
                .tls(tls)
                .credentials(Credentials::new(
                    smtp.username.clone(),
                    smtp.password.clone(),
                ))
                .timeout(Some(self.timeout))
                .build(),
        )
    }
}

impl Default for SmtpMailTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(&self, smtp: &SmtpSettings, message: &Message) -> Result<(), DeliveryError> {
        let transport = self.build_transport(smtp)?;

        transport
            .send(message.clone())
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        Ok(())
    }
}
