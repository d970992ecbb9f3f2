//! # 配送エンジン
//!
//! レンダリング結果からメッセージを組み立て、固定間隔のリトライ付きで配送する。
//!
//! ## 設計方針
//!
//! - **組み立ては 1 回だけ**: To / From / Subject、プレーンテキスト本文、HTML の代替パート
//! - **リトライ対象は送信のみ**: 組み立てエラーはリトライしても結果が変わらないため即座に返す
//! - **最後の試行の後はスリープしない**

use std::{sync::Arc, time::Duration};

use lettre::{
    Message,
    message::{MultiPart, SinglePart, header::ContentType},
};
use pingmailer_domain::notification::{DeliveryError, EmailMessage, SmtpSettings};

use super::MailTransport;

/// リトライポリシー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最初の試行を含めた試行回数の上限
    pub max_attempts: u32,
    /// 失敗した試行と次の試行の間の待ち時間
    pub backoff:      Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff:      Duration::from_millis(500),
        }
    }
}

/// 送信メールを lettre のメッセージに組み立てる
pub fn compose_message(email: &EmailMessage) -> Result<Message, DeliveryError> {
    let from = email
        .from
        .parse()
        .map_err(|e| DeliveryError::Compose(format!("送信元アドレス不正: {e}")))?;
    let to = email
        .to
        .parse()
        .map_err(|e| DeliveryError::Compose(format!("宛先アドレス不正: {e}")))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(&email.content.subject)
        .multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(email.content.plain_body.clone()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(email.content.html_body.clone()),
                ),
        )
        .map_err(|e| DeliveryError::Compose(format!("メッセージ構築失敗: {e}")))
}

/// 配送エンジン
///
/// `MailTransport` を注入して使う。テストでは常に失敗するトランスポートを渡し、
/// 試行回数とバックオフを検証する。
#[derive(Clone)]
pub struct DeliveryEngine {
    transport: Arc<dyn MailTransport>,
    policy:    RetryPolicy,
}

impl DeliveryEngine {
    pub fn new(transport: Arc<dyn MailTransport>) -> Self {
        Self::with_policy(transport, RetryPolicy::default())
    }

    pub fn with_policy(transport: Arc<dyn MailTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// メールを配送する
    ///
    /// すべての試行が失敗した場合は [`DeliveryError::Exhausted`] に最後のエラーを包んで返す。
    pub async fn deliver(
        &self,
        smtp: &SmtpSettings,
        email: &EmailMessage,
    ) -> Result<(), DeliveryError> {
        let message = compose_message(email)?;
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.transport.send(smtp, &message).await {
                Ok(()) => {
                    tracing::debug!(attempt, to = %email.to, "メール配送成功");
                    return Ok(());
                }
                Err(e) if attempt >= max_attempts => {
                    return Err(DeliveryError::Exhausted {
                        attempts: attempt,
                        last:     Box::new(e),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        error = %e,
                        "メール配送に失敗、リトライします"
                    );
                    tokio::time::sleep(self.policy.backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}
