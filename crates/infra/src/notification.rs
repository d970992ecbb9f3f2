//! # メール配送
//!
//! レンダリング済みの通知メールを SMTP で配送するインフラストラクチャモジュール。
//!
//! ## 設計方針
//!
//! - **trait による抽象化**: `MailTransport` trait で「接続して送る」能力だけを抽象化し、
//!   メッセージの組み立てとリトライは [`DeliveryEngine`] が持つ
//! - **2 つの実装**: SMTP（lettre）、Noop（開発用。ログ出力のみ）
//! - **SMTP 設定はリクエストごと**: 接続先は呼び出し元が指定するため、
//!   トランスポートは送信のたびに組み立てる

mod delivery;
mod noop;
mod smtp;

use async_trait::async_trait;
pub use delivery::{DeliveryEngine, RetryPolicy, compose_message};
use lettre::Message;
pub use noop::NoopMailTransport;
use pingmailer_domain::notification::{DeliveryError, SmtpSettings};
pub use smtp::SmtpMailTransport;

/// メール送信トレイト
///
/// 1 回の呼び出しが 1 回の送信試行に対応する。リトライは呼び出し側の責務。
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// `smtp` に接続して組み立て済みのメッセージを送信する
    async fn send(&self, smtp: &SmtpSettings, message: &Message) -> Result<(), DeliveryError>;
}
