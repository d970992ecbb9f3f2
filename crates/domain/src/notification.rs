//! # 通知
//!
//! 通知リクエストの検証からメール配送までのドメインモデルを定義する。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 | 説明 |
//! |---|------------|------|
//! | [`SmtpSettings`] | SMTP 接続設定 | リクエストごとに呼び出し元が指定する配送先サーバー |
//! | [`TemplateContext`] | デフォルトコンテキスト | `{name, email, appName}` |
//! | [`TemplateBlock`] | テンプレートブロック | subject / plainBody / htmlBody の 3 つ |
//! | [`RenderedMessage`] | レンダリング結果 | 3 ブロックの出力。配送後に破棄される |
//! | [`EmailMessage`] | 送信メール | 送信元・宛先とレンダリング結果の組 |
//!
//! ## 設計方針
//!
//! - **エラーは層ごとに分離**: リクエスト検証 / テンプレート / 配送でエラー型を分け、
//!   HTTP ステータスへの対応をアプリ側で一意に決められるようにする
//! - **SMTP パスワードは Debug 出力しない**

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;
use thiserror::Error;

/// メールアドレス形式を検証するフィールド
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum EmailField {
    SmtpSender,
    RecipientEmail,
}

impl EmailField {
    fn message_prefix(self) -> &'static str {
        match self {
            Self::SmtpSender => "Invalid smtp_sender email format",
            Self::RecipientEmail => "Invalid recipient_email format",
        }
    }
}

/// 通知リクエストの検証エラー（400）
///
/// Display の文字列がそのままレスポンスの detail になる。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// JSON としてデコードできない
    #[error("Invalid request body: {0}")]
    Decode(String),

    /// 必須フィールドが空
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// メールアドレスとして解釈できない
    #[error("{}: {reason}", .field.message_prefix())]
    InvalidEmailFormat { field: EmailField, reason: String },
}

/// テンプレートブロック
///
/// テンプレートソースはこの 3 つのブロックをすべて定義しなければならない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr, strum::Display)]
#[strum(serialize_all = "camelCase")]
pub enum TemplateBlock {
    Subject,
    PlainBody,
    HtmlBody,
}

impl TemplateBlock {
    pub const ALL: [TemplateBlock; 3] = [Self::Subject, Self::PlainBody, Self::HtmlBody];

    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// テンプレートエラー（500）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// ソースの構文エラー、または必須ブロックの欠落
    #[error("template parse error: {0}")]
    Parse(String),

    /// ブロックの実行に失敗（未定義の変数を参照した等）
    #[error("template execution error in block {block}: {reason}")]
    Execution {
        block:  TemplateBlock,
        reason: String,
    },
}

/// 配送エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// メッセージを組み立てられない（アドレス不正など）。リトライしない
    #[error("failed to compose message: {0}")]
    Compose(String),

    /// SMTP の接続・送信に失敗
    #[error("SMTP transport failure: {0}")]
    Transport(String),

    /// リトライ上限に達した。`last` は最後の試行のエラー
    #[error("delivery failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last:     Box<DeliveryError>,
    },
}

/// SMTP 接続設定
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host:     String,
    pub port:     u16,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// デフォルトのテンプレートコンテキスト
///
/// 組み込みテンプレート、およびデータ指定のないカスタムテンプレートに渡される。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateContext {
    pub name:     String,
    pub email:    String,
    pub app_name: String,
}

/// テンプレートのレンダリング結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject:    String,
    pub plain_body: String,
    pub html_body:  String,
}

/// 送信メール
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// 送信元メールアドレス
    pub from:    String,
    /// 送信先メールアドレス
    pub to:      String,
    pub content: RenderedMessage,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_request_errorのメッセージがフィールド名を含む() {
        assert_eq!(
            RequestError::MissingField("smtp_host").to_string(),
            "Missing required field: smtp_host"
        );
        assert_eq!(
            RequestError::InvalidEmailFormat {
                field:  EmailField::SmtpSender,
                reason: "missing '@'".to_string(),
            }
            .to_string(),
            "Invalid smtp_sender email format: missing '@'"
        );
        assert_eq!(
            RequestError::InvalidEmailFormat {
                field:  EmailField::RecipientEmail,
                reason: "missing '@'".to_string(),
            }
            .to_string(),
            "Invalid recipient_email format: missing '@'"
        );
    }

    #[test]
    fn test_template_blockの名前はcamel_caseになる() {
        let names: Vec<&str> = TemplateBlock::ALL.iter().map(|b| b.name()).collect();

        assert_eq!(names, vec!["subject", "plainBody", "htmlBody"]);
    }

    #[test]
    fn test_template_contextはapp_nameをcamel_caseでシリアライズする() {
        let context = TemplateContext {
            name:     "User".to_string(),
            email:    "a@b.com".to_string(),
            app_name: "Application".to_string(),
        };

        assert_eq!(
            serde_json::to_value(&context).unwrap(),
            serde_json::json!({"name": "User", "email": "a@b.com", "appName": "Application"})
        );
    }

    #[test]
    fn test_smtp_settingsのdebugはパスワードを伏せる() {
        let settings = SmtpSettings {
            host:     "smtp.example.com".to_string(),
            port:     587,
            username: "mailer".to_string(),
            password: "hunter2".to_string(),
        };

        let debug = format!("{settings:?}");

        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("smtp.example.com"));
    }

    #[test]
    fn test_exhaustedは最後のエラーをsourceとして保持する() {
        let error = DeliveryError::Exhausted {
            attempts: 3,
            last:     Box::new(DeliveryError::Transport("connection refused".to_string())),
        };

        assert_eq!(
            error.to_string(),
            "delivery failed after 3 attempts: SMTP transport failure: connection refused"
        );
        assert!(std::error::Error::source(&error).is_some());
    }
}
