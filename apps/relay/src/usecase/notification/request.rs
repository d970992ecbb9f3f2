//! # 通知リクエスト
//!
//! `POST /notify` のボディをデコード・検証し、配送に必要な値へ変換する。
//!
//! ## 設計方針
//!
//! - **検証順序は固定**: 必須フィールドは `smtp_host` → `smtp_port` → `smtp_username` →
//!   `smtp_password` → `smtp_sender` → `recipient_email` の順に確認し、最初の欠落だけを報告する
//! - **空文字列・0・null は欠落扱い**: JSON でフィールドを省略した場合と区別しない
//! - **テンプレート選択**: テンプレート指定がなければ組み込みの welcome をデフォルトコンテキストで使う。
//!   カスタムテンプレートは `template_data` が空でなければそれを、空ならデフォルトコンテキストを使う
//! - パスワードを含むため `Debug` は実装しない

use lettre::message::Mailbox;
use pingmailer_domain::notification::{EmailField, RequestError, SmtpSettings, TemplateContext};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use super::template_renderer::{BuiltinTemplate, TemplateData, TemplateSource};

/// `recipient_name` 未指定時の宛名
const DEFAULT_RECIPIENT_NAME: &str = "User";
/// `app_name` 未指定時のアプリケーション名
const DEFAULT_APP_NAME: &str = "Application";

/// `POST /notify` のリクエストボディ
#[derive(Default, Deserialize)]
#[serde(default)]
pub struct NotificationRequest {
    #[serde(deserialize_with = "null_as_default")]
    pub smtp_host:       String,
    #[serde(deserialize_with = "null_as_default")]
    pub smtp_port:       u16,
    #[serde(deserialize_with = "null_as_default")]
    pub smtp_username:   String,
    #[serde(deserialize_with = "null_as_default")]
    pub smtp_password:   String,
    #[serde(deserialize_with = "null_as_default")]
    pub smtp_sender:     String,
    #[serde(deserialize_with = "null_as_default")]
    pub recipient_email: String,
    #[serde(deserialize_with = "null_as_default")]
    pub recipient_name:  String,
    #[serde(deserialize_with = "null_as_default")]
    pub app_name:        String,
    /// 組み込みテンプレートの代わりに使うテンプレートソース
    pub template:        Option<String>,
    /// カスタムテンプレートに渡すデータ
    pub template_data:   Option<Map<String, Value>>,
}

/// 検証済みの通知
pub struct ValidatedNotification {
    pub smtp:            SmtpSettings,
    pub sender:          String,
    pub recipient_email: String,
    pub template:        TemplateSource,
    pub data:            TemplateData,
}

impl NotificationRequest {
    /// JSON ボディをデコードする
    pub fn decode(body: &[u8]) -> Result<Self, RequestError> {
        serde_json::from_slice(body).map_err(|e| RequestError::Decode(e.to_string()))
    }

    /// 必須フィールドとメールアドレス形式を検証する
    pub fn validate(self) -> Result<ValidatedNotification, RequestError> {
        self.ensure_required_fields()?;
        parse_mailbox(&self.smtp_sender, EmailField::SmtpSender)?;
        parse_mailbox(&self.recipient_email, EmailField::RecipientEmail)?;

        let context = TemplateContext {
            name:     non_empty_or(self.recipient_name, DEFAULT_RECIPIENT_NAME),
            email:    self.recipient_email.clone(),
            app_name: non_empty_or(self.app_name, DEFAULT_APP_NAME),
        };

        let (template, data) = match self.template.filter(|source| !source.is_empty()) {
            None => (
                TemplateSource::Builtin(BuiltinTemplate::Welcome),
                TemplateData::Default(context),
            ),
            Some(source) => {
                let data = match self.template_data {
                    Some(custom) if !custom.is_empty() => TemplateData::Custom(custom),
                    _ => TemplateData::Default(context),
                };
                (TemplateSource::Inline(source), data)
            }
        };

        Ok(ValidatedNotification {
            smtp: SmtpSettings {
                host:     self.smtp_host,
                port:     self.smtp_port,
                username: self.smtp_username,
                password: self.smtp_password,
            },
            sender: self.smtp_sender,
            recipient_email: self.recipient_email,
            template,
            data,
        })
    }

    fn ensure_required_fields(&self) -> Result<(), RequestError> {
        let required = [
            ("smtp_host", self.smtp_host.is_empty()),
            ("smtp_port", self.smtp_port == 0),
            ("smtp_username", self.smtp_username.is_empty()),
            ("smtp_password", self.smtp_password.is_empty()),
            ("smtp_sender", self.smtp_sender.is_empty()),
            ("recipient_email", self.recipient_email.is_empty()),
        ];

        match required.into_iter().find(|(_, missing)| *missing) {
            Some((field, _)) => Err(RequestError::MissingField(field)),
            None => Ok(()),
        }
    }
}

/// 明示的な `null` を省略と同じくデフォルト値として読む
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn parse_mailbox(address: &str, field: EmailField) -> Result<Mailbox, RequestError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| RequestError::InvalidEmailFormat {
            field,
            reason: e.to_string(),
        })
}

fn non_empty_or(value: String, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}
