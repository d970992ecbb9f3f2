//! # 通知ユースケース
//!
//! リクエストの検証 → テンプレートのレンダリング → 配送 の流れを担当する。
//!
//! - [`request`]: ボディのデコードと必須フィールド・メールアドレスの検証
//! - [`template_renderer`]: 3 ブロックのレンダリング
//! - [`service`]: 配送モードに応じた同期 / バックグラウンド配送

pub mod request;
pub mod service;
pub mod template_renderer;

pub use request::{NotificationRequest, ValidatedNotification};
pub use service::{DispatchOutcome, NotificationService};
pub use template_renderer::{BuiltinTemplate, TemplateData, TemplateRenderer, TemplateSource};
