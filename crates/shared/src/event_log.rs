//! # ビジネスイベントログとエラーコンテキストの構造化ヘルパー
//!
//! `jq` で調査しやすいよう、ログフィールドの命名規約とヘルパーマクロを提供する。
//!
//! ## ビジネスイベント
//!
//! [`log_business_event!`] マクロで出力する。`event.kind = "business_event"` マーカーが
//! 自動付与され、`jq 'select(.["event.kind"] == "business_event")'` でフィルタできる。
//!
//! ## エラーコンテキスト
//!
//! `tracing::error!` / `tracing::warn!` に `error.category` + `error.kind` フィールドを
//! 直接追加する。定数は [`error`] モジュールで提供。

/// ビジネスイベントを構造化ログとして出力する。
///
/// `event.kind = "business_event"` マーカーを自動付与し、
/// `tracing::info!` レベルで出力する。
///
/// ## 必須フィールド（慣例）
///
/// - `event.category`: イベントカテゴリ（[`event::category`] の定数を使用）
/// - `event.action`: アクション名（[`event::action`] の定数を使用）
/// - `event.result`: 結果（[`event::result`] の定数を使用）
#[macro_export]
macro_rules! log_business_event {
    ($($args:tt)*) => {
        ::tracing::info!(
            event.kind = "business_event",
            $($args)*
        )
    };
}

/// イベントフィールドの定数
pub mod event {
    /// イベントカテゴリ
    pub mod category {
        pub const AUTH: &str = "auth";
        pub const NOTIFICATION: &str = "notification";
    }

    /// イベントアクション
    pub mod action {
        // 認証
        pub const TOKEN_ACCEPTED: &str = "auth.token_accepted";
        pub const TOKEN_REJECTED: &str = "auth.token_rejected";

        // 通知
        pub const NOTIFICATION_QUEUED: &str = "notification.queued";
        pub const NOTIFICATION_SENT: &str = "notification.sent";
        pub const NOTIFICATION_FAILED: &str = "notification.failed";
    }

    /// イベント結果
    pub mod result {
        pub const SUCCESS: &str = "success";
        pub const FAILURE: &str = "failure";
    }
}

/// エラーコンテキストフィールドの定数
pub mod error {
    /// エラーカテゴリ
    pub mod category {
        /// 外部サービス呼び出し（イントロスペクション、トークンエンドポイント、SMTP）
        pub const EXTERNAL_SERVICE: &str = "external_service";
        /// リレー内部
        pub const INTERNAL: &str = "internal";
    }

    /// エラー種別
    pub mod kind {
        pub const TOKEN_VALIDATION: &str = "token_validation";
        pub const SMTP_DELIVERY: &str = "smtp_delivery";
        pub const TEMPLATE: &str = "template";
        pub const BACKGROUND_TASK: &str = "background_task";
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_アクション定数がカテゴリ接頭辞を持つ() {
        assert!(event::action::TOKEN_REJECTED.starts_with(event::category::AUTH));
        assert!(event::action::NOTIFICATION_SENT.starts_with(event::category::NOTIFICATION));
    }

    #[test]
    fn test_log_business_eventマクロがサブスクライバなしでも呼び出せる() {
        log_business_event!(
            event.category = event::category::NOTIFICATION,
            event.action = event::action::NOTIFICATION_QUEUED,
            event.result = event::result::SUCCESS,
            "queued"
        );
    }
}
