//! # Pingmailer 共有ユーティリティ
//!
//! このクレートは、Pingmailer のリレーと各クレートで使用される
//! 共通ユーティリティを提供する。
//!
//! ## 設計方針
//!
//! - 他のクレート（domain, infra, relay）から依存される
//! - ビジネスロジックを含まない純粋なユーティリティのみを配置
//! - axum への依存は持たない（`IntoResponse` 変換はアプリ側の責務）

pub mod error_response;
pub mod event_log;
pub mod health;
pub mod observability;

pub use error_response::ErrorResponse;
pub use health::HealthResponse;
