//! # HTTP リクエストハンドラ
//!
//! axum のルートに対応するハンドラ関数を定義する。
//!
//! ## 設計方針
//!
//! - 各ハンドラはサブモジュールに配置
//! - 親モジュールで re-export し、フラットな API を提供
//! - ハンドラは薄く保ち、検証・レンダリング・配送は [`crate::usecase`] に委譲
//!
//! ## ハンドラ一覧
//!
//! - `health`: ヘルスチェック
//! - `notify`: 通知メールの送信

pub mod health;
pub mod notify;

pub use health::{HealthState, health_check};
pub use notify::{NotifyState, notify};
