//! # トークン検証
//!
//! 認証ゲートが呼び出すベアラートークン検証のインフラストラクチャモジュール。
//!
//! ## 設計方針
//!
//! - **trait による抽象化**: 認証ゲートは `TokenValidator` trait だけに依存する
//! - **2 つの実装**: リモートイントロスペクション（RFC 7662）と、
//!   client credentials で取得したアプリケーショントークンとの比較
//! - **キャッシュは明示的に注入**: [`ApplicationTokenCache`] はプロセス全体の隠れた状態ではなく、
//!   起動時に生成して検証器に渡す。時刻は `Clock` で差し替え可能

mod cache;
mod client_credentials;
mod introspection;

use std::time::Duration;

use async_trait::async_trait;
pub use cache::ApplicationTokenCache;
pub use client_credentials::{ClientCredentials, ClientCredentialsValidator};
pub use introspection::IntrospectionValidator;
use pingmailer_domain::auth::{AuthError, BearerToken};

/// 認可サーバーへの HTTP 呼び出しのタイムアウト
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// ベアラートークン検証トレイト
///
/// 起動時の設定でどちらか一方の実装が選ばれる。
#[async_trait]
pub trait TokenValidator: Send + Sync {
    /// トークンを検証する
    async fn validate(&self, token: &BearerToken) -> Result<(), AuthError>;
}

/// 認可サーバー呼び出し用の HTTP クライアントを作成する
///
/// 両方の検証器で共有する。タイムアウトは [`HTTP_TIMEOUT`]。
pub fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()
}
