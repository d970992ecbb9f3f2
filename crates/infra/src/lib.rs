//! # Pingmailer インフラ層
//!
//! リレーの外部接続を担当する。
//!
//! ## モジュール構成
//!
//! - [`token`]: OAuth2 トークン検証（イントロスペクション / client credentials）
//! - [`notification`]: SMTP によるメール配送とリトライ
//! - `mock`: テスト用のインメモリ実装（`test-utils` feature）

pub mod notification;
pub mod token;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use notification::{DeliveryEngine, MailTransport, RetryPolicy};
pub use token::{
    ApplicationTokenCache,
    ClientCredentialsValidator,
    IntrospectionValidator,
    TokenValidator,
};
