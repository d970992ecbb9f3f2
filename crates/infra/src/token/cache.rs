//! アプリケーショントークンキャッシュ
//!
//! client credentials で取得したトークンを 1 つだけ保持する。
//! 同時に期限切れを検知した複数のリクエストが重複して取得することはあり得るが、
//! どのトークンが最後に残っても等値比較は正しく動くため許容する。

use chrono::{DateTime, Utc};
use pingmailer_domain::auth::ApplicationToken;
use tokio::sync::RwLock;

/// アプリケーショントークンキャッシュ
#[derive(Debug, Default)]
pub struct ApplicationTokenCache {
    current: RwLock<Option<ApplicationToken>>,
}

impl ApplicationTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `now` の時点で有効なトークンがあれば返す
    pub async fn fresh(&self, now: DateTime<Utc>) -> Option<ApplicationToken> {
        self.current
            .read()
            .await
            .as_ref()
            .filter(|token| token.is_fresh(now))
            .cloned()
    }

    /// トークンを置き換える（既存のトークンは破棄される）
    pub async fn replace(&self, token: ApplicationToken) {
        *self.current.write().await = Some(token);
    }
}
