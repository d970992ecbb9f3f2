//! client credentials によるトークン検証
//!
//! リレー自身のクライアント ID / シークレットでアプリケーショントークンを取得し、
//! 呼び出し元のトークンがそれと一致するかを比較する。
//!
//! この方式はエンドユーザーの認証ではない。リレーと同じクレデンシャルを持つ呼び出し元だけが
//! 通過できる共有シークレットのゲートとして動作する。

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use pingmailer_domain::{
    auth::{ApplicationToken, AuthError, BearerToken},
    clock::Clock,
};
use reqwest::StatusCode;
use serde::Deserialize;
use subtle::ConstantTimeEq;
use url::Url;

use super::{ApplicationTokenCache, TokenValidator};

/// client credentials グラントの設定
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub token_url:     Url,
    pub client_id:     String,
    pub client_secret: String,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("token_url", &self.token_url.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

/// トークンエンドポイントのレスポンス
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in:   Option<u64>,
}

/// client credentials 検証器
pub struct ClientCredentialsValidator {
    client:      reqwest::Client,
    credentials: ClientCredentials,
    cache:       Arc<ApplicationTokenCache>,
    clock:       Arc<dyn Clock>,
}

impl ClientCredentialsValidator {
    pub fn new(
        client: reqwest::Client,
        credentials: ClientCredentials,
        cache: Arc<ApplicationTokenCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            credentials,
            cache,
            clock,
        }
    }

    /// 現在のアプリケーショントークンを返す
    ///
    /// キャッシュが有効ならそれを使い、なければ取得してキャッシュを置き換える。
    async fn current_token(&self) -> Result<ApplicationToken, AuthError> {
        let now = self.clock.now();
        if let Some(token) = self.cache.fresh(now).await {
            return Ok(token);
        }

        let token = self.fetch_token().await?;
        tracing::debug!(expires_at = %token.expires_at(), "アプリケーショントークンを取得");
        self.cache.replace(token.clone()).await;
        Ok(token)
    }

    async fn fetch_token(&self) -> Result<ApplicationToken, AuthError> {
        let fetched_at = self.clock.now();
        let response = self
            .client
            .post(self.credentials.token_url.clone())
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| AuthError::TokenFetchFailed(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenFetchFailed(format!(
                "token endpoint returned status {status}: {body}"
            )));
        }

        let body = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::TokenFetchFailed(e.to_string()))?;

        Ok(ApplicationToken::issued(
            body.access_token,
            body.expires_in,
            fetched_at,
        ))
    }
}

#[async_trait]
impl TokenValidator for ClientCredentialsValidator {
    async fn validate(&self, token: &BearerToken) -> Result<(), AuthError> {
        let application_token = self.current_token().await?;

        let matches: bool = application_token
            .value()
            .as_bytes()
            .ct_eq(token.as_str().as_bytes())
            .into();
        if !matches {
            return Err(AuthError::TokenMismatch);
        }

        Ok(())
    }
}
