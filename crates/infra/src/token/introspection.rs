//! イントロスペクションによるトークン検証
//!
//! 認可サーバーのイントロスペクションエンドポイント（RFC 7662）に
//! `token=<token>` をフォーム POST し、返ってきた状態とクレームで判定する。

use std::sync::Arc;

use async_trait::async_trait;
use pingmailer_domain::{
    auth::{AuthError, BearerToken, ClaimExpectations, IntrospectionResult},
    clock::Clock,
};
use reqwest::StatusCode;
use url::Url;

use super::TokenValidator;

/// イントロスペクション検証器
pub struct IntrospectionValidator {
    client:         reqwest::Client,
    introspect_url: Url,
    expectations:   ClaimExpectations,
    clock:          Arc<dyn Clock>,
}

impl IntrospectionValidator {
    /// 新しい検証器を作成する
    ///
    /// # 引数
    ///
    /// - `client`: 共有 HTTP クライアント（[`super::http_client`] で作成）
    /// - `introspect_url`: イントロスペクションエンドポイント
    /// - `expectations`: audience / issuer の追加検証条件（未設定なら検証しない）
    /// - `clock`: `exp` 判定に使う時刻
    pub fn new(
        client: reqwest::Client,
        introspect_url: Url,
        expectations: ClaimExpectations,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            introspect_url,
            expectations,
            clock,
        }
    }

    async fn introspect(&self, token: &BearerToken) -> Result<IntrospectionResult, AuthError> {
        let response = self
            .client
            .post(self.introspect_url.clone())
            .form(&[("token", token.as_str())])
            .send()
            .await
            .map_err(|e| AuthError::IntrospectionUnreachable(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::IntrospectionUnreachable(format!(
                "introspection failed with status {status}: {body}"
            )));
        }

        response
            .json::<IntrospectionResult>()
            .await
            .map_err(|e| AuthError::MalformedIntrospectionResponse(e.to_string()))
    }
}

#[async_trait]
impl TokenValidator for IntrospectionValidator {
    async fn validate(&self, token: &BearerToken) -> Result<(), AuthError> {
        let result = self.introspect(token).await?;
        result.verify(self.clock.now(), &self.expectations)?;

        tracing::info!(
            client_id = result.client_id.as_deref().unwrap_or("-"),
            sub = result.sub.as_deref().unwrap_or("-"),
            exp = result.exp.unwrap_or_default(),
            "トークン検証成功"
        );
        Ok(())
    }
}
