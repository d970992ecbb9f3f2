//! # 認証
//!
//! OAuth2 ベアラートークンによる認証ゲートのドメインモデルを定義する。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 | 説明 |
//! |---|------------|------|
//! | [`BearerToken`] | ベアラートークン | `Authorization: Bearer <token>` から取り出した不透明な文字列 |
//! | [`ApplicationToken`] | アプリケーショントークン | client credentials で取得したリレー自身のトークン |
//! | [`IntrospectionResult`] | イントロスペクション結果 | 認可サーバーが返すトークンの状態とクレーム |
//! | [`ClaimExpectations`] | 期待クレーム | audience / issuer の任意の検証条件 |
//!
//! ## 設計方針
//!
//! - **検証ロジックは純粋関数**: 時刻は引数で受け取り、I/O は infra 層に置く
//! - **トークンを Debug 出力しない**: `BearerToken` / `ApplicationToken` の Debug は値を伏せる

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use strum::IntoStaticStr;
use thiserror::Error;

/// 認証エラー
///
/// どのバリアントも呼び出し元には 401 として返る。
/// `IntoStaticStr` はログの `auth.error_kind` フィールドに使う。
#[derive(Debug, Clone, PartialEq, Eq, Error, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum AuthError {
    /// Authorization ヘッダーがない
    #[error("missing Authorization header")]
    MissingHeader,

    /// `Bearer <token>` 形式ではない
    #[error("invalid Authorization header format, expected 'Bearer <token>'")]
    MalformedHeader,

    /// イントロスペクションエンドポイントに到達できない、または 200 以外を返した
    #[error("failed to introspect token: {0}")]
    IntrospectionUnreachable(String),

    /// イントロスペクションのレスポンスをデコードできない
    #[error("failed to decode introspection response: {0}")]
    MalformedIntrospectionResponse(String),

    /// `active` が false
    #[error("token is not active")]
    TokenInactive,

    /// `exp` が過去
    #[error("token has expired")]
    TokenExpired,

    /// audience が期待値と一致しない
    #[error("token audience does not include {expected}")]
    AudienceMismatch { expected: String },

    /// issuer が期待値と一致しない
    #[error("token issuer does not match {expected}")]
    IssuerMismatch { expected: String },

    /// アプリケーショントークンの取得に失敗
    #[error("failed to obtain application token: {0}")]
    TokenFetchFailed(String),

    /// 呼び出し元のトークンがアプリケーショントークンと一致しない
    #[error("token does not match the application token")]
    TokenMismatch,
}

impl AuthError {
    /// ヘッダーの形式に起因するエラーか
    ///
    /// 401 のメッセージを「ヘッダー不正」と「トークン不正」で出し分けるために使う。
    pub fn is_header_error(&self) -> bool {
        matches!(self, Self::MissingHeader | Self::MalformedHeader)
    }
}

/// ベアラートークン
///
/// リクエストごとに生成され、永続化されない。
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Authorization ヘッダーの値からトークンを取り出す
    ///
    /// - スキームは大文字小文字を区別しない（`bearer` / `Bearer` / `BEARER`）
    /// - スキームとトークンの区切りはちょうど 1 つの空白
    /// - トークンは空であってはならない
    pub fn from_authorization(header: Option<&str>) -> Result<Self, AuthError> {
        let header = header.ok_or(AuthError::MissingHeader)?;
        let (scheme, token) = header.split_once(' ').ok_or(AuthError::MalformedHeader)?;

        if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() || token.starts_with(' ') {
            return Err(AuthError::MalformedHeader);
        }

        Ok(Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

/// 発行者が宣言した有効期間のうち、キャッシュに使う割合（分子 / 分母）
const LIFETIME_BUFFER_NUMERATOR: i64 = 9;
const LIFETIME_BUFFER_DENOMINATOR: i64 = 10;

/// アプリケーショントークン（client credentials 方式のみ）
///
/// キャッシュ内で置き換えられるだけで、インプレースで更新されることはない。
/// `expires_at` は取得時刻 + 宣言有効期間の 90% に設定し、
/// 実際の失効より前にリフレッシュさせる。
#[derive(Clone, PartialEq, Eq)]
pub struct ApplicationToken {
    value:      String,
    expires_at: DateTime<Utc>,
}

impl ApplicationToken {
    /// トークンエンドポイントの応答から生成する
    ///
    /// `expires_in` がない場合は有効期間 0 として扱い、次回の検証で再取得する。
    pub fn issued(value: String, expires_in_secs: Option<u64>, fetched_at: DateTime<Utc>) -> Self {
        let declared_ms = expires_in_secs
            .map(|secs| i64::try_from(secs).unwrap_or(i64::MAX).saturating_mul(1000))
            .unwrap_or(0);
        let buffered_ms = declared_ms / LIFETIME_BUFFER_DENOMINATOR * LIFETIME_BUFFER_NUMERATOR;
        let expires_at = TimeDelta::try_milliseconds(buffered_ms)
            .and_then(|lifetime| fetched_at.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self { value, expires_at }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// `now` の時点でまだ再利用できるか
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

impl fmt::Debug for ApplicationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationToken")
            .field("value", &"***")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// `aud` クレーム（単一文字列または配列）
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, expected: &str) -> bool {
        match self {
            Self::One(aud) => aud == expected,
            Self::Many(auds) => auds.iter().any(|aud| aud == expected),
        }
    }
}

/// イントロスペクション結果（RFC 7662）
///
/// 検証 1 回ごとに使い捨て、キャッシュしない。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IntrospectionResult {
    #[serde(default)]
    pub active:     bool,
    pub client_id:  Option<String>,
    pub token_type: Option<String>,
    /// 失効時刻（エポック秒）
    pub exp:        Option<i64>,
    pub iat:        Option<i64>,
    pub nbf:        Option<i64>,
    pub sub:        Option<String>,
    pub aud:        Option<Audience>,
    pub iss:        Option<String>,
    pub jti:        Option<String>,
}

/// イントロスペクション結果に対する任意の追加検証条件
///
/// どちらも未設定なら、認可サーバーが返したクレームをそのまま受け入れる。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimExpectations {
    pub audience: Option<String>,
    pub issuer:   Option<String>,
}

impl IntrospectionResult {
    /// トークンが受け入れ可能かを判定する
    ///
    /// 判定順: `active` → `exp` → audience → issuer。
    /// `exp` が 0 以下または未設定の場合は期限チェックをしない。
    pub fn verify(
        &self,
        now: DateTime<Utc>,
        expectations: &ClaimExpectations,
    ) -> Result<(), AuthError> {
        if !self.active {
            return Err(AuthError::TokenInactive);
        }

        if let Some(exp) = self.exp.filter(|exp| *exp > 0)
            && now.timestamp() > exp
        {
            return Err(AuthError::TokenExpired);
        }

        if let Some(expected) = &expectations.audience
            && !self.aud.as_ref().is_some_and(|aud| aud.contains(expected))
        {
            return Err(AuthError::AudienceMismatch {
                expected: expected.clone(),
            });
        }

        if let Some(expected) = &expectations.issuer
            && self.iss.as_deref() != Some(expected.as_str())
        {
            return Err(AuthError::IssuerMismatch {
                expected: expected.clone(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    // ===== BearerToken =====

    #[rstest]
    #[case("Bearer abc123", "abc123")]
    #[case("bearer abc123", "abc123")]
    #[case("BEARER abc123", "abc123")]
    #[case("Bearer a b", "a b")]
    fn test_bearer_tokenを取り出せる(#[case] header: &str, #[case] expected: &str) {
        let token = BearerToken::from_authorization(Some(header)).unwrap();

        assert_eq!(token.as_str(), expected);
    }

    #[rstest]
    #[case("Bearer")]
    #[case("Bearer ")]
    #[case("Bearer  abc")]
    #[case("Basic abc123")]
    #[case("Bearerabc")]
    #[case("")]
    fn test_不正な形式のヘッダーはmalformed_headerになる(#[case] header: &str) {
        let result = BearerToken::from_authorization(Some(header));

        assert_eq!(result, Err(AuthError::MalformedHeader));
    }

    #[test]
    fn test_ヘッダーがない場合はmissing_headerになる() {
        assert_eq!(
            BearerToken::from_authorization(None),
            Err(AuthError::MissingHeader)
        );
    }

    #[test]
    fn test_bearer_tokenのdebugは値を伏せる() {
        let token = BearerToken::from_authorization(Some("Bearer secret")).unwrap();

        assert_eq!(format!("{token:?}"), "BearerToken(***)");
    }

    // ===== ApplicationToken =====

    #[test]
    fn test_application_tokenは宣言有効期間の90パーセントで期限切れになる() {
        let token = ApplicationToken::issued("app".to_string(), Some(100), now());

        assert_eq!(token.expires_at(), now() + TimeDelta::seconds(90));
        assert!(token.is_fresh(now() + TimeDelta::seconds(89)));
        assert!(!token.is_fresh(now() + TimeDelta::seconds(90)));
    }

    #[test]
    fn test_expires_inがない場合は即座に期限切れ扱いになる() {
        let token = ApplicationToken::issued("app".to_string(), None, now());

        assert!(!token.is_fresh(now()));
    }

    #[test]
    fn test_巨大なexpires_inでもパニックしない() {
        let token = ApplicationToken::issued("app".to_string(), Some(u64::MAX), now());

        assert!(token.is_fresh(now()));
    }

    // ===== IntrospectionResult =====

    #[rstest]
    #[case(r#"{"active":false}"#)]
    #[case(r#"{"active":false,"client_id":"svc","sub":"u","exp":4102444800}"#)]
    #[case(r#"{}"#)]
    fn test_activeがfalseなら他のクレームに関係なく拒否する(#[case] body: &str) {
        let result: IntrospectionResult = serde_json::from_str(body).unwrap();

        assert_eq!(
            result.verify(now(), &ClaimExpectations::default()),
            Err(AuthError::TokenInactive)
        );
    }

    #[test]
    fn test_expが過去なら期限切れになる() {
        let result = IntrospectionResult {
            active: true,
            exp: Some(now().timestamp() - 1),
            ..Default::default()
        };

        assert_eq!(
            result.verify(now(), &ClaimExpectations::default()),
            Err(AuthError::TokenExpired)
        );
    }

    #[test]
    fn test_expが0なら期限チェックしない() {
        let result = IntrospectionResult {
            active: true,
            exp: Some(0),
            ..Default::default()
        };

        assert_eq!(result.verify(now(), &ClaimExpectations::default()), Ok(()));
    }

    #[test]
    fn test_audは文字列と配列の両方をデコードできる() {
        let one: IntrospectionResult =
            serde_json::from_str(r#"{"active":true,"aud":"relay"}"#).unwrap();
        let many: IntrospectionResult =
            serde_json::from_str(r#"{"active":true,"aud":["other","relay"]}"#).unwrap();

        assert_eq!(one.aud, Some(Audience::One("relay".to_string())));
        assert!(many.aud.unwrap().contains("relay"));
    }

    #[test]
    fn test_期待audienceが設定されていれば一致を要求する() {
        let expectations = ClaimExpectations {
            audience: Some("relay".to_string()),
            issuer:   None,
        };
        let matching = IntrospectionResult {
            active: true,
            aud: Some(Audience::Many(vec!["relay".to_string()])),
            ..Default::default()
        };
        let missing = IntrospectionResult {
            active: true,
            ..Default::default()
        };

        assert_eq!(matching.verify(now(), &expectations), Ok(()));
        assert_eq!(
            missing.verify(now(), &expectations),
            Err(AuthError::AudienceMismatch {
                expected: "relay".to_string(),
            })
        );
    }

    #[test]
    fn test_期待issuerが設定されていれば一致を要求する() {
        let expectations = ClaimExpectations {
            audience: None,
            issuer:   Some("https://auth.example.com".to_string()),
        };
        let result = IntrospectionResult {
            active: true,
            iss: Some("https://evil.example.com".to_string()),
            ..Default::default()
        };

        assert!(matches!(
            result.verify(now(), &expectations),
            Err(AuthError::IssuerMismatch { .. })
        ));
    }

    #[test]
    fn test_auth_errorのkindはsnake_caseになる() {
        let kind: &'static str = AuthError::TokenInactive.into();

        assert_eq!(kind, "token_inactive");
        assert!(AuthError::MissingHeader.is_header_error());
        assert!(!AuthError::TokenMismatch.is_header_error());
    }
}
