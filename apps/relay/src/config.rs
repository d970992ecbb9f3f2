//! # リレー設定
//!
//! 環境変数からリレーの設定を読み込み、起動前に検証する。
//!
//! ## 設計方針
//!
//! - **fail fast**: 設定の不備は [`ConfigError`] として `main` まで伝播し、非 0 で終了する
//! - **テスト容易性**: [`RelayConfig::from_lookup`] は任意の参照関数を受け取るため、
//!   プロセスの環境変数に触れずにテストできる
//! - 空文字列の環境変数は未設定として扱う

use std::{path::PathBuf, time::Duration};

use pingmailer_domain::auth::ClaimExpectations;
use pingmailer_infra::token::ClientCredentials;
use thiserror::Error;
use url::Url;

/// デフォルトのバインドアドレス
const DEFAULT_HOST: &str = "0.0.0.0";
/// デフォルトのポート番号
const DEFAULT_PORT: u16 = 8080;
/// デフォルトのシャットダウン猶予（秒）
const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 30;

/// 設定エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error(
        "OAuth2 configuration is required: set OAUTH2_INTROSPECT_URL or OAUTH2_TOKEN_URL/OAUTH2_CLIENT_ID/OAUTH2_CLIENT_SECRET"
    )]
    MissingOAuth2,

    #[error("OAUTH2_INTROSPECT_URL and OAUTH2_TOKEN_URL cannot be used together")]
    ConflictingOAuth2,

    #[error("OAUTH2_TOKEN_URL, OAUTH2_CLIENT_ID and OAUTH2_CLIENT_SECRET must all be set")]
    IncompleteClientCredentials,

    #[error("{var} is not a valid URL: {reason}")]
    InvalidUrl { var: &'static str, reason: String },

    #[error("{var} must use https unless DEV_MODE is enabled")]
    InsecureUrl { var: &'static str },

    #[error("TLS_CERT_FILE and TLS_KEY_FILE must be provided together")]
    IncompleteTls,

    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} must be one of {expected}, got {value:?}")]
    InvalidChoice {
        var:      &'static str,
        expected: &'static str,
        value:    String,
    },

    #[error("DEV_AUTH_BYPASS requires DEV_MODE=true")]
    DevAuthBypassWithoutDevMode,

    #[error("DEV_AUTH_BYPASS cannot be used in release builds")]
    DevAuthBypassInRelease,
}

/// OAuth2 トークン検証の方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OAuth2Config {
    /// リモートイントロスペクション
    Introspection {
        introspect_url: Url,
        expectations:   ClaimExpectations,
    },
    /// client credentials で取得したアプリケーショントークンとの比較
    ClientCredentials(ClientCredentials),
}

/// 配送モード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// 配送完了を待って 200 / 500 を返す
    Sync,
    /// 202 を即座に返し、バックグラウンドで配送する
    #[default]
    Async,
}

/// メール送信の実装
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MailTransportKind {
    #[default]
    Smtp,
    /// ログ出力のみ（開発用）
    Noop,
}

/// TLS 証明書と秘密鍵のパス
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    pub cert_file: PathBuf,
    pub key_file:  PathBuf,
}

/// リレーの設定
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// バインドアドレス
    pub host: String,
    /// ポート番号
    pub port: u16,
    /// `/health` が返すバージョン
    pub version: String,
    /// 設定されていれば HTTPS で待ち受ける
    pub tls: Option<TlsConfig>,
    /// トークン検証の方式
    pub oauth2: OAuth2Config,
    /// 401 のレスポンスに検証エラーの内容を含めるか
    pub echo_auth_errors: bool,
    pub delivery_mode: DeliveryMode,
    pub mail_transport: MailTransportKind,
    /// 開発モード（OAuth2 エンドポイントの HTTPS 要件を緩和する）
    pub dev_mode: bool,
    /// 開発用認証バイパス
    ///
    /// `/notify` の認証ゲートを外す。`DEV_MODE` が必要で、リリースビルドでは使用できない。
    pub dev_auth_bypass: bool,
    /// 接続とバックグラウンド配送の終了を待つ上限
    pub shutdown_grace: Duration,
}

impl RelayConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 参照関数から設定を読み込む
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let flag = |key: &str| get(key).is_some_and(|v| v.eq_ignore_ascii_case("true"));

        let dev_mode = flag("DEV_MODE");
        let dev_auth_bypass = flag("DEV_AUTH_BYPASS");
        if dev_auth_bypass && !dev_mode {
            return Err(ConfigError::DevAuthBypassWithoutDevMode);
        }
        #[cfg(not(debug_assertions))]
        if dev_auth_bypass {
            return Err(ConfigError::DevAuthBypassInRelease);
        }

        let tls = match (get("TLS_CERT_FILE"), get("TLS_KEY_FILE")) {
            (Some(cert), Some(key)) => Some(TlsConfig {
                cert_file: PathBuf::from(cert),
                key_file:  PathBuf::from(key),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteTls),
        };

        let port = match get("PINGMAILER_PORT") {
            Some(value) => parse_number::<u16>("PINGMAILER_PORT", &value)?,
            None => DEFAULT_PORT,
        };
        let shutdown_grace_secs = match get("SHUTDOWN_GRACE_SECS") {
            Some(value) => parse_number::<u64>("SHUTDOWN_GRACE_SECS", &value)?,
            None => DEFAULT_SHUTDOWN_GRACE_SECS,
        };

        let delivery_mode = match get("DELIVERY_MODE").as_deref() {
            None => DeliveryMode::default(),
            Some(value) if value.eq_ignore_ascii_case("sync") => DeliveryMode::Sync,
            Some(value) if value.eq_ignore_ascii_case("async") => DeliveryMode::Async,
            Some(value) => {
                return Err(ConfigError::InvalidChoice {
                    var:      "DELIVERY_MODE",
                    expected: "sync, async",
                    value:    value.to_string(),
                });
            }
        };
        let mail_transport = match get("MAIL_TRANSPORT").as_deref() {
            None => MailTransportKind::default(),
            Some(value) if value.eq_ignore_ascii_case("smtp") => MailTransportKind::Smtp,
            Some(value) if value.eq_ignore_ascii_case("noop") => MailTransportKind::Noop,
            Some(value) => {
                return Err(ConfigError::InvalidChoice {
                    var:      "MAIL_TRANSPORT",
                    expected: "smtp, noop",
                    value:    value.to_string(),
                });
            }
        };

        let oauth2 = parse_oauth2(&get, dev_mode)?;

        Ok(Self {
            host: get("PINGMAILER_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            version: get("PINGMAILER_VERSION")
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            tls,
            oauth2,
            echo_auth_errors: flag("AUTH_ECHO_ERRORS"),
            delivery_mode,
            mail_transport,
            dev_mode,
            dev_auth_bypass,
            shutdown_grace: Duration::from_secs(shutdown_grace_secs),
        })
    }
}

fn parse_oauth2<G>(get: &G, dev_mode: bool) -> Result<OAuth2Config, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let introspect_url = get("OAUTH2_INTROSPECT_URL");
    let token_url = get("OAUTH2_TOKEN_URL");
    let client_id = get("OAUTH2_CLIENT_ID");
    let client_secret = get("OAUTH2_CLIENT_SECRET");

    match (introspect_url, token_url) {
        (Some(_), Some(_)) => Err(ConfigError::ConflictingOAuth2),
        (Some(introspect_url), None) => Ok(OAuth2Config::Introspection {
            introspect_url: parse_url("OAUTH2_INTROSPECT_URL", &introspect_url, dev_mode)?,
            expectations:   ClaimExpectations {
                audience: get("OAUTH2_EXPECTED_AUDIENCE"),
                issuer:   get("OAUTH2_EXPECTED_ISSUER"),
            },
        }),
        (None, Some(token_url)) => {
            let (Some(client_id), Some(client_secret)) = (client_id, client_secret) else {
                return Err(ConfigError::IncompleteClientCredentials);
            };
            Ok(OAuth2Config::ClientCredentials(ClientCredentials {
                token_url: parse_url("OAUTH2_TOKEN_URL", &token_url, dev_mode)?,
                client_id,
                client_secret,
            }))
        }
        (None, None) if client_id.is_some() || client_secret.is_some() => {
            Err(ConfigError::IncompleteClientCredentials)
        }
        (None, None) => Err(ConfigError::MissingOAuth2),
    }
}

fn parse_url(var: &'static str, value: &str, dev_mode: bool) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        var,
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "https" => Ok(url),
        "http" if dev_mode => Ok(url),
        "http" => Err(ConfigError::InsecureUrl { var }),
        other => Err(ConfigError::InvalidUrl {
            var,
            reason: format!("unsupported scheme {other:?}"),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber {
            var,
            value: value.to_string(),
        })
}
