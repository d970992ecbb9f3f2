//! # テスト用モック
//!
//! ユースケース・ハンドラーのテストで使用するインメモリ実装。
//! `test-utils` feature を有効にすることで、他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! pingmailer-infra = { workspace = true, features = ["test-utils"] }
//! ```

use std::sync::{
    Arc,
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use lettre::Message;
use pingmailer_domain::{
    auth::{AuthError, BearerToken},
    notification::{DeliveryError, SmtpSettings},
};

use crate::{notification::MailTransport, token::TokenValidator};

// ===== MockMailTransport =====

/// 送信内容を記録するモックトランスポート
///
/// `failures` 回目までの試行は `DeliveryError::Transport("attempt N failed")` で失敗する。
/// `panics` 回目までの試行はパニックする。
#[derive(Debug, Clone, Default)]
pub struct MockMailTransport {
    failures: Option<usize>,
    panics:   usize,
    attempts: Arc<AtomicUsize>,
    sent:     Arc<Mutex<Vec<SentMail>>>,
}

/// 送信に成功したメール
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub smtp:      SmtpSettings,
    /// RFC 5322 形式に整形したメッセージ全体
    pub formatted: String,
}

impl MockMailTransport {
    /// 常に成功する
    pub fn new() -> Self {
        Self::default()
    }

    /// 常に失敗する
    pub fn always_failing() -> Self {
        Self {
            failures: Some(usize::MAX),
            ..Self::default()
        }
    }

    /// 最初の `times` 回だけ失敗する
    pub fn failing_times(times: usize) -> Self {
        Self {
            failures: Some(times),
            ..Self::default()
        }
    }

    /// 最初の `times` 回だけパニックする
    pub fn panicking_times(times: usize) -> Self {
        Self {
            panics: times,
            ..Self::default()
        }
    }

    /// 送信試行の回数（失敗を含む）
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// 成功した送信
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl MailTransport for MockMailTransport {
    async fn send(&self, smtp: &SmtpSettings, message: &Message) -> Result<(), DeliveryError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.panics {
            panic!("mock transport panicked on attempt {attempt}");
        }
        if self.failures.is_some_and(|failures| attempt <= failures) {
            return Err(DeliveryError::Transport(format!("attempt {attempt} failed")));
        }

        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SentMail {
                smtp:      smtp.clone(),
                formatted: String::from_utf8_lossy(&message.formatted()).into_owned(),
            });
        Ok(())
    }
}

// ===== StubTokenValidator =====

/// 固定の結果を返すスタブ検証器
#[derive(Debug, Clone)]
pub struct StubTokenValidator {
    result: Result<(), AuthError>,
    seen:   Arc<Mutex<Vec<String>>>,
}

impl StubTokenValidator {
    /// すべてのトークンを受け入れる
    pub fn accepting() -> Self {
        Self::returning(Ok(()))
    }

    /// すべてのトークンを `error` で拒否する
    pub fn rejecting(error: AuthError) -> Self {
        Self::returning(Err(error))
    }

    fn returning(result: Result<(), AuthError>) -> Self {
        Self {
            result,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// 検証を依頼されたトークン
    pub fn seen_tokens(&self) -> Vec<String> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl TokenValidator for StubTokenValidator {
    async fn validate(&self, token: &BearerToken) -> Result<(), AuthError> {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(token.as_str().to_string());
        self.result.clone()
    }
}
