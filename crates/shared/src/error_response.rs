//! # エラーレスポンス（RFC 9457 Problem Details）
//!
//! リレーが返すエラーレスポンスの共通構造体を提供する。
//!
//! ## 設計
//!
//! - `ErrorResponse` は純粋なデータ構造（`Serialize` / `Deserialize` のみ）
//! - axum の `IntoResponse` 変換はアプリ側の責務（shared に axum 依存を入れない）
//! - `detail` には呼び出し元が対処できる具体的なメッセージを入れる
//!   （例: `Missing required field: smtp_host`）

use serde::{Deserialize, Serialize};

/// error_type URI のベースパス
const ERROR_TYPE_BASE: &str = "https://pingmailer.example.com/errors";

/// エラーレスポンス（RFC 9457 Problem Details）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "type")]
    pub error_type: String,
    pub title:      String,
    pub status:     u16,
    pub detail:     String,
}

impl ErrorResponse {
    /// 汎用コンストラクタ
    ///
    /// `error_type_suffix` はベース URI に付加される（例: `"template-error"`）。
    pub fn new(
        error_type_suffix: &str,
        title: impl Into<String>,
        status: u16,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            error_type: format!("{ERROR_TYPE_BASE}/{error_type_suffix}"),
            title: title.into(),
            status,
            detail: detail.into(),
        }
    }

    /// 400 Bad Request
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new("bad-request", "Bad Request", 400, detail)
    }

    /// 401 Unauthorized
    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new("unauthorized", "Unauthorized", 401, detail)
    }

    /// 500 テンプレートエラー
    ///
    /// テンプレートは呼び出し元が書いたものなので、原因を detail で返す。
    pub fn template_error(detail: impl Into<String>) -> Self {
        Self::new("template-error", "Template Error", 500, detail)
    }

    /// 500 配送失敗
    ///
    /// detail は固定値（SMTP サーバーの応答を漏らさないため）。
    pub fn delivery_failed() -> Self {
        Self::new(
            "delivery-failed",
            "Internal Server Error",
            500,
            "Failed to send email",
        )
    }
}
