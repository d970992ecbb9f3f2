//! # ヘルスチェック共通型
//!
//! `GET /health` が返すレスポンス型を提供する。

use serde::{Deserialize, Serialize};

/// ヘルスチェックレスポンス
///
/// `status` は稼働状態、`version` は起動時に設定されたバージョン文字列。
///
/// ## 使用例
///
/// ```
/// use pingmailer_shared::HealthResponse;
///
/// let response = HealthResponse::ok("0.1.0");
/// assert_eq!(response.status, "ok");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// 稼働状態（常に `"ok"`）
    pub status:  String,
    /// アプリケーションバージョン
    pub version: String,
}

impl HealthResponse {
    /// 稼働中を示すレスポンスを作成する
    pub fn ok(version: impl Into<String>) -> Self {
        Self {
            status:  "ok".to_string(),
            version: version.into(),
        }
    }
}
