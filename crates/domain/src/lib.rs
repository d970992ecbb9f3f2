//! # Pingmailer ドメイン層
//!
//! リレーが扱う概念（ベアラートークン、アプリケーショントークン、
//! イントロスペクション結果、通知メール）を I/O なしの純粋な型として定義する。
//!
//! ## モジュール構成
//!
//! - [`auth`]: 認証ゲートとトークン検証のモデル
//! - [`notification`]: 通知リクエストからメール配送までのモデル
//! - [`clock`]: 現在時刻の抽象化（テストで固定時刻を注入する）

pub mod auth;
pub mod clock;
pub mod notification;
