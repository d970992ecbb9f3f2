//! # Pingmailer リレー
//!
//! OAuth2 で保護された HTTP → SMTP の通知メールリレー。
//!
//! ## モジュール構成
//!
//! - [`config`]: 環境変数からの設定読み込みと検証
//! - [`middleware`]: ベアラートークンの認証ゲート
//! - [`handler`]: `POST /notify` と `GET /health`
//! - [`usecase`]: リクエスト検証・テンプレートのレンダリング・配送
//! - [`app_builder`]: 依存の組み立てとルーター構築
//! - [`serve`]: サーバー起動とグレースフルシャットダウン

pub mod app_builder;
pub mod config;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod serve;
pub mod usecase;
