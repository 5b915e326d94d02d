//! # UTDRS API Library
//!
//! セキュリティテレメトリ解析の Web API インターフェース
//! CSV をアップロードして異常検知と既知脅威マッチングを実行する

pub mod config;
pub mod handlers;
pub mod models;
pub mod monitoring;
pub mod routes;
pub mod samples;
pub mod server;

pub use self::config::*;
pub use handlers::*;
pub use models::*;
pub use monitoring::*;
pub use routes::*;
pub use samples::*;
pub use server::*;
