//! # UTDRS CLI Library
//!
//! 脅威検知パイプラインのコマンドラインインターフェース
//! CSV ファイルの解析と API サーバーの起動をコマンドラインから実行

pub mod commands;
pub mod logging;

pub use commands::*;
pub use logging::*;
