//! # UTDRS Engine
//!
//! 正規化・異常スコアリング・既知脅威マッチングを束ねる検知パイプライン
//! Orchestrates one analysis per call and reports where it failed

pub mod config;
pub mod pipeline;

pub use config::*;
pub use pipeline::*;
