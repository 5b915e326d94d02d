//! # UTDRS Anomaly
//!
//! 数値列の標準化とアイソレーションフォレストによる異常スコアリング
//! Statistical rarity scoring over the numeric columns of a canonical projection

pub mod forest;
pub mod scorer;
pub mod vectorizer;

pub use scorer::*;
pub use vectorizer::*;
