//! # UTDRS Rules
//!
//! Known-threat rule traits, declarative rule sets and row matching
//! 既知脅威シグネチャによる行マッチング

pub mod dsl;
pub mod matcher;
pub mod traits;

pub use dsl::*;
pub use matcher::*;
pub use traits::*;
