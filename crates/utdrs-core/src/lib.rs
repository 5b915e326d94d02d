//! # UTDRS Core
//!
//! セキュリティテレメトリのデータモデルと正規化
//! Raw CSV ingest, typed record model and per-data-type schema normalization

pub mod error;
pub mod model;
pub mod normalize;
pub mod record;

pub use error::*;
pub use model::*;
pub use normalize::*;
pub use record::*;
