//! Columnar Serializer: turns a parsed document into a
//! single-row deflate-wrapped parquet blob, and back.

pub mod codec;
pub mod schema;

pub use codec::{build_artifact, deserialize, encode_batch, serialize};
pub use schema::columnar_schema;
