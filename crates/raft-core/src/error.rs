//! # error
//!
//! why: report payloads that cannot be encoded or decoded
//! relations: returned by log.rs and member.rs, wrapped by raft-server
//! what: CodecError

use thiserror::Error;

/// errors raised while encoding or decoding entry payloads
#[derive(Debug, Error)]
pub enum CodecError {
    /// a value could not be serialized
    #[error("failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),

    /// the payload of the entry at `index` is malformed
    #[error("malformed config change payload at index {index}: {source}")]
    Decode {
        index: u64,
        #[source]
        source: serde_json::Error,
    },
}
