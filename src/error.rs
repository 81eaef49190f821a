use thiserror::Error;

use crate::feeds::FeedIdentity;

/// A text frame that is not JSON. Dropped by the connection, never propagated.
#[derive(Debug, Error)]
#[error("undecodable {feed} frame: {source}")]
pub struct DecodeError {
    pub feed: FeedIdentity,
    #[source]
    pub source: serde_json::Error,
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("{feed} payload carries no readable message category: {source}")]
    MissingCategory {
        feed: FeedIdentity,
        #[source]
        source: serde_json::Error,
    },
    #[error("{feed} {category} message is malformed: {source}")]
    Malformed {
        feed: FeedIdentity,
        category: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("timestamp {raw:?} does not match YYYY/MM/DD hh:mm:ss")]
    Timestamp {
        raw: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Anything that turns a received payload into "no bulletin this time".
#[derive(Debug, Error)]
pub enum BulletinError {
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error(transparent)]
    Format(#[from] FormatError),
}
