use std::io;

use miette::Diagnostic;
use thiserror::Error;

use crate::key::FeatureKey;

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("context attribute {0:?} is already set")]
    #[diagnostic(help("enable replace_instead_of_append to overwrite existing attributes"))]
    DuplicateContext(String),
    #[error("unknown stream {0:?}")]
    UnknownStream(String),
    #[error("stream {stream} has absolute boxes but image/width and image/height are not set")]
    MissingDimensions { stream: String },
    #[error("required streams have no entries: {}", .0.join(", "))]
    IncompleteStreams(Vec<String>),
    #[error("time travel - {key} got timestamp {timestamp} after {last}")]
    TimeTravel {
        key: FeatureKey,
        last: i64,
        timestamp: i64,
    },
    #[error("stream {stream} expects {expected} packets, got {got}")]
    UnexpectedPayload {
        stream: String,
        expected: &'static str,
        got: &'static str,
    },
    #[error("stream {stream} has a detection without a box or mask at {timestamp}")]
    UnsupportedDetection { stream: String, timestamp: i64 },
    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: i64, height: i64 },
    #[error("record is corrupt: {0} has mismatched timestamps and values")]
    CorruptRecord(FeatureKey),
    #[error("io {0}")]
    Io(#[from] io::Error),
    #[error("postcard error {0}")]
    Postcard(#[from] postcard::Error),
    #[error("toml parsing failed {0}")]
    Toml(#[from] toml::de::Error),
    #[error("json {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
