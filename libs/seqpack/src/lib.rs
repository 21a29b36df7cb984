//! Packs independently timed media, feature and annotation streams into one
//! training record per clip.
//!
//! A build runs in four steps: packets are routed into a [`FeatureStore`] by
//! a [`SequencePacker`], configured streams are checked for presence, box
//! annotations are snapped onto the image timestamps, and the store is turned
//! into an immutable [`Record`].

pub use config::PackConfig;
pub use error::{Error, Result};
pub use key::{FeatureKey, FeatureKind, StreamSpec};
pub use packer::{SequencePacker, pack};
pub use record::Record;
pub use store::{FeatureSequence, FeatureStore};
pub use value::*;

pub mod config;
pub mod detection;
mod error;
pub mod key;
pub mod packer;
pub mod presence;
pub mod reconcile;
pub mod record;
pub mod store;
pub mod value;
