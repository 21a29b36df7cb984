use tracing::warn;

use crate::{Error, key::StreamSpec, store::FeatureStore};

/// Configured streams that ended the build without entries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PresenceReport {
    pub missing: Vec<String>,
}

impl PresenceReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

pub fn check(
    store: &FeatureStore,
    streams: &[StreamSpec],
    require_all: bool,
) -> Result<PresenceReport, Error> {
    let missing: Vec<String> = streams
        .iter()
        .filter(|stream| {
            stream
                .feature_keys()
                .iter()
                .all(|key| store.count(key) == 0)
        })
        .map(ToString::to_string)
        .collect();

    if require_all && !missing.is_empty() {
        return Err(Error::IncompleteStreams(missing));
    }
    for stream in &missing {
        warn!(%stream, "optional stream has no entries, omitting");
    }
    Ok(PresenceReport { missing })
}
