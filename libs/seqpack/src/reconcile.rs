//! Snaps annotation sequences onto the image timestamp grid.

use std::collections::BTreeSet;

use tracing::debug;

use crate::{
    key::{FeatureKey, FeatureKind},
    store::{FeatureSequence, FeatureStore},
    value::{BoxList, FeatureValue},
};

/// Resamples `annotations` onto `reference`.
///
/// Reference timestamps are visited in order; each takes the closest
/// annotation not yet taken, the earlier one on a tie. Reference timestamps
/// left over once every annotation is taken get `placeholder`. The result
/// always has `reference.len()` entries stamped with the reference timestamps.
pub fn reconcile(
    reference: &[i64],
    annotations: &FeatureSequence,
    placeholder: &FeatureValue,
) -> FeatureSequence {
    // (timestamp, index) so duplicate timestamps stay distinct and sort by
    // arrival
    let mut free: BTreeSet<(i64, usize)> = annotations
        .timestamps()
        .iter()
        .copied()
        .enumerate()
        .map(|(i, t)| (t, i))
        .collect();

    reference
        .iter()
        .map(|&r| {
            let value = take_nearest(&mut free, r)
                .and_then(|i| annotations.value_at(i))
                .unwrap_or(placeholder)
                .clone();
            (r, value)
        })
        .collect()
}

fn take_nearest(free: &mut BTreeSet<(i64, usize)>, target: i64) -> Option<usize> {
    let above = free.range((target, 0)..).next().copied();
    // first arrival among the latest timestamp below the target
    let below = free
        .range(..(target, 0))
        .next_back()
        .and_then(|&(t, _)| free.range((t, 0)..).next().copied());
    let nearest = match (below, above) {
        (Some(b), Some(a)) => {
            if target.abs_diff(b.0) <= a.0.abs_diff(target) {
                b
            } else {
                a
            }
        }
        (Some(b), None) => b,
        (None, Some(a)) => a,
        (None, None) => return None,
    };
    free.remove(&nearest);
    Some(nearest.1)
}

/// Reconciles every box sequence against the unprefixed image sequence.
/// Nothing changes unless both are present.
pub fn reconcile_annotations(store: &mut FeatureStore) {
    let Some(images) = store.feature(&FeatureKey::image()) else {
        return;
    };
    let reference = images.timestamps().to_vec();
    let box_keys: Vec<FeatureKey> = store
        .keys()
        .filter(|k| k.kind == FeatureKind::BBox)
        .cloned()
        .collect();
    let placeholder = FeatureValue::Boxes(BoxList::new());
    for key in box_keys {
        let Some(annotations) = store.feature(&key) else {
            continue;
        };
        let reconciled = reconcile(&reference, annotations, &placeholder);
        debug!(
            %key,
            annotations = annotations.len(),
            frames = reference.len(),
            "reconciled annotations"
        );
        store.replace_sequence(&key, reconciled);
    }
}
