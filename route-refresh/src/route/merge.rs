//! Merge partial annotations from a refresh response into the annotations of the old leg.

use super::LegAnnotation;

/// `old[..start]` followed by `new`.
///
/// An absent old array stays absent, as does one shorter than `start`. An absent new
/// array keeps the old one.
pub fn merge_annotation_values<T: Clone>(
    old: Option<&Vec<T>>,
    new: Option<&Vec<T>>,
    start: usize,
) -> Option<Vec<T>> {
    let old = old?;
    if start > old.len() {
        return None;
    }
    let Some(new) = new else {
        return Some(old.clone());
    };
    let mut merged = Vec::with_capacity(start + new.len());
    merged.extend_from_slice(&old[..start]);
    merged.extend_from_slice(new);
    Some(merged)
}

/// Field-wise [`merge_annotation_values`]. A leg without annotation keeps none.
pub fn merge_leg_annotation(
    old: Option<&LegAnnotation>,
    new: Option<&LegAnnotation>,
    start: usize,
) -> Option<LegAnnotation> {
    let old = old?;
    let Some(new) = new else {
        return Some(old.clone());
    };
    Some(LegAnnotation {
        distance: merge_annotation_values(old.distance.as_ref(), new.distance.as_ref(), start),
        duration: merge_annotation_values(old.duration.as_ref(), new.duration.as_ref(), start),
        speed: merge_annotation_values(old.speed.as_ref(), new.speed.as_ref(), start),
        max_speed: merge_annotation_values(old.max_speed.as_ref(), new.max_speed.as_ref(), start),
        congestion: merge_annotation_values(old.congestion.as_ref(), new.congestion.as_ref(), start),
        congestion_numeric: merge_annotation_values(
            old.congestion_numeric.as_ref(),
            new.congestion_numeric.as_ref(),
            start,
        ),
    })
}
