//! Human-readable summary of what a refresh changed, for logs.

use crate::route::{LegAnnotation, Route};

/// One line per changed leg at or after `current_leg_index`:
/// `"Updated <fields> at route <id> leg <index>"`.
pub fn build_route_diffs(old: &Route, new: &Route, current_leg_index: usize) -> Vec<String> {
    old.legs()
        .iter()
        .zip(new.legs())
        .enumerate()
        .skip(current_leg_index)
        .filter_map(|(index, (old_leg, new_leg))| {
            let mut updated = annotation_diff(old_leg.annotation.as_ref(), new_leg.annotation.as_ref());
            if old_leg.incidents != new_leg.incidents {
                updated.push("incidents");
            }
            (!updated.is_empty()).then(|| {
                format!(
                    "Updated {} at route {} leg {}",
                    updated.join(", "),
                    new.id(),
                    index
                )
            })
        })
        .collect()
}

fn annotation_diff(old: Option<&LegAnnotation>, new: Option<&LegAnnotation>) -> Vec<&'static str> {
    let (old, new) = match (old, new) {
        (None, None) => return vec![],
        (old, new) => (old.cloned().unwrap_or_default(), new.cloned().unwrap_or_default()),
    };
    let mut fields = Vec::new();
    if old.distance != new.distance {
        fields.push("distance");
    }
    if old.duration != new.duration {
        fields.push("duration");
    }
    if old.speed != new.speed {
        fields.push("speed");
    }
    if old.max_speed != new.max_speed {
        fields.push("maxspeed");
    }
    if old.congestion != new.congestion {
        fields.push("congestion");
    }
    if old.congestion_numeric != new.congestion_numeric {
        fields.push("congestion_numeric");
    }
    fields
}
