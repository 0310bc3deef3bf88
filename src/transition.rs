//! Zone transition detection

use crate::types::{Direction, TransitionEvent};
use crate::zone::Zone;

/// Compare the previous classification against the new one.
///
/// Returns `None` on the first classification of a session (`previous` absent) or
/// when the zone did not change.
pub fn detect(previous: Option<Zone>, next: Zone) -> Option<TransitionEvent> {
    let from = previous?;
    if from == next {
        return None;
    }

    let direction = if next > from {
        Direction::Up
    } else {
        Direction::Down
    };

    Some(TransitionEvent {
        from,
        to: next,
        direction,
        entered_peak: next == Zone::Peak,
    })
}
