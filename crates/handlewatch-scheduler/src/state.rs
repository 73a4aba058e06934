//! Two-sample debounce over status observations.
//!
//! A change is announced only after the same new status has been observed on
//! two consecutive checks. Diagnostic payloads never reach this layer.

use handlewatch_schema::{StatusKind, StatusRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// First observation of the target; nothing to announce.
    Created(StatusRecord),
    /// Observation repeats the confirmed status.
    Unchanged(StatusRecord),
    /// A new candidate status was seen once.
    Pending(StatusRecord),
    /// The candidate repeated and is now confirmed.
    Confirmed {
        previous: StatusKind,
        record: StatusRecord,
    },
}

impl Transition {
    pub fn record(&self) -> StatusRecord {
        match self {
            Transition::Created(record)
            | Transition::Unchanged(record)
            | Transition::Pending(record)
            | Transition::Confirmed { record, .. } => *record,
        }
    }

    /// Whether the stored record changed and must be persisted.
    pub fn mutates(&self) -> bool {
        !matches!(self, Transition::Unchanged(_))
    }

    pub fn notifies(&self) -> bool {
        matches!(self, Transition::Confirmed { .. })
    }
}

pub fn debounce(current: Option<StatusRecord>, observed: StatusKind) -> Transition {
    let Some(record) = current else {
        return Transition::Created(StatusRecord::first_seen(observed));
    };

    if observed != record.pending {
        return Transition::Pending(StatusRecord {
            confirmed: record.confirmed,
            pending: observed,
        });
    }

    if observed != record.confirmed {
        return Transition::Confirmed {
            previous: record.confirmed,
            record: StatusRecord::first_seen(observed),
        };
    }

    Transition::Unchanged(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use StatusKind::*;

    fn replay(observations: &[StatusKind]) -> Vec<Transition> {
        let mut current = None;
        observations
            .iter()
            .map(|obs| {
                let transition = debounce(current, *obs);
                current = Some(transition.record());
                transition
            })
            .collect()
    }

    fn notifications(observations: &[StatusKind]) -> Vec<bool> {
        replay(observations).iter().map(Transition::notifies).collect()
    }

    #[test]
    fn first_observation_creates_without_notifying() {
        let transition = debounce(None, Active);
        assert_eq!(transition, Transition::Created(StatusRecord::first_seen(Active)));
        assert!(transition.mutates());
        assert!(!transition.notifies());
    }

    #[test]
    fn repeated_same_status_never_notifies() {
        assert_eq!(notifications(&[Active, Active]), vec![false, false]);
    }

    #[test]
    fn change_confirms_on_second_sighting() {
        let transitions = replay(&[Active, NotFound, NotFound]);
        assert_eq!(
            transitions[1],
            Transition::Pending(StatusRecord {
                confirmed: Active,
                pending: NotFound,
            })
        );
        assert_eq!(
            transitions[2],
            Transition::Confirmed {
                previous: Active,
                record: StatusRecord::first_seen(NotFound),
            }
        );
    }

    #[test]
    fn three_distinct_values_never_notify() {
        assert_eq!(notifications(&[Active, NotFound, Private]), vec![false; 3]);
    }

    #[test]
    fn single_glitch_then_recovery_is_silent() {
        assert_eq!(
            notifications(&[Active, TransportError, Active, Active]),
            vec![false; 4]
        );
    }

    #[test]
    fn replay_of_confirmed_status_is_a_noop() {
        let record = StatusRecord::first_seen(NotFound);
        let transition = debounce(Some(record), NotFound);
        assert_eq!(transition, Transition::Unchanged(record));
        assert!(!transition.mutates());
    }

    #[test]
    fn end_to_end_sequence() {
        assert_eq!(
            notifications(&[Active, NotFound, NotFound, NotFound]),
            vec![false, false, true, false]
        );
    }
}
