//! Bay chain invariants.

use serde::{Deserialize, Serialize};

use super::Bay;
use crate::id::BayId;

/// Ways a paddock's bay chain can be malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TopologyError {
    #[error("paddock has no bays")]
    EmptyChain,

    #[error("bay order {order} is used more than once")]
    DuplicateOrder { order: u32 },

    #[error("bay orders must be contiguous from 1: expected {expected}, found {found}")]
    NonContiguousOrder { expected: u32, found: u32 },

    #[error("no bay is marked as the last bay")]
    NoLastBay,

    #[error("{count} bays are marked as the last bay")]
    MultipleLastBays { count: usize },

    #[error("last bay {bay} has order {order} but the chain ends at {max_order}")]
    LastBayNotTerminal {
        bay: BayId,
        order: u32,
        max_order: u32,
    },
}

/// Check that `bays` (all belonging to one paddock, in any order) form a
/// valid chain: orders `1..=n` without gaps or duplicates, and exactly one
/// last bay sitting at order `n`.
///
/// # Errors
///
/// Returns the first [`TopologyError`] found.
pub fn validate_chain(bays: &[&Bay]) -> Result<(), TopologyError> {
    if bays.is_empty() {
        return Err(TopologyError::EmptyChain);
    }

    let mut orders: Vec<u32> = bays.iter().map(|bay| bay.order).collect();
    orders.sort_unstable();
    let mut previous = 0;
    for &found in &orders {
        if previous != 0 && found == previous {
            return Err(TopologyError::DuplicateOrder { order: found });
        }
        let expected = previous + 1;
        if found != expected {
            return Err(TopologyError::NonContiguousOrder { expected, found });
        }
        previous = found;
    }

    let last: Vec<&&Bay> = bays.iter().filter(|bay| bay.is_last_bay).collect();
    let max_order = orders.last().copied().unwrap_or_default();
    match last.as_slice() {
        [] => Err(TopologyError::NoLastBay),
        [bay] if bay.order != max_order => Err(TopologyError::LastBayNotTerminal {
            bay: bay.id.clone(),
            order: bay.order,
            max_order,
        }),
        [_] => Ok(()),
        many => Err(TopologyError::MultipleLastBays { count: many.len() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::PaddockId;

    fn bay(order: u32, is_last: bool) -> Bay {
        Bay::new(&PaddockId::new("north"), order, is_last)
    }

    fn check(bays: &[Bay]) -> Result<(), TopologyError> {
        let refs: Vec<&Bay> = bays.iter().collect();
        validate_chain(&refs)
    }

    #[test]
    fn should_accept_well_formed_chain_in_any_input_order() {
        let bays = [bay(3, true), bay(1, false), bay(2, false)];
        assert_eq!(check(&bays), Ok(()));
    }

    #[test]
    fn should_accept_single_bay_marked_last() {
        assert_eq!(check(&[bay(1, true)]), Ok(()));
    }

    #[test]
    fn should_reject_empty_chain() {
        assert_eq!(check(&[]), Err(TopologyError::EmptyChain));
    }

    #[test]
    fn should_reject_chain_not_starting_at_one() {
        let bays = [bay(2, false), bay(3, true)];
        assert_eq!(
            check(&bays),
            Err(TopologyError::NonContiguousOrder {
                expected: 1,
                found: 2
            })
        );
    }

    #[test]
    fn should_reject_gap_in_orders() {
        let bays = [bay(1, false), bay(3, true)];
        assert_eq!(
            check(&bays),
            Err(TopologyError::NonContiguousOrder {
                expected: 2,
                found: 3
            })
        );
    }

    #[test]
    fn should_reject_duplicate_order() {
        let bays = [bay(1, false), bay(1, false), bay(2, true)];
        assert_eq!(check(&bays), Err(TopologyError::DuplicateOrder { order: 1 }));
    }

    #[test]
    fn should_reject_chain_without_last_bay() {
        let bays = [bay(1, false), bay(2, false)];
        assert_eq!(check(&bays), Err(TopologyError::NoLastBay));
    }

    #[test]
    fn should_reject_two_last_bays() {
        let bays = [bay(1, true), bay(2, true)];
        assert_eq!(
            check(&bays),
            Err(TopologyError::MultipleLastBays { count: 2 })
        );
    }

    #[test]
    fn should_reject_last_flag_on_non_terminal_bay() {
        let bays = [bay(1, true), bay(2, false)];
        assert!(matches!(
            check(&bays),
            Err(TopologyError::LastBayNotTerminal {
                order: 1,
                max_order: 2,
                ..
            })
        ));
    }
}
