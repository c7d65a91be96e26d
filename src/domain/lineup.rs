use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::RejectReason;

/// Roster-scoped player identifier.
pub type PlayerId = i64;

/// The five players currently on the floor, as an unordered set.
///
/// Two lineups are equal iff they contain the same five players, regardless
/// of the order they were submitted in. Serialized as a sorted array so the
/// persisted form is canonical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lineup {
    players: BTreeSet<PlayerId>,
}

impl Lineup {
    /// Build a lineup from exactly five distinct player ids. Duplicates
    /// collapse in the set, so fewer than five distinct entries is rejected.
    pub fn new(players: impl IntoIterator<Item = PlayerId>) -> Result<Self, RejectReason> {
        let set: BTreeSet<PlayerId> = players.into_iter().collect();
        if set.len() != 5 {
            return Err(RejectReason::InvalidLineupSize { got: set.len() });
        }
        Ok(Self { players: set })
    }

    pub fn contains(&self, player: PlayerId) -> bool {
        self.players.contains(&player)
    }

    /// Number of distinct players. Always 5 for lineups built with `new`,
    /// but deserialized payloads can carry any size and must be re-checked.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.players.iter().copied()
    }

    /// Sorted vector form for persistence and display.
    pub fn to_vec(&self) -> Vec<PlayerId> {
        self.players.iter().copied().collect()
    }

    /// Players present in `self` but not in `other`.
    pub fn leaving(&self, other: &Lineup) -> Vec<PlayerId> {
        self.players.difference(&other.players).copied().collect()
    }

    /// Players present in `other` but not in `self`.
    pub fn entering(&self, other: &Lineup) -> Vec<PlayerId> {
        other.players.difference(&self.players).copied().collect()
    }
}

impl fmt::Display for Lineup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.players.iter().map(|p| p.to_string()).collect();
        write!(f, "[{}]", ids.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_equality_ignores_order() {
        let a = Lineup::new([1, 2, 3, 4, 5]).unwrap();
        let b = Lineup::new([5, 4, 3, 2, 1]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_wrong_size() {
        assert!(matches!(
            Lineup::new([1, 2, 3, 4]),
            Err(RejectReason::InvalidLineupSize { got: 4 })
        ));
        assert!(matches!(
            Lineup::new([1, 2, 3, 4, 5, 6]),
            Err(RejectReason::InvalidLineupSize { got: 6 })
        ));
    }

    #[test]
    fn test_rejects_duplicates() {
        // duplicate collapses to 4 distinct players
        assert!(matches!(
            Lineup::new([1, 2, 3, 4, 4]),
            Err(RejectReason::InvalidLineupSize { got: 4 })
        ));
    }

    #[test]
    fn test_entering_and_leaving() {
        let before = Lineup::new([1, 2, 3, 4, 5]).unwrap();
        let after = Lineup::new([1, 2, 3, 4, 6]).unwrap();
        assert_eq!(before.leaving(&after), vec![5]);
        assert_eq!(before.entering(&after), vec![6]);
    }
}
