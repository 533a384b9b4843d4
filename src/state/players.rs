//! Index of which unfinished match each player is seated in.

use dashmap::{DashMap, mapref::entry::Entry};
use uuid::Uuid;

use crate::state::game::{Roster, RosterError};

/// Incrementally maintained `player -> match` lookup for unfinished matches.
#[derive(Debug, Default)]
pub struct PlayerIndex {
    seats: DashMap<String, Uuid>,
}

impl PlayerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match a player is currently seated in.
    pub fn match_of(&self, player: &str) -> Option<Uuid> {
        self.seats.get(player).map(|entry| *entry.value())
    }

    /// Seat every rostered player in `match_id` unless one already sits in another match.
    ///
    /// Each seat is claimed through the map entry, so two callers can never both win the same
    /// player. On failure the seats claimed by this call are handed back and nobody is moved.
    pub fn try_seat(&self, roster: &Roster, match_id: Uuid) -> Result<(), RosterError> {
        let mut claimed: Vec<&str> = Vec::new();
        for player in roster.all_players() {
            let busy = match self.seats.entry(player.to_owned()) {
                Entry::Occupied(entry) => (*entry.get() != match_id).then(|| *entry.get()),
                Entry::Vacant(entry) => {
                    entry.insert(match_id);
                    claimed.push(player);
                    None
                }
            };
            if let Some(other) = busy {
                self.release_players(claimed, match_id);
                return Err(RosterError::PlayerBusy {
                    player: player.to_owned(),
                    match_id: other,
                });
            }
        }
        Ok(())
    }

    /// Record every rostered player as seated in `match_id`.
    pub fn seat(&self, roster: &Roster, match_id: Uuid) {
        for player in roster.all_players() {
            self.seats.insert(player.to_owned(), match_id);
        }
    }

    /// Forget the players of `match_id`, leaving entries pointing elsewhere untouched.
    pub fn release(&self, roster: &Roster, match_id: Uuid) {
        self.release_players(roster.all_players(), match_id);
    }

    /// Forget the given players if they are seated in `match_id`.
    pub fn release_players<'a>(&self, players: impl IntoIterator<Item = &'a str>, match_id: Uuid) {
        for player in players {
            self.seats.remove_if(player, |_, seated| *seated == match_id);
        }
    }

    /// Replace the whole index, typically after (re)connecting to storage.
    pub fn rebuild<'a>(&self, seated: impl IntoIterator<Item = (&'a Roster, Uuid)>) {
        self.seats.clear();
        for (roster, match_id) in seated {
            self.seat(roster, match_id);
        }
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(t1: &str, t2: &str) -> Roster {
        Roster::new(vec![t1.into()], vec![t2.into()]).unwrap()
    }

    #[test]
    fn seated_players_are_busy_elsewhere() {
        let index = PlayerIndex::new();
        let first = Uuid::new_v4();
        index.try_seat(&roster("alice", "bob"), first).unwrap();

        assert_eq!(index.match_of("alice"), Some(first));
        assert!(index.try_seat(&roster("alice", "bob"), first).is_ok());
        assert_eq!(
            index.try_seat(&roster("carol", "bob"), Uuid::new_v4()),
            Err(RosterError::PlayerBusy {
                player: "bob".into(),
                match_id: first
            })
        );
    }

    #[test]
    fn failed_seating_hands_back_partial_claims() {
        let index = PlayerIndex::new();
        let first = Uuid::new_v4();
        index.try_seat(&roster("dave", "bob"), first).unwrap();

        let second = Uuid::new_v4();
        let contested = Roster::new(vec!["carol".into(), "erin".into()], vec!["bob".into()]).unwrap();
        assert!(index.try_seat(&contested, second).is_err());

        assert_eq!(index.match_of("carol"), None);
        assert_eq!(index.match_of("erin"), None);
        assert_eq!(index.match_of("bob"), Some(first));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn concurrent_seating_lets_exactly_one_match_win() {
        let index = std::sync::Arc::new(PlayerIndex::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let index = index.clone();
                std::thread::spawn(move || {
                    let roster = Roster::new(vec!["alice".into()], vec!["bob".into()]).unwrap();
                    index.try_seat(&roster, Uuid::new_v4()).is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(index.match_of("alice"), index.match_of("bob"));
    }

    #[test]
    fn release_only_drops_entries_of_that_match() {
        let index = PlayerIndex::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        index.seat(&roster("alice", "bob"), first);
        index.seat(&roster("alice", "carol"), second);

        index.release(&roster("alice", "bob"), first);
        assert_eq!(index.match_of("alice"), Some(second));
        assert_eq!(index.match_of("bob"), None);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn rebuild_replaces_previous_entries() {
        let index = PlayerIndex::new();
        index.seat(&roster("alice", "bob"), Uuid::new_v4());
        let fresh = roster("carol", "dave");
        let id = Uuid::new_v4();
        index.rebuild([(&fresh, id)]);

        assert_eq!(index.match_of("alice"), None);
        assert_eq!(index.match_of("dave"), Some(id));
    }
}
