//! Period-scoped leaderboards computed from the history log.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use madness_types::{HistoryEntry, PlayerName};

/// Which statistic a leaderboard ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Board {
    /// Kills per killer. Loot entries count as kills.
    Hiscores,
    /// GP per killer, from loot entries only.
    Lootboard,
}

/// Selection applied to history entries before ranking.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoardFilter<'a> {
    /// Only count entries between two clan members.
    pub clan_only: bool,
    /// Restrict rows to this player.
    pub player: Option<&'a PlayerName>,
}

/// One ranked row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    /// Normalized player name.
    pub player: PlayerName,
    /// Kills or GP, depending on the board.
    pub value: u64,
}

/// Rank players on `board` over `entries`.
///
/// Rows are sorted by value descending, then by name. Players whose
/// value is zero are omitted.
pub fn rank<'a>(
    board: Board,
    entries: impl IntoIterator<Item = &'a HistoryEntry>,
    filter: BoardFilter<'_>,
) -> Vec<LeaderboardRow> {
    let mut totals: BTreeMap<&PlayerName, u64> = BTreeMap::new();

    for entry in entries {
        if filter.clan_only && !entry.is_clan {
            continue;
        }
        if filter.player.is_some_and(|p| *p != entry.killer) {
            continue;
        }
        let amount = match board {
            Board::Hiscores => 1,
            Board::Lootboard => entry.gp.unwrap_or(0),
        };
        if amount == 0 {
            continue;
        }
        let slot = totals.entry(&entry.killer).or_insert(0);
        *slot = slot.saturating_add(amount);
    }

    let mut rows: Vec<LeaderboardRow> = totals
        .into_iter()
        .map(|(player, value)| LeaderboardRow {
            player: player.clone(),
            value,
        })
        .collect();
    rows.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.player.cmp(&b.player)));
    rows
}
