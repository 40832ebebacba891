//! Webhook payload normalization.
//!
//! Everything the webhook receives is first reduced to one
//! [`RawChatEvent`] and then to a canonical [`CombatEvent`]. The engine
//! never sees chat text or Dink JSON.
//!
//! # Loot-line grammar
//!
//! Matching is case-insensitive and runs of whitespace count as one space:
//!
//! ```text
//! <killer> has defeated <victim> and received (<gp> coins)<anything>
//! ```
//!
//! `<gp>` follows the GP grammar (`1,234`, `1.5m`, ...). Trailing text
//! after the closing parenthesis, such as `worth of loot!`, is ignored.
//! A line that does not match is not a combat line.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use madness_types::{CombatEvent, format_gp, parse_gp};

const DEFEATED: &str = " has defeated ";
const RECEIVED: &str = " and received (";
const COINS: &str = " coins)";

/// A webhook payload reduced to one of the two shapes the bot handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawChatEvent {
    /// A clan chat line that may be a loot broadcast.
    ChatLine {
        /// The chat text as received.
        line: String,
        /// The account whose plugin sent it.
        reporter: Option<String>,
    },
    /// A kill or loot with named fields.
    Structured {
        /// Killer, as received.
        killer: String,
        /// Victim, as received.
        victim: String,
        /// Loot value; `None` for a plain kill.
        gp: Option<GpField>,
        /// The account whose plugin sent it.
        reporter: Option<String>,
    },
}

/// A GP amount from a structured payload, number or GP string.
///
/// Any other JSON value still deserializes, into [`GpField::Malformed`],
/// so a present but unusable amount is reported as invalid rather than
/// making the whole payload unreadable.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum GpField {
    /// A plain number of coins.
    Coins(u64),
    /// A GP string such as `"1.5m"`.
    Text(String),
    /// A negative or fractional number, a boolean, or anything else.
    Malformed(Value),
}

impl GpField {
    /// The amount in coins, `None` if the field is not a GP amount.
    pub fn coins(&self) -> Option<u64> {
        match self {
            Self::Coins(gp) => Some(*gp),
            Self::Text(text) => parse_gp(text),
            Self::Malformed(_) => None,
        }
    }
}

/// Outcome of normalizing a [`RawChatEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// A combat event for the engine.
    Event(CombatEvent),
    /// Nothing the bot records.
    NotCombat,
    /// A structured payload with an unusable field.
    Invalid(String),
}

/// A parsed loot broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LootLine {
    /// Killer, original casing.
    pub killer: String,
    /// Victim, original casing.
    pub victim: String,
    /// Loot value in coins.
    pub gp: u64,
}

/// Parse a clan chat line against the loot-line grammar.
pub fn parse_loot_line(line: &str) -> Option<LootLine> {
    let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
    let lower = collapsed.to_ascii_lowercase();

    let defeated = lower.find(DEFEATED)?;
    let victim_start = defeated.checked_add(DEFEATED.len())?;
    let received = lower.get(victim_start..)?.find(RECEIVED)?;
    let victim_end = victim_start.checked_add(received)?;
    let gp_start = victim_end.checked_add(RECEIVED.len())?;
    let coins = lower.get(gp_start..)?.find(COINS)?;
    let gp_end = gp_start.checked_add(coins)?;

    let killer = collapsed.get(..defeated)?.trim();
    let victim = collapsed.get(victim_start..victim_end)?.trim();
    let gp = parse_gp(collapsed.get(gp_start..gp_end)?)?;

    if killer.is_empty() || victim.is_empty() {
        return None;
    }
    Some(LootLine {
        killer: killer.to_owned(),
        victim: victim.to_owned(),
        gp,
    })
}

impl RawChatEvent {
    /// Reduce to a canonical combat event stamped `now`.
    pub fn normalize(self, now: DateTime<Utc>) -> Normalized {
        match self {
            Self::ChatLine { line, reporter } => {
                let Some(loot) = parse_loot_line(&line) else {
                    return Normalized::NotCombat;
                };
                let event = CombatEvent::loot(loot.killer, loot.victim, loot.gp, &line, now);
                Normalized::Event(with_reporter(event, reporter))
            }
            Self::Structured {
                killer,
                victim,
                gp: None,
                reporter,
            } => Normalized::Event(with_reporter(CombatEvent::kill(killer, victim, now), reporter)),
            Self::Structured {
                killer,
                victim,
                gp: Some(gp),
                reporter,
            } => {
                let Some(coins) = gp.coins() else {
                    return Normalized::Invalid(format!("gp {gp:?} is not a GP amount"));
                };
                // Key structured loot by its canonical chat line so it
                // collapses with the same drop reported as text.
                let line = format!(
                    "{} has defeated {} and received ({} coins)",
                    killer.trim(),
                    victim.trim(),
                    format_gp(coins)
                );
                let event = CombatEvent::loot(killer, victim, coins, &line, now);
                Normalized::Event(with_reporter(event, reporter))
            }
        }
    }
}

fn with_reporter(event: CombatEvent, reporter: Option<String>) -> CombatEvent {
    match reporter.filter(|r| !r.trim().is_empty()) {
        Some(reporter) => event.with_reporter(reporter),
        None => event,
    }
}

// ---------------------------------------------------------------------------
// Dink payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DinkPayload {
    #[serde(rename = "type")]
    kind: Option<String>,
    player_name: Option<String>,
    #[serde(default)]
    extra: Value,
    killer: Option<String>,
    victim: Option<String>,
    gp: Option<GpField>,
}

/// Classify a JSON payload.
///
/// - Dink `CHAT` with `extra.type == "CLAN_CHAT"`: a chat line.
/// - Dink `PLAYER_KILL`: a structured kill of `extra.victimName` by
///   `playerName`.
/// - Any object with `killer` and `victim`: a structured event, loot if
///   `gp` is present.
///
/// Returns `None` for anything else.
pub fn classify_payload(payload: Value) -> Option<RawChatEvent> {
    let payload: DinkPayload = serde_json::from_value(payload).ok()?;
    let extra_str = |key: &str| {
        payload
            .extra
            .get(key)
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
    };

    match payload.kind.as_deref() {
        Some("CHAT") => {
            if extra_str("type").as_deref() != Some("CLAN_CHAT") {
                return None;
            }
            Some(RawChatEvent::ChatLine {
                line: extra_str("message")?,
                reporter: payload.player_name,
            })
        }
        Some("PLAYER_KILL") => Some(RawChatEvent::Structured {
            killer: payload.player_name.clone()?,
            victim: extra_str("victimName")?,
            gp: None,
            reporter: payload.player_name,
        }),
        _ => Some(RawChatEvent::Structured {
            killer: payload.killer?,
            victim: payload.victim?,
            gp: payload.gp,
            reporter: payload.player_name,
        }),
    }
}
