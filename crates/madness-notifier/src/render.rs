//! Notification rendering via `minijinja`.
//!
//! Every notification kind has a built-in description template compiled
//! into the binary. Operators can override any of them by dropping a file
//! named `<kind>.j2` (for example `loot_detected.j2`) into the configured
//! templates directory. Templates see the notification's fields and a `gp`
//! filter that formats coin amounts with thousands separators.

use std::path::Path;

use minijinja::Environment;
use serde::Serialize;
use tracing::info;

use madness_core::notifier::NotifyError;
use madness_types::{Notification, format_gp};

/// Built-in templates keyed by [`Notification::kind`].
const BUILTIN_TEMPLATES: [(&str, &str); 7] = [
    ("kill_logged", include_str!("../templates/kill_logged.j2")),
    ("loot_detected", include_str!("../templates/loot_detected.j2")),
    ("raglist_alert", include_str!("../templates/raglist_alert.j2")),
    ("bounty_claimed", include_str!("../templates/bounty_claimed.j2")),
    ("event_created", include_str!("../templates/event_created.j2")),
    ("event_finished", include_str!("../templates/event_finished.j2")),
    ("roster_changed", include_str!("../templates/roster_changed.j2")),
];

/// A Discord embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Embed {
    /// Bold heading.
    pub title: String,
    /// Rendered body text.
    pub description: String,
    /// Side bar color, `0xRRGGBB`.
    pub color: u32,
    /// Extra name/value rows.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
}

/// One name/value row of an [`Embed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    /// Row label.
    pub name: String,
    /// Row value.
    pub value: String,
    /// Whether Discord may lay the row out side by side with others.
    pub inline: bool,
}

/// Renders notifications into embeds.
pub struct EmbedRenderer {
    env: Environment<'static>,
}

impl core::fmt::Debug for EmbedRenderer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EmbedRenderer").finish_non_exhaustive()
    }
}

impl EmbedRenderer {
    /// Create a renderer with the built-in templates only.
    pub fn builtin() -> Result<Self, NotifyError> {
        let mut env = Environment::new();
        env.add_filter("gp", gp_filter);
        for (name, source) in BUILTIN_TEMPLATES {
            env.add_template(name, source).map_err(|e| NotifyError::Render {
                message: format!("built-in template {name} is invalid: {e}"),
            })?;
        }
        Ok(Self { env })
    }

    /// Create a renderer, replacing built-in templates with any
    /// `<kind>.j2` files found in `dir`.
    pub fn with_overrides(dir: &Path) -> Result<Self, NotifyError> {
        let mut renderer = Self::builtin()?;
        for (name, _) in BUILTIN_TEMPLATES {
            let path = dir.join(format!("{name}.j2"));
            if !path.is_file() {
                continue;
            }
            let source = std::fs::read_to_string(&path).map_err(|e| NotifyError::Render {
                message: format!("failed to read {}: {e}", path.display()),
            })?;
            renderer
                .env
                .add_template_owned(name, source)
                .map_err(|e| NotifyError::Render {
                    message: format!("template {} is invalid: {e}", path.display()),
                })?;
            info!(template = name, path = %path.display(), "message template overridden");
        }
        Ok(renderer)
    }

    /// Render one notification.
    pub fn render(&self, notification: &Notification) -> Result<Embed, NotifyError> {
        let kind = notification.kind();
        let description = self
            .env
            .get_template(kind)
            .map_err(|e| NotifyError::Render {
                message: format!("missing {kind} template: {e}"),
            })?
            .render(notification)
            .map_err(|e| NotifyError::Render {
                message: format!("{kind} render failed: {e}"),
            })?;

        let (title, color) = style(notification);
        Ok(Embed {
            title: title.to_owned(),
            description,
            color,
            fields: fields(notification),
        })
    }
}

fn gp_filter(value: u64) -> String {
    format_gp(value)
}

const fn style(notification: &Notification) -> (&'static str, u32) {
    match notification {
        Notification::KillLogged { .. } => ("\u{2694}\u{fe0f} Kill Logged", 0x0095_A5A6),
        Notification::LootDetected { .. } => ("\u{1f4b0} Loot Detected", 0x00FF_0000),
        Notification::RaglistAlert { .. } => ("\u{1f3af} Raglist Target Down", 0x00E6_7E22),
        Notification::BountyClaimed { .. } => ("\u{1f3c6} Bounty Claimed", 0x00F1_C40F),
        Notification::EventCreated { .. } => ("\u{1f4c5} Event Started", 0x0034_98DB),
        Notification::EventFinished { .. } => ("\u{1f3c1} Event Finished", 0x002E_CC71),
        Notification::RosterChanged { .. } => ("\u{1f4cb} Roster Updated", 0x009B_59B6),
    }
}

fn fields(notification: &Notification) -> Vec<EmbedField> {
    match notification {
        Notification::LootDetected { display_total, .. } => vec![EmbedField {
            name: "Event GP Gained".to_owned(),
            value: format_gp(*display_total),
            inline: true,
        }],
        Notification::KillLogged { total_deaths, .. } => vec![EmbedField {
            name: "Deaths This Event".to_owned(),
            value: total_deaths.to_string(),
            inline: true,
        }],
        _ => Vec::new(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use madness_types::{PlayerName, PosterId};

    use super::*;

    fn renderer() -> EmbedRenderer {
        EmbedRenderer::builtin().unwrap()
    }

    #[test]
    fn loot_embed_has_event_total_field() {
        let embed = renderer()
            .render(&Notification::LootDetected {
                killer: "Foo".to_owned(),
                victim: "Bar".to_owned(),
                gp: 1_500_000,
                display_total: 2_000_000,
                is_clan: false,
            })
            .unwrap();
        assert_eq!(embed.title, "\u{1f4b0} Loot Detected");
        assert_eq!(embed.color, 0xFF_0000);
        assert_eq!(
            embed.description,
            "**Foo** has defeated **Bar** and received **1,500,000** coins."
        );
        assert_eq!(embed.fields.len(), 1);
        assert_eq!(embed.fields.first().map(|f| f.value.as_str()), Some("2,000,000"));
    }

    #[test]
    fn bounty_embed_mentions_posters() {
        let embed = renderer()
            .render(&Notification::BountyClaimed {
                victim: "EvilGuy".to_owned(),
                killer: "Hero".to_owned(),
                payout: 7_000_000,
                poster_ids: BTreeSet::from([PosterId::from("u1"), PosterId::from("u2")]),
            })
            .unwrap();
        assert!(embed.description.contains("7,000,000"));
        assert!(embed.description.ends_with("Pay up: <@u1>, <@u2>"));
    }

    #[test]
    fn kill_embed_pluralizes() {
        let render = |total_deaths| {
            renderer()
                .render(&Notification::KillLogged {
                    killer: "A".to_owned(),
                    victim: "B".to_owned(),
                    total_deaths,
                    is_clan: true,
                })
                .unwrap()
                .description
        };
        assert!(render(1).contains("died 1 time this event"));
        assert!(render(3).contains("died 3 times this event"));
        assert!(render(1).contains("clan fight"));
    }

    #[test]
    fn roster_embed_lists_changes() {
        let embed = renderer()
            .render(&Notification::RosterChanged {
                added: vec![PlayerName::from("foo"), PlayerName::from("bar")],
                removed: Vec::new(),
            })
            .unwrap();
        assert_eq!(embed.description, "Clan roster updated. Added: foo, bar.");
    }

    #[test]
    fn every_kind_renders() {
        let r = renderer();
        let all = [
            Notification::RaglistAlert {
                victim: "X".to_owned(),
                bounty_total: 0,
            },
            Notification::EventCreated {
                name: "comp1".to_owned(),
            },
            Notification::EventFinished {
                name: "comp1".to_owned(),
                snapshot_ref: "comp1-20240101T000000000Z".to_owned(),
            },
        ];
        for n in &all {
            assert!(!r.render(n).unwrap().description.is_empty());
        }
    }

    #[test]
    fn override_directory_replaces_template() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("event_created.j2"), "GO {{ name | upper }}").unwrap();
        let r = EmbedRenderer::with_overrides(dir.path()).unwrap();
        let embed = r
            .render(&Notification::EventCreated {
                name: "comp1".to_owned(),
            })
            .unwrap();
        assert_eq!(embed.description, "GO COMP1");
    }

    #[test]
    fn broken_override_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("kill_logged.j2"), "{% if %}").unwrap();
        assert!(matches!(
            EmbedRenderer::with_overrides(dir.path()),
            Err(NotifyError::Render { .. })
        ));
    }
}
