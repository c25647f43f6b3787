// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message catalog with `{param}` interpolation and locale fallback.
//!
//! Lookup order: exact locale, any locale sharing the language subtag,
//! the default locale. A key missing everywhere renders as
//! `[missing: <key>]` so gaps are visible in delivered text.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use tracing::{debug, warn};

use nudge_core::types::Params;
use nudge_core::{Localizer, NudgeError};

type Templates = HashMap<String, String>;

const BUILTIN: &[(&str, &[(&str, &str)])] = &[
    (
        "pt-BR",
        &[
            (
                "engagement.goodbye.self_select",
                "Oi! Faz um tempinho que você não aparece por aqui. Como posso ajudar?\n\
                 1 - Fiquei com dúvidas, me ajuda\n\
                 2 - Estou ocupado, me lembra mais tarde\n\
                 3 - Está tudo certo, obrigado",
            ),
            (
                "engagement.weekly_review",
                "Resumo da semana: você registrou {transaction_count} transações. Continue assim!",
            ),
            (
                "engagement.tier_1_complete",
                "Parabéns! Você concluiu a primeira etapa. Agora experimente criar categorias.",
            ),
            (
                "engagement.tier_2_complete",
                "Muito bem! Segunda etapa concluída. Que tal definir um orçamento?",
            ),
            (
                "engagement.tier_3_complete",
                "Você dominou o básico! Todas as dicas de início foram desbloqueadas.",
            ),
        ],
    ),
    (
        "en",
        &[
            (
                "engagement.goodbye.self_select",
                "Hi! We haven't seen you in a while. How can I help?\n\
                 1 - I'm confused, help me\n\
                 2 - I'm busy, remind me later\n\
                 3 - All good, no thanks",
            ),
            (
                "engagement.weekly_review",
                "Your week: you logged {transaction_count} transactions. Keep it up!",
            ),
            (
                "engagement.tier_1_complete",
                "Congrats! You finished the first step. Try creating categories next.",
            ),
            (
                "engagement.tier_2_complete",
                "Nice! Step two done. How about setting a budget?",
            ),
            (
                "engagement.tier_3_complete",
                "You've mastered the basics! All getting-started tips are unlocked.",
            ),
        ],
    ),
];

/// Localization catalog implementing [`Localizer`].
#[derive(Debug, Clone)]
pub struct Catalog {
    default_locale: String,
    locales: BTreeMap<String, Templates>,
}

impl Catalog {
    /// Built-in `pt-BR` and `en` templates.
    pub fn builtin(default_locale: impl Into<String>) -> Self {
        let locales = BUILTIN
            .iter()
            .map(|(locale, entries)| {
                let templates = entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();
                (locale.to_string(), templates)
            })
            .collect();
        Self {
            default_locale: default_locale.into(),
            locales,
        }
    }

    /// Built-in templates plus overrides from an optional TOML file.
    pub fn load(default_locale: &str, path: Option<&Path>) -> Result<Self, NudgeError> {
        let catalog = Self::builtin(default_locale);
        let Some(path) = path else {
            return Ok(catalog);
        };
        let content = std::fs::read_to_string(path).map_err(|e| {
            NudgeError::Config(format!("failed to read catalog {}: {e}", path.display()))
        })?;
        let catalog = catalog.with_overrides(&content)?;
        debug!(path = %path.display(), "message catalog overrides loaded");
        Ok(catalog)
    }

    /// Merge overrides given as one TOML table per locale:
    ///
    /// ```toml
    /// [en]
    /// "engagement.weekly_review" = "{transaction_count} transactions this week"
    /// ```
    pub fn with_overrides(mut self, toml_content: &str) -> Result<Self, NudgeError> {
        let overrides: BTreeMap<String, Templates> = toml::from_str(toml_content)
            .map_err(|e| NudgeError::Config(format!("invalid message catalog: {e}")))?;
        for (locale, templates) in overrides {
            self.locales.entry(locale).or_default().extend(templates);
        }
        Ok(self)
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    fn lookup(&self, key: &str, locale: &str) -> Option<&str> {
        let exact = self.locales.get(locale).and_then(|t| t.get(key));
        let lang = language(locale);
        let sibling = || {
            self.locales
                .iter()
                .filter(|(name, _)| language(name) == lang)
                .find_map(|(_, t)| t.get(key))
        };
        let fallback = || {
            self.locales
                .get(&self.default_locale)
                .and_then(|t| t.get(key))
        };
        exact
            .or_else(sibling)
            .or_else(fallback)
            .map(String::as_str)
    }
}

impl Localizer for Catalog {
    fn resolve(&self, key: &str, params: &Params, locale: &str) -> String {
        match self.lookup(key, locale) {
            Some(template) => interpolate(template, params),
            None => {
                warn!(key, locale, "message key missing from catalog");
                format!("[missing: {key}]")
            }
        }
    }
}

fn language(locale: &str) -> &str {
    locale.split(['-', '_']).next().unwrap_or(locale)
}

/// Replace every `{name}` with its parameter. Unknown placeholders stay as-is.
///
/// The template is scanned once, so substituted values are never expanded.
pub fn interpolate(template: &str, params: &Params) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let Some(close) = tail[1..].find(['{', '}']).map(|i| i + 1) else {
            out.push_str(tail);
            return out;
        };
        if tail.as_bytes()[close] == b'}' {
            let name = &tail[1..close];
            match params.get(name) {
                Some(value) => out.push_str(value),
                None => out.push_str(&tail[..=close]),
            }
            rest = &tail[close + 1..];
        } else {
            // A second `{` before any `}`: the first brace is literal.
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn interpolates_params() {
        let catalog = Catalog::builtin("pt-BR");
        let text = catalog.resolve(
            "engagement.weekly_review",
            &params(&[("transaction_count", "12")]),
            "en",
        );
        assert_eq!(text, "Your week: you logged 12 transactions. Keep it up!");
    }

    #[test]
    fn unknown_placeholder_is_left_alone() {
        assert_eq!(interpolate("{a} and {b}", &params(&[("a", "x")])), "x and {b}");
        assert_eq!(
            interpolate("{a}", &params(&[("a", "{b}"), ("b", "x")])),
            "{b}"
        );
        assert_eq!(
            interpolate("{{a}} {a", &params(&[("a", "x")])),
            "{x} {a"
        );
    }

    #[test]
    fn falls_back_by_language_then_default() {
        let catalog = Catalog::builtin("pt-BR");
        let en_us = catalog.resolve("engagement.tier_2_complete", &Params::new(), "en-US");
        assert!(en_us.starts_with("Nice!"));

        let pt = catalog.resolve("engagement.tier_2_complete", &Params::new(), "pt");
        assert!(pt.starts_with("Muito bem!"));

        let unknown = catalog.resolve("engagement.tier_2_complete", &Params::new(), "de-DE");
        assert_eq!(unknown, pt);
    }

    #[test]
    fn missing_key_renders_placeholder() {
        let catalog = Catalog::builtin("pt-BR");
        assert_eq!(
            catalog.resolve("engagement.nope", &Params::new(), "en"),
            "[missing: engagement.nope]"
        );
    }

    #[test]
    fn overrides_extend_and_replace() {
        let catalog = Catalog::builtin("pt-BR")
            .with_overrides(
                r#"
                [en]
                "engagement.weekly_review" = "{transaction_count} this week"

                [es]
                "engagement.tier_1_complete" = "¡Felicidades!"
                "#,
            )
            .unwrap();
        let p = params(&[("transaction_count", "3")]);
        assert_eq!(catalog.resolve("engagement.weekly_review", &p, "en"), "3 this week");
        assert_eq!(
            catalog.resolve("engagement.tier_1_complete", &Params::new(), "es-MX"),
            "¡Felicidades!"
        );
        assert!(
            catalog
                .resolve("engagement.tier_2_complete", &Params::new(), "es")
                .starts_with("Muito bem!")
        );
    }

    #[test]
    fn load_reads_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        std::fs::write(&path, "[pt-BR]\n\"engagement.tier_3_complete\" = \"Fim!\"\n").unwrap();

        let catalog = Catalog::load("pt-BR", Some(&path)).unwrap();
        assert_eq!(
            catalog.resolve("engagement.tier_3_complete", &Params::new(), "pt-BR"),
            "Fim!"
        );
        assert!(Catalog::load("pt-BR", Some(&dir.path().join("absent.toml"))).is_err());
        assert!(Catalog::builtin("en").with_overrides("not = [toml").is_err());
    }
}
