use std::{collections::HashMap, sync::LazyLock};

use chrono::{Datelike, NaiveDate};
use regex::{Captures, Regex};

use crate::{cfg::Templates, error::Error};

use super::{EventDecision, LtInfo};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:\$|\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
        .expect("placeholder pattern is a valid regex")
});

/// Replaces `$name` and `${name}` with the matching variable.
/// `$$` gives a literal dollar, unknown placeholders are left as they are.
pub fn substitute(template: &str, vars: &HashMap<&str, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let Some(name) = caps.get(1).or_else(|| caps.get(2)) else {
                return "$".to_string();
            };
            vars.get(name.as_str())
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Picks and fills the message templates.
pub struct TemplateResolver<'a> {
    templates: &'a Templates,
}

impl<'a> TemplateResolver<'a> {
    pub fn new(templates: &'a Templates) -> Self {
        Self { templates }
    }

    fn template(&self, key: &str) -> Result<&'a str, Error> {
        let template = match key {
            "regular" => &self.templates.regular,
            "lightning_talk" => &self.templates.lightning_talk,
            "rest" => &self.templates.rest,
            "confirmation" => &self.templates.confirmation,
            _ => &None,
        };
        template
            .as_deref()
            .ok_or_else(|| Error::MissingTemplate(key.to_string()))
    }

    /// Renders the announcement for `decision`.
    /// The lightning talk details are only read for a lightning talk, missing
    /// speaker or title render as empty text and a missing url falls back to `default_url`.
    pub fn render(
        &self,
        decision: EventDecision,
        date: NaiveDate,
        lt_info: &LtInfo,
        default_url: &str,
    ) -> Result<String, Error> {
        let template = self.template(decision.template_key())?;

        let mut vars = HashMap::new();
        match decision {
            EventDecision::Regular => {
                vars.insert("mm", date.month().to_string());
                vars.insert("dd", date.day().to_string());
                vars.insert("url", default_url.to_string());
            }
            EventDecision::LightningTalk => {
                vars.insert("mm", date.month().to_string());
                vars.insert("dd", date.day().to_string());
                vars.insert("speaker_name", lt_info.speaker.clone().unwrap_or_default());
                vars.insert("title", lt_info.title.clone().unwrap_or_default());
                vars.insert(
                    "url",
                    lt_info.url.clone().unwrap_or_else(|| default_url.to_string()),
                );
            }
            EventDecision::Rest => return Ok(template.to_string()),
        }

        Ok(substitute(template, &vars))
    }

    /// Renders the confirmation request for the announcement planned on `date`,
    /// followed by the reaction legend.
    pub fn render_confirmation(&self, role: &str, date: NaiveDate) -> Result<String, Error> {
        let template = self.template("confirmation")?;

        let vars = HashMap::from([
            ("role", role.to_string()),
            ("month", date.month().to_string()),
            ("day", date.day().to_string()),
        ]);

        let mut content = substitute(template, &vars);
        for decision in [
            EventDecision::Regular,
            EventDecision::LightningTalk,
            EventDecision::Rest,
        ] {
            content += &format!("\n{}: {}", decision.emoji(), decision);
        }
        content += "\nNo reaction counts as a regular meetup.";

        Ok(content)
    }
}

#[cfg(test)]
mod test {
    use std::{collections::HashMap, sync::LazyLock};

    use chrono::NaiveDate;

    use crate::{
        announce::{EventDecision, LtInfo},
        cfg::Templates,
        error::Error,
    };

    use super::{substitute, TemplateResolver};

    fn templates() -> Templates {
        Templates {
            regular: Some("Meetup on $mm/$dd as usual.\n$url".to_string()),
            lightning_talk: Some(
                "LT night on ${mm}/${dd}: $speaker_name presents \"$title\".\n$url".to_string(),
            ),
            rest: Some("No meetup this week, costs $5.".to_string()),
            confirmation: Some("$role what happens on $month/$day?".to_string()),
        }
    }

    fn june_15() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    #[test]
    fn regular_uses_date_and_default_url() {
        let templates = templates();
        let body = TemplateResolver::new(&templates)
            .render(EventDecision::Regular, june_15(), &LtInfo::default(), "https://x")
            .unwrap();

        assert!(body.contains("6/15"));
        assert!(body.contains("https://x"));
    }

    #[test]
    fn lightning_talk_with_empty_info() {
        let templates = templates();
        let body = TemplateResolver::new(&templates)
            .render(EventDecision::LightningTalk, june_15(), &LtInfo::default(), "https://x")
            .unwrap();

        assert_eq!(body, "LT night on 6/15:  presents \"\".\nhttps://x");
    }

    #[test]
    fn lightning_talk_with_info() {
        let templates = templates();
        let info = LtInfo {
            speaker: Some("Alice".to_string()),
            title: Some("Borrowing".to_string()),
            url: Some("https://lt".to_string()),
        };
        let body = TemplateResolver::new(&templates)
            .render(EventDecision::LightningTalk, june_15(), &info, "https://x")
            .unwrap();

        assert_eq!(body, "LT night on 6/15: Alice presents \"Borrowing\".\nhttps://lt");
    }

    #[test]
    fn rest_is_fixed_text() {
        let templates = templates();
        let info = LtInfo {
            speaker: Some("Alice".to_string()),
            ..LtInfo::default()
        };
        let body = TemplateResolver::new(&templates)
            .render(EventDecision::Rest, june_15(), &info, "https://x")
            .unwrap();

        assert_eq!(body, "No meetup this week, costs $5.");
    }

    #[test]
    fn missing_template_is_reported() {
        let templates = Templates {
            rest: None,
            ..templates()
        };
        let result = TemplateResolver::new(&templates).render(
            EventDecision::Rest,
            june_15(),
            &LtInfo::default(),
            "https://x",
        );

        assert!(matches!(result, Err(Error::MissingTemplate(key)) if key == "rest"));
    }

    #[test]
    fn confirmation_lists_the_reactions() {
        let templates = templates();
        let body = TemplateResolver::new(&templates)
            .render_confirmation("<@&42>", june_15())
            .unwrap();

        assert!(body.starts_with("<@&42> what happens on 6/15?"));
        assert!(body.contains("👍"));
        assert!(body.contains("⚡"));
        assert!(body.contains("💤"));
    }

    #[test]
    fn substitution_rules() {
        let vars = HashMap::from([("name", "Bob".to_string())]);

        assert_eq!(substitute("hi $name!", &vars), "hi Bob!");
        assert_eq!(substitute("hi ${name}san", &vars), "hi Bobsan");
        assert_eq!(substitute("$nameさん", &vars), "Bobさん");
        assert_eq!(substitute("$$name", &vars), "$name");
        assert_eq!(substitute("keep $other", &vars), "keep $other");
    }
}
