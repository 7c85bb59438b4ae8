use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();

fn placeholder_pattern() -> &'static Regex {
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").unwrap())
}

pub struct TemplateEngine;

impl TemplateEngine {
    // Templates embedded at compile time
    const SYSTEM_PROMPT: &'static str = include_str!("../templates/system_prompt.txt");
    const USER_PROMPT: &'static str = include_str!("../templates/user_prompt.txt");
    const GENERAL_PROMPT: &'static str = include_str!("../templates/general_prompt.txt");

    /// Substitutes `{{NAME}}` placeholders in one pass over `template`.
    ///
    /// Substituted values are never scanned again, so a value that itself
    /// contains `{{NAME}}` is inserted literally. Unknown placeholders are
    /// left as written.
    #[must_use]
    pub fn render(
        template: &str,
        variables: &HashMap<&str, &str>,
    ) -> String {
        placeholder_pattern()
            .replace_all(template, |caps: &Captures| {
                variables
                    .get(&caps[1])
                    .map_or_else(|| caps[0].to_string(), |value| (*value).to_string())
            })
            .into_owned()
    }

    /// The fixed instruction that constrains the model to SQL output.
    #[must_use]
    pub fn system_prompt() -> &'static str {
        Self::SYSTEM_PROMPT.trim_end()
    }

    /// Render the question prompt with the schema description embedded.
    #[must_use]
    pub fn render_user_prompt(
        schema: &str,
        question: &str,
    ) -> String {
        let mut variables = HashMap::new();
        variables.insert("SCHEMA", schema);
        variables.insert("QUESTION", question);

        Self::render(Self::USER_PROMPT, &variables).trim_end().to_string()
    }

    /// Render the prompt used for messages that match no intent.
    #[must_use]
    pub fn render_general_prompt(query: &str) -> String {
        let mut variables = HashMap::new();
        variables.insert("QUERY", query);

        Self::render(Self::GENERAL_PROMPT, &variables).trim_end().to_string()
    }
}
