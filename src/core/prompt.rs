//! Chat prompt templates with `{name}` placeholders
//!
//! `{{` and `}}` render as literal braces. Substitution is a single pass, so
//! braces inside a bound value are copied through untouched.

use regex::{Captures, Regex};
use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use crate::core::errors::{Result, TranslationError};
use crate::core::models::{ChatMessage, Role};

/// Variable holding the user text in the translation prompt
pub const TEXT_VARIABLE: &str = "text";

/// Variable holding the target language name
pub const LANGUAGE_VARIABLE: &str = "language";

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex is valid")
    })
}

/// One templated chat message
#[derive(Debug, Clone)]
pub struct MessageTemplate {
    role: Role,
    template: String,
    variables: BTreeSet<String>,
}

impl MessageTemplate {
    /// Parse a template string
    pub fn new(role: Role, template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        let variables = placeholder_regex()
            .captures_iter(&template)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
            .collect();

        // Any brace left after removing placeholders and escapes is unbalanced.
        let stripped = placeholder_regex().replace_all(&template, "");
        if stripped.contains('{') || stripped.contains('}') {
            return Err(TranslationError::ConfigError {
                message: format!("Unbalanced brace in template: {:?}", template),
            });
        }

        Ok(Self {
            role,
            template,
            variables,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Placeholder names referenced by this message
    pub fn variables(&self) -> &BTreeSet<String> {
        &self.variables
    }

    /// Render the message with every placeholder bound
    pub fn format(&self, values: &HashMap<String, String>) -> Result<ChatMessage> {
        if let Some(missing) = self.variables.iter().find(|v| !values.contains_key(*v)) {
            return Err(TranslationError::MissingVariable {
                name: missing.clone(),
            });
        }

        let content = placeholder_regex().replace_all(&self.template, |caps: &Captures| {
            match caps.get(1) {
                Some(name) => values[name.as_str()].clone(),
                None => caps[0][..1].to_string(),
            }
        });

        Ok(ChatMessage::new(self.role, content))
    }
}

/// Ordered list of message templates rendered together
#[derive(Debug, Clone)]
pub struct ChatPromptTemplate {
    messages: Vec<MessageTemplate>,
    input_variables: Vec<String>,
}

impl ChatPromptTemplate {
    /// Build from `(role, template)` pairs
    pub fn from_messages<I, S>(messages: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Role, S)>,
        S: Into<String>,
    {
        let messages = messages
            .into_iter()
            .map(|(role, template)| MessageTemplate::new(role, template))
            .collect::<Result<Vec<_>>>()?;

        let input_variables = messages
            .iter()
            .flat_map(|m| m.variables().iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Ok(Self {
            messages,
            input_variables,
        })
    }

    /// System instruction followed by the raw user text
    pub fn translation(system_template: &str) -> Result<Self> {
        Self::from_messages([
            (Role::System, system_template.to_string()),
            (Role::User, format!("{{{}}}", TEXT_VARIABLE)),
        ])
    }

    /// Sorted union of every placeholder name
    pub fn input_variables(&self) -> &[String] {
        &self.input_variables
    }

    pub fn messages(&self) -> &[MessageTemplate] {
        &self.messages
    }

    /// Render all messages in order
    pub fn format_messages(&self, values: &HashMap<String, String>) -> Result<Vec<ChatMessage>> {
        self.messages.iter().map(|m| m.format(values)).collect()
    }
}
