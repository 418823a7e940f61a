//! Rendered prompts and chat messages.
//!
//! A render produces either one plain string or an ordered list of chat
//! messages. The two never mix: a tree that yields both is malformed.

use crate::error::StructuralError;
use serde::{Deserialize, Serialize};

/// One message of a chat prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPromptMessage {
    pub role: String,
    pub content: String,
}

impl ChatPromptMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// The output of a render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prompt {
    Plain(String),
    Chat(Vec<ChatPromptMessage>),
}

impl Prompt {
    pub fn is_chat(&self) -> bool {
        matches!(self, Prompt::Chat(_))
    }

    /// Combine two sibling render results.
    ///
    /// `None` is the identity. Plain strings concatenate, message lists
    /// concatenate, and plain with chat is a structural error.
    pub fn combine(
        a: Option<Prompt>,
        b: Option<Prompt>,
    ) -> Result<Option<Prompt>, StructuralError> {
        match (a, b) {
            (None, b) => Ok(b),
            (a, None) => Ok(a),
            (Some(Prompt::Plain(mut a)), Some(Prompt::Plain(b))) => {
                a.push_str(&b);
                Ok(Some(Prompt::Plain(a)))
            }
            (Some(Prompt::Chat(mut a)), Some(Prompt::Chat(b))) => {
                a.extend(b);
                Ok(Some(Prompt::Chat(a)))
            }
            _ => Err(StructuralError::PromptTypeMismatch),
        }
    }

    /// Convert to chat-completion messages. A plain prompt becomes a single
    /// `user` message.
    pub fn to_chat_messages(&self) -> Vec<ChatPromptMessage> {
        match self {
            Prompt::Plain(s) => vec![ChatPromptMessage::new("user", s.as_str())],
            Prompt::Chat(messages) => messages.clone(),
        }
    }
}

impl Default for Prompt {
    fn default() -> Self {
        Prompt::Plain(String::new())
    }
}

impl std::fmt::Display for Prompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Prompt::Plain(s) => f.write_str(s),
            Prompt::Chat(messages) => {
                for (i, m) in messages.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "[{}] {}", m.role, m.content)?;
                }
                Ok(())
            }
        }
    }
}

/// Wire template for flattening chat messages into a completion prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatTemplate {
    /// `<|im_start|>{role}<|im_sep|>{content}<|im_end|>`
    ChatMl,
    /// `<|begin_of_text|><|start_header_id|>{role}<|end_header_id|>{content}<|eot_id|>`
    Llama3,
}

impl ChatTemplate {
    /// Join messages into one completion prompt.
    ///
    /// With `last_is_incomplete` the final message is left open so the model
    /// continues it.
    pub fn join(&self, messages: &[ChatPromptMessage], last_is_incomplete: bool) -> String {
        let last = messages.len().saturating_sub(1);
        let close = |i: usize| !last_is_incomplete || i != last;
        match self {
            ChatTemplate::ChatMl => {
                let mut out = String::new();
                for (i, m) in messages.iter().enumerate() {
                    out.push_str("<|im_start|>");
                    out.push_str(&m.role);
                    out.push_str("<|im_sep|>");
                    out.push_str(&m.content);
                    if close(i) {
                        out.push_str("<|im_end|>");
                    }
                }
                out
            }
            ChatTemplate::Llama3 => {
                let mut out = String::from("<|begin_of_text|>");
                for (i, m) in messages.iter().enumerate() {
                    out.push_str("<|start_header_id|>");
                    out.push_str(&m.role);
                    out.push_str("<|end_header_id|>");
                    out.push_str(&m.content);
                    if close(i) {
                        out.push_str("<|eot_id|>");
                    }
                }
                out
            }
        }
    }
}
