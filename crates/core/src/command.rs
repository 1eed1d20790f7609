//! Command protocol types — structured directives embedded in agent replies.
//!
//! A command is ephemeral: it is decoded from one model response, applied,
//! and discarded. It is never persisted.
//!
//! The known command set is closed (one variant per directive the
//! dispatcher understands) with an `Unknown` catch-all carrying the raw
//! type token. Dispatch policy is entirely the caller's: the codec decodes
//! structurally and performs no effects.

use crate::error::Result;
use async_trait::async_trait;

/// The closed set of known command types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    /// Create a new node; the parameter is its title.
    CreateNode,
    /// Replace the current node's content.
    UpdateNode,
    /// Delete a node; the parameter names the target.
    DeleteNode,
    /// Request content generation of a given kind from a prompt.
    GenerateContent,
    /// Request external research for a query.
    Research,
    /// Structurally valid but unrecognized; carries the raw type token.
    Unknown(String),
}

impl CommandKind {
    /// Map a raw type token to a command kind.
    pub fn parse(token: &str) -> Self {
        match token {
            "CreateNode" => Self::CreateNode,
            "UpdateNode" => Self::UpdateNode,
            "DeleteNode" => Self::DeleteNode,
            "GenerateContent" => Self::GenerateContent,
            "Research" => Self::Research,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::CreateNode => "CreateNode",
            Self::UpdateNode => "UpdateNode",
            Self::DeleteNode => "DeleteNode",
            Self::GenerateContent => "GenerateContent",
            Self::Research => "Research",
            Self::Unknown(token) => token,
        }
    }
}

/// One decoded command: its kind, positional parameters, and the exact
/// matched substring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub params: Vec<String>,
    pub raw: String,
}

impl Command {
    /// All parameters rejoined with `:`.
    ///
    /// Free-text arguments (titles, prompts) may legitimately contain
    /// colons; the colon-separated wire form splits them, and this undoes
    /// the split for single-argument commands.
    pub fn joined_params(&self) -> String {
        self.params.join(":")
    }
}

/// Per-variant handler interface implemented by the command dispatcher.
///
/// [`unknown`](Self::unknown) defaults to a no-op: unrecognized commands
/// decode structurally but have no effect unless the dispatcher opts in.
#[async_trait]
pub trait CommandHandler: Send {
    async fn create_node(&mut self, title: &str) -> Result<()>;

    async fn update_node(&mut self, content: &str) -> Result<()>;

    async fn delete_node(&mut self, target: &str) -> Result<()>;

    async fn generate_content(&mut self, kind: &str, prompt: &str) -> Result<()>;

    async fn research(&mut self, query: &str) -> Result<()>;

    async fn unknown(&mut self, _command: &Command) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_kinds_roundtrip_through_parse() {
        for token in [
            "CreateNode",
            "UpdateNode",
            "DeleteNode",
            "GenerateContent",
            "Research",
        ] {
            let kind = CommandKind::parse(token);
            assert_eq!(kind.as_str(), token);
            assert!(!matches!(kind, CommandKind::Unknown(_)));
        }
    }

    #[test]
    fn unrecognized_kind_is_unknown() {
        let kind = CommandKind::parse("RenameUniverse");
        assert_eq!(kind, CommandKind::Unknown("RenameUniverse".into()));
        assert_eq!(kind.as_str(), "RenameUniverse");
    }

    #[test]
    fn joined_params_restores_colons() {
        let cmd = Command {
            kind: CommandKind::CreateNode,
            params: vec!["Part One".into(), " The Beginning".into()],
            raw: "##COMMAND:CreateNode:Part One: The Beginning##".into(),
        };
        assert_eq!(cmd.joined_params(), "Part One: The Beginning");
    }
}
