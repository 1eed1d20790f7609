//! Command protocol codec — decoding and stripping of inline command
//! markup, and the dispatch driver.
//!
//! A collaborating generator embeds structured directives in otherwise
//! free-form prose using `##COMMAND:type:params##` markup. The codec pulls
//! every such directive out of a reply ([`decode`]) and produces the clean
//! prose that remains ([`strip`]); [`dispatch`] then drives a handler over
//! the decoded batch in order of appearance.
//!
//! Malformed markup is normal, not exceptional: a body with fewer than two
//! colon-separated tokens is dropped without error, because generators
//! produce near-miss markup routinely and a hard failure would poison the
//! whole reply.

use regex_lite::Regex;
use std::sync::OnceLock;
use storyloom_core::command::{Command, CommandHandler, CommandKind};
use storyloom_core::error::Result;
use tracing::{debug, warn};

fn command_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Body is everything between the delimiters that is not a `#`,
        // so matches never overlap and never span two commands.
        // The pattern is static and known-good; a failure here is a bug.
        Regex::new(r"##COMMAND:([^#]+)##").unwrap()
    })
}

/// Decode every command embedded in `text`, left to right.
///
/// The body inside the delimiters splits on `:`; the first token is the
/// command type and the remainder its positional parameters. A body with
/// fewer than two tokens is dropped silently.
pub fn decode(text: &str) -> Vec<Command> {
    let mut commands = Vec::new();
    for captures in command_pattern().captures_iter(text) {
        let Some(body) = captures.get(1) else {
            continue;
        };
        let raw = match captures.get(0) {
            Some(m) => m.as_str().to_string(),
            None => continue,
        };

        let tokens: Vec<&str> = body.as_str().split(':').collect();
        if tokens.len() < 2 {
            debug!(body = body.as_str(), "Dropping malformed command markup");
            continue;
        }

        commands.push(Command {
            kind: CommandKind::parse(tokens[0]),
            params: tokens[1..].iter().map(|t| t.to_string()).collect(),
            raw,
        });
    }
    commands
}

/// Remove all command markup from `text`, returning the trimmed remainder.
///
/// The result is capped at `max_chars` characters. Truncation warns but
/// never fails: display text that is too long is a degradation, not an
/// error.
pub fn strip(text: &str, max_chars: usize) -> String {
    let cleaned = command_pattern().replace_all(text, "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() > max_chars {
        warn!(
            chars = cleaned.chars().count(),
            max_chars, "Truncating over-length reply text"
        );
        cleaned.chars().take(max_chars).collect()
    } else {
        cleaned.to_string()
    }
}

/// Drive `handler` over a decoded batch, in order.
///
/// Parameter shapes per variant: single free-text arguments are rejoined
/// on `:` so titles and prompts survive the colon-separated wire form;
/// `GenerateContent` takes its first parameter as the kind and rejoins the
/// rest as the prompt.
pub async fn dispatch(commands: &[Command], handler: &mut dyn CommandHandler) -> Result<()> {
    for command in commands {
        debug!(kind = command.kind.as_str(), "Dispatching command");
        match &command.kind {
            CommandKind::CreateNode => handler.create_node(&command.joined_params()).await?,
            CommandKind::UpdateNode => handler.update_node(&command.joined_params()).await?,
            CommandKind::DeleteNode => handler.delete_node(&command.params[0]).await?,
            CommandKind::GenerateContent => {
                let kind = command.params[0].as_str();
                let prompt = command.params[1..].join(":");
                handler.generate_content(kind, &prompt).await?;
            }
            CommandKind::Research => handler.research(&command.joined_params()).await?,
            CommandKind::Unknown(_) => handler.unknown(command).await?,
        }
    }
    Ok(())
}
