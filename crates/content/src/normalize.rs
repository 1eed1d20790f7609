//! Formatting normalization for blob content.
//!
//! Applied after the safety screen and before size-bound enforcement:
//! line endings are unified to `\n`, trailing whitespace is trimmed per
//! line, and runs of blank lines beyond the configured maximum are
//! collapsed. Fenced code blocks are protected from per-line trimming and
//! blank-run collapsing when `preserve_code_blocks` is set.

use storyloom_config::ContentConfig;

/// Normalize `content` according to `config`.
pub fn normalize(content: &str, config: &ContentConfig) -> String {
    let unified = content.replace("\r\n", "\n").replace('\r', "\n");

    let mut out: Vec<String> = Vec::new();
    let mut blank_run = 0usize;
    let mut in_fence = false;

    for line in unified.lines() {
        let is_fence_marker = line.trim_start().starts_with("```");

        if config.preserve_code_blocks && is_fence_marker {
            in_fence = !in_fence;
            blank_run = 0;
            out.push(line.trim_end().to_string());
            continue;
        }

        if config.preserve_code_blocks && in_fence {
            out.push(line.to_string());
            continue;
        }

        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            blank_run += 1;
            if blank_run > config.max_blank_run {
                continue;
            }
            out.push(String::new());
        } else {
            blank_run = 0;
            out.push(trimmed.to_string());
        }
    }

    out.join("\n")
}
