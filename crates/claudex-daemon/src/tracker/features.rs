/// Braille spinner glyphs used by agent CLIs to indicate in-progress work.
const SPINNER_GLYPHS: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

const TOOL_WORDS: [&str; 4] = ["Reading", "Writing", "Executing", "Searching"];
const TOOL_HEADERS: [&str; 2] = ["── Edit", "── Bash"];

const AGENT_UI_GLYPHS: [&str; 3] = ["╭─", "╰─", "│ "];

/// True if `line` contains a braille spinner code point.
pub fn has_spinner(line: &str) -> bool {
    line.chars().any(|c| SPINNER_GLYPHS.contains(&c))
}

/// True if `line` names a tool action, a boxed tool header, or a
/// completion marker (`✓` or a spinner prefix).
pub fn has_tool_pattern(line: &str) -> bool {
    if TOOL_WORDS.iter().any(|w| line.contains(w)) {
        return true;
    }
    if TOOL_HEADERS.iter().any(|h| line.contains(h)) {
        return true;
    }
    if line.contains('✓') {
        return true;
    }
    has_spinner(line)
}

/// True if `line` carries the agent's characteristic chrome: box-drawing
/// glyphs, banner text, cost/token accounting, or a tool-result marker.
pub fn has_agent_ui(line: &str) -> bool {
    if AGENT_UI_GLYPHS.iter().any(|g| line.contains(g)) {
        return true;
    }
    if line.contains("tokens") || line.contains("cost:") || line.contains("$0.") {
        return true;
    }
    if line.trim_start().starts_with('⎿') {
        return true;
    }
    false
}

/// True if `line` looks like a plain shell prompt, not an agent prompt.
pub fn has_shell_prompt(line: &str) -> bool {
    let trimmed = line.trim_end();
    if trimmed.ends_with('$') || trimmed.ends_with('%') || trimmed.ends_with('#') {
        return true;
    }
    if trimmed.contains('❯') && !has_agent_ui(line) {
        return true;
    }
    if trimmed.contains('@') && (trimmed.contains(':') || trimmed.contains('~')) && !has_agent_ui(line) {
        return true;
    }
    false
}

/// True if `line` looks like an agent's own input prompt (as opposed to a
/// plain shell prompt), used to disambiguate the sticky `agent_active`
/// context verdict.
pub fn looks_like_agent_prompt(line: &str) -> bool {
    let trimmed = line.trim_end();
    if trimmed.ends_with('>') || trimmed.ends_with("> ") {
        return true;
    }
    trimmed.contains("> ") && trimmed.contains('│')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_spinner_glyph() {
        assert!(has_spinner("⠋ Thinking..."));
        assert!(!has_spinner("just text"));
    }

    #[test]
    fn detects_tool_words() {
        assert!(has_tool_pattern("Reading src/lib.rs"));
        assert!(has_tool_pattern("Searching for pattern"));
        assert!(!has_tool_pattern("nothing to see here"));
    }

    #[test]
    fn detects_boxed_tool_headers() {
        assert!(has_tool_pattern("── Edit src/main.rs ──"));
        assert!(has_tool_pattern("── Bash ──"));
    }

    #[test]
    fn detects_completion_marker() {
        assert!(has_tool_pattern("✓ Done in 3s"));
    }

    #[test]
    fn detects_agent_ui_glyphs() {
        assert!(has_agent_ui("╭─ agent ─╮"));
        assert!(has_agent_ui("│ some content"));
        assert!(has_agent_ui("Tokens used: 1234"));
    }

    #[test]
    fn detects_shell_prompt_suffix() {
        assert!(has_shell_prompt("user@host:~$"));
        assert!(has_shell_prompt("root@box:/etc#"));
        assert!(!has_shell_prompt("just some output"));
    }

    #[test]
    fn shell_prompt_with_agent_marker_is_not_a_shell_prompt() {
        assert!(!has_shell_prompt("╭─ user@host ❯"));
    }

    #[test]
    fn agent_prompt_heuristics() {
        assert!(looks_like_agent_prompt("> "));
        assert!(looks_like_agent_prompt("│ > "));
        assert!(!looks_like_agent_prompt("plain text"));
    }
}
