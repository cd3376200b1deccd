/// Upper bound on the characters of one user message.
pub const MAX_INPUT_CHARS: usize = 4000;

/// Prepare raw user input for sending: drop every `<` and `>`, trim, then keep
/// at most `max_chars` characters. Returns `None` when nothing is left.
pub fn sanitize_input(raw: &str, max_chars: usize) -> Option<String> {
    let stripped: String = raw.chars().filter(|c| !matches!(c, '<' | '>')).collect();
    let sanitized: String = stripped.trim().chars().take(max_chars).collect();
    (!sanitized.is_empty()).then_some(sanitized)
}
