// Output normalization helpers

/// Remove ANSI escape sequences from captured output.
///
/// Sinks receive raw lines so observers keep their colors; verification
/// and status parsing run over the stripped text so escape bytes never
/// break a pattern match.
pub fn strip_ansi(text: &str) -> String {
    String::from_utf8_lossy(&strip_ansi_escapes::strip(text)).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_color_codes() {
        let colored = "\x1b[32mGreen text\x1b[0m";
        let plain = strip_ansi(colored);
        assert_eq!(plain, "Green text");
        assert!(!plain.contains('\x1b'));
    }

    #[test]
    fn plain_text_unchanged() {
        assert_eq!(strip_ansi("Status Check Complete"), "Status Check Complete");
    }
}
