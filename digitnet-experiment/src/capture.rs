/// Interprets `\b` and `\r` the way a terminal would, so progress output collapses to what was
/// last visible on each line. A `\r` that ends the text is kept so a following write can still
/// overwrite the line.
pub fn apply_backspaces_and_linefeeds(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let last_line = lines.len() - 1;
    let mut result = Vec::with_capacity(lines.len());
    for (line_idx, line) in lines.iter().enumerate() {
        let line: Vec<char> = line.chars().collect();
        let mut chars: Vec<char> = Vec::with_capacity(line.len());
        let mut cursor: usize = 0;
        for (char_idx, &c) in line.iter().enumerate() {
            let at_end = line_idx == last_line && char_idx == line.len() - 1;
            match c {
                '\r' if !at_end => cursor = 0,
                '\u{8}' => cursor = cursor.saturating_sub(1),
                _ => {
                    if c == '\r' {
                        cursor = chars.len();
                    }
                    if cursor == chars.len() {
                        chars.push(c);
                    } else {
                        chars[cursor] = c;
                    }
                    cursor += 1;
                }
            }
        }
        result.push(chars.into_iter().collect::<String>());
    }
    result.join("\n")
}

#[cfg(test)]
mod test {
    use super::apply_backspaces_and_linefeeds;

    #[test]
    fn test_plain_text() {
        assert_eq!("", apply_backspaces_and_linefeeds(""));
        assert_eq!("a\nb\n", apply_backspaces_and_linefeeds("a\nb\n"));
    }

    #[test]
    fn test_backspace() {
        assert_eq!("abd", apply_backspaces_and_linefeeds("abc\u{8}d"));
        assert_eq!("xbc", apply_backspaces_and_linefeeds("abc\u{8}\u{8}\u{8}\u{8}x"));
    }

    #[test]
    fn test_carriage_return() {
        assert_eq!("50%0%", apply_backspaces_and_linefeeds("10%\r20%\r50%0%"));
        assert_eq!("done\nnext", apply_backspaces_and_linefeeds("1/3\r2/3\rdone\nnext"));
        assert_eq!("2211 3", apply_backspaces_and_linefeeds("1111 3\r22"));
    }

    #[test]
    fn test_trailing_carriage_return_kept() {
        assert_eq!("abc\r", apply_backspaces_and_linefeeds("abc\r"));
        assert_eq!("b\nx\r", apply_backspaces_and_linefeeds("a\rb\nx\r"));
        assert_eq!("b\n", apply_backspaces_and_linefeeds("a\rb\r\n"));
    }
}
