#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Quoted,
    Word,
    Symbol,
}

/// One token of raw entity data.
///
/// `text` excludes surrounding quotes; `start..end` covers the whole token in
/// the source buffer, quotes included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

impl Token<'_> {
    pub fn is_symbol(&self, symbol: char) -> bool {
        self.kind == TokenKind::Symbol && self.text.starts_with(symbol)
    }
}

fn is_symbol_char(byte: u8) -> bool {
    matches!(byte, b'{' | b'}' | b'(' | b')' | b'\'')
}

/// Reads the next token at or after byte offset `from`.
pub(crate) fn next_token(data: &str, from: usize) -> Option<Token<'_>> {
    let bytes = data.as_bytes();
    let mut cursor = from;

    loop {
        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor + 1 < bytes.len() && bytes[cursor] == b'/' && bytes[cursor + 1] == b'/' {
            while cursor < bytes.len() && bytes[cursor] != b'\n' {
                cursor += 1;
            }
            continue;
        }
        break;
    }

    if cursor >= bytes.len() {
        return None;
    }

    let start = cursor;
    let byte = bytes[cursor];

    if byte == b'"' {
        let content_start = cursor + 1;
        let content_end = data[content_start..]
            .find('"')
            .map(|offset| content_start + offset)
            .unwrap_or(bytes.len());
        let end = (content_end + 1).min(bytes.len());
        return Some(Token {
            kind: TokenKind::Quoted,
            text: &data[content_start..content_end],
            start,
            end,
        });
    }

    if is_symbol_char(byte) {
        return Some(Token {
            kind: TokenKind::Symbol,
            text: &data[cursor..cursor + 1],
            start,
            end: cursor + 1,
        });
    }

    while cursor < bytes.len()
        && !bytes[cursor].is_ascii_whitespace()
        && bytes[cursor] != b'"'
        && !is_symbol_char(bytes[cursor])
    {
        cursor += 1;
    }
    Some(Token {
        kind: TokenKind::Word,
        text: &data[start..cursor],
        start,
        end: cursor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(data: &str) -> Vec<(TokenKind, &str)> {
        let mut tokens = Vec::new();
        let mut cursor = 0;
        while let Some(token) = next_token(data, cursor) {
            tokens.push((token.kind, token.text));
            cursor = token.end;
        }
        tokens
    }

    #[test]
    fn splits_quoted_bare_and_symbol_tokens() {
        let tokens = collect("{ \"origin\" \"1 2 3\" // note\n spawnflags 4 }");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Symbol, "{"),
                (TokenKind::Quoted, "origin"),
                (TokenKind::Quoted, "1 2 3"),
                (TokenKind::Word, "spawnflags"),
                (TokenKind::Word, "4"),
                (TokenKind::Symbol, "}"),
            ]
        );
    }

    #[test]
    fn quoted_strings_have_no_escapes() {
        let tokens = collect(r#""a\" "b""#);
        assert_eq!(tokens[0], (TokenKind::Quoted, "a\\"));
        assert_eq!(tokens[1], (TokenKind::Quoted, "b"));
    }

    #[test]
    fn unterminated_quote_runs_to_end() {
        let token = next_token("\"abc", 0).expect("token");
        assert_eq!(token.text, "abc");
        assert_eq!(token.end, 4);
    }

    #[test]
    fn words_break_on_symbols() {
        assert_eq!(
            collect("a(b)c'd"),
            vec![
                (TokenKind::Word, "a"),
                (TokenKind::Symbol, "("),
                (TokenKind::Word, "b"),
                (TokenKind::Symbol, ")"),
                (TokenKind::Word, "c"),
                (TokenKind::Symbol, "'"),
                (TokenKind::Word, "d"),
            ]
        );
    }
}
