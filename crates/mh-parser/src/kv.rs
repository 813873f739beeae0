use mh_core::{MapHackError, SourceLocation, SourceSpan};
use regex::Regex;

#[derive(Debug, Clone, PartialEq)]
pub struct KvNode {
    pub name: String,
    pub value: KvValue,
    pub location: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum KvValue {
    Text(String),
    Block(Vec<KvNode>),
}

impl KvNode {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: KvValue::Text(value.into()),
            location: SourceSpan::synthetic(),
        }
    }

    pub fn block(name: impl Into<String>, children: Vec<KvNode>) -> Self {
        Self {
            name: name.into(),
            value: KvValue::Block(children),
            location: SourceSpan::synthetic(),
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self.value, KvValue::Block(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            KvValue::Text(value) => Some(value.as_str()),
            KvValue::Block(_) => None,
        }
    }

    pub fn children(&self) -> &[KvNode] {
        match &self.value {
            KvValue::Block(children) => children.as_slice(),
            KvValue::Text(_) => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<KvNode>> {
        match &mut self.value {
            KvValue::Block(children) => Some(children),
            KvValue::Text(_) => None,
        }
    }

    /// Children that carry their own block, in document order.
    pub fn true_subkeys(&self) -> impl Iterator<Item = &KvNode> {
        self.children().iter().filter(|child| child.is_block())
    }

    /// Children that carry a plain value, in document order.
    pub fn values(&self) -> impl Iterator<Item = &KvNode> {
        self.children().iter().filter(|child| !child.is_block())
    }

    /// First child with a matching name, compared case-insensitively.
    pub fn find(&self, name: &str) -> Option<&KvNode> {
        self.children()
            .iter()
            .find(|child| child.name.eq_ignore_ascii_case(name))
    }

    pub fn find_block(&self, name: &str) -> Option<&KvNode> {
        self.find(name).filter(|child| child.is_block())
    }

    pub fn get_string(&self, name: &str) -> Option<&str> {
        self.find(name).and_then(KvNode::as_text)
    }

    pub fn get_string_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get_string(name).unwrap_or(default)
    }

    pub fn get_float(&self, name: &str, default: f32) -> f32 {
        self.get_string(name)
            .map(mh_core::parse_float_lenient)
            .unwrap_or(default)
    }

    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        self.get_string(name)
            .map(|value| mh_core::parse_int_lenient(value) != 0)
            .unwrap_or(default)
    }

    /// Replaces the first child named `name` with a text value, or appends one.
    pub fn set_string(&mut self, name: &str, value: &str) {
        let Some(children) = self.children_mut() else {
            return;
        };
        if let Some(existing) = children
            .iter_mut()
            .find(|child| child.name.eq_ignore_ascii_case(name))
        {
            existing.value = KvValue::Text(value.to_string());
            return;
        }
        children.push(KvNode::text(name, value));
    }

    pub fn remove(&mut self, name: &str) -> Option<KvNode> {
        let children = self.children_mut()?;
        let index = children
            .iter()
            .position(|child| child.name.eq_ignore_ascii_case(name))?;
        Some(children.remove(index))
    }
}

/// Collects `#base` / `#include` directive paths from a key/value source.
pub fn parse_base_directives(source: &str) -> Vec<String> {
    let regex = Regex::new(r#"(?m)^\s*#(?:base|include)\s+"?([^"\r\n]*?)"?\s*$"#)
        .expect("base directive regex must compile");
    regex
        .captures_iter(source)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|value| !value.is_empty())
        .collect()
}

/// Parses the first top-level block of a key/value source.
pub fn parse_kv_document(source: &str) -> Result<KvNode, MapHackError> {
    let nodes = parse_kv_nodes(source)?;
    nodes
        .into_iter()
        .find(KvNode::is_block)
        .ok_or_else(|| MapHackError::new("KV_PARSE_ERROR", "Document must contain a root block."))
}

/// Parses every top-level node of a key/value source.
pub fn parse_kv_nodes(source: &str) -> Result<Vec<KvNode>, MapHackError> {
    let mut parser = Parser {
        lexer: Lexer::new(source),
        peeked: None,
    };
    parser.parse_nodes(None)
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Str(String),
    Open,
    Close,
    Conditional,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    location: SourceLocation,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
    token_on_line: bool,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
            token_on_line: false,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
            self.token_on_line = false;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.column,
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.chars.peek().copied() {
                Some(ch) if ch.is_whitespace() => {
                    self.bump();
                }
                Some('/') => {
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    if lookahead.peek() == Some(&'/') {
                        self.skip_line();
                    } else {
                        return;
                    }
                }
                Some('#') if !self.token_on_line => self.skip_line(),
                _ => return,
            }
        }
    }

    fn skip_line(&mut self) {
        while let Some(ch) = self.bump() {
            if ch == '\n' {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, MapHackError> {
        self.skip_trivia();
        let location = self.location();
        let Some(ch) = self.chars.peek().copied() else {
            return Ok(None);
        };

        let kind = match ch {
            '{' => {
                self.bump();
                TokenKind::Open
            }
            '}' => {
                self.bump();
                TokenKind::Close
            }
            '"' => {
                self.bump();
                TokenKind::Str(self.read_quoted(location)?)
            }
            '[' => {
                while let Some(ch) = self.bump() {
                    if ch == ']' {
                        break;
                    }
                }
                TokenKind::Conditional
            }
            _ => TokenKind::Str(self.read_bare()),
        };

        self.token_on_line = true;
        Ok(Some(Token { kind, location }))
    }

    fn read_quoted(&mut self, start: SourceLocation) -> Result<String, MapHackError> {
        let mut out = String::new();
        loop {
            let Some(ch) = self.bump() else {
                return Err(MapHackError::with_span(
                    "KV_PARSE_ERROR",
                    "Unterminated quoted string.",
                    SourceSpan {
                        start,
                        end: self.location(),
                    },
                ));
            };
            match ch {
                '"' => return Ok(out),
                '\\' => match self.chars.peek().copied() {
                    Some('n') => {
                        self.bump();
                        out.push('\n');
                    }
                    Some('t') => {
                        self.bump();
                        out.push('\t');
                    }
                    Some('\\') => {
                        self.bump();
                        out.push('\\');
                    }
                    Some('"') => {
                        self.bump();
                        out.push('"');
                    }
                    _ => out.push('\\'),
                },
                _ => out.push(ch),
            }
        }
    }

    fn read_bare(&mut self) -> String {
        let mut out = String::new();
        while let Some(ch) = self.chars.peek().copied() {
            if ch.is_whitespace() || ch == '"' || ch == '{' || ch == '}' {
                break;
            }
            out.push(ch);
            self.bump();
        }
        out
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    peeked: Option<Token>,
}

impl Parser<'_> {
    fn next(&mut self) -> Result<Option<Token>, MapHackError> {
        if let Some(token) = self.peeked.take() {
            return Ok(Some(token));
        }
        self.lexer.next_token()
    }

    fn skip_conditional(&mut self) -> Result<(), MapHackError> {
        let token = self.next()?;
        match token {
            Some(Token {
                kind: TokenKind::Conditional,
                ..
            }) => Ok(()),
            other => {
                self.peeked = other;
                Ok(())
            }
        }
    }

    fn parse_nodes(
        &mut self,
        open: Option<SourceLocation>,
    ) -> Result<Vec<KvNode>, MapHackError> {
        let mut nodes = Vec::new();
        loop {
            let Some(token) = self.next()? else {
                if let Some(start) = open {
                    return Err(MapHackError::with_span(
                        "KV_PARSE_ERROR",
                        "Block is missing its closing brace.",
                        SourceSpan {
                            start,
                            end: self.lexer.location(),
                        },
                    ));
                }
                return Ok(nodes);
            };

            let name = match token.kind {
                TokenKind::Close if open.is_some() => return Ok(nodes),
                TokenKind::Str(name) => name,
                TokenKind::Conditional => continue,
                TokenKind::Close | TokenKind::Open => {
                    return Err(MapHackError::with_span(
                        "KV_PARSE_ERROR",
                        "Expected a key name.",
                        SourceSpan::at(token.location.line, token.location.column),
                    ))
                }
            };

            self.skip_conditional()?;
            let Some(value_token) = self.next()? else {
                return Err(MapHackError::with_span(
                    "KV_PARSE_ERROR",
                    format!("Key \"{}\" has no value.", name),
                    SourceSpan::at(token.location.line, token.location.column),
                ));
            };

            let value = match value_token.kind {
                TokenKind::Str(text) => {
                    self.skip_conditional()?;
                    KvValue::Text(text)
                }
                TokenKind::Open => KvValue::Block(self.parse_nodes(Some(value_token.location))?),
                TokenKind::Close | TokenKind::Conditional => {
                    return Err(MapHackError::with_span(
                        "KV_PARSE_ERROR",
                        format!("Key \"{}\" has no value.", name),
                        SourceSpan::at(value_token.location.line, value_token.location.column),
                    ))
                }
            };

            nodes.push(KvNode {
                name,
                value,
                location: SourceSpan {
                    start: token.location,
                    end: self.lexer.location(),
                },
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
// leading comment
"MapHack"
{
    "vars"
    {
        "health" { "type" "int" "value" "100" }
    }
    "entities"
    {
        "prop_dynamic"
        {
            "targetname" "crate_01"
            "origin"     "1 2 3"
        }
        "$console" { "msg" "hello \"world\"" } // trailing
    }
    includes { file a.txt }
}
"#;

    #[test]
    fn parse_kv_document_builds_ordered_tree() {
        let root = parse_kv_document(SAMPLE).expect("document should parse");
        assert_eq!(root.name, "MapHack");
        let names = root
            .children()
            .iter()
            .map(|child| child.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["vars", "entities", "includes"]);

        let entities = root.find("ENTITIES").expect("entities block");
        let prop = &entities.children()[0];
        assert_eq!(prop.get_string("targetname"), Some("crate_01"));
        assert_eq!(prop.get_string("Origin"), Some("1 2 3"));

        let console = &entities.children()[1];
        assert_eq!(console.get_string("msg"), Some("hello \"world\""));
        assert!(prop.location.start.line > 1);
    }

    #[test]
    fn bare_words_parse_as_strings() {
        let root = parse_kv_document(SAMPLE).expect("document should parse");
        let includes = root.find_block("includes").expect("includes block");
        assert_eq!(includes.get_string("file"), Some("a.txt"));
    }

    #[test]
    fn typed_getters_fall_back_to_defaults() {
        let node = KvNode::block(
            "event",
            vec![
                KvNode::text("delay", "2.5"),
                KvNode::text("repeat", "0"),
            ],
        );
        assert_eq!(node.get_float("delay", 1.0), 2.5);
        assert_eq!(node.get_float("missing", 1.0), 1.0);
        assert!(!node.get_bool("repeat", true));
        assert!(node.get_bool("startdisabled", true));
    }

    #[test]
    fn set_string_replaces_or_appends() {
        let mut node = KvNode::block("prop", vec![KvNode::text("origin", "0 0 0")]);
        node.set_string("ORIGIN", "1 1 1");
        node.set_string("classname", "prop");
        assert_eq!(node.children().len(), 2);
        assert_eq!(node.get_string("origin"), Some("1 1 1"));
        assert!(node.remove("classname").is_some());
        assert!(node.remove("classname").is_none());
    }

    #[test]
    fn conditionals_are_ignored() {
        let root = parse_kv_document(r#""root" { "a" "1" [$WIN32] "b" "2" }"#)
            .expect("document should parse");
        assert_eq!(root.children().len(), 2);
    }

    #[test]
    fn parse_base_directives_extracts_paths() {
        let source = "#base \"shared.txt\"\n#include extra/more.txt\n\"maphack\" {}\n";
        assert_eq!(
            parse_base_directives(source),
            vec!["shared.txt".to_string(), "extra/more.txt".to_string()]
        );
        let root = parse_kv_document(source).expect("directives should be skipped");
        assert_eq!(root.name, "maphack");
    }

    #[test]
    fn unterminated_block_is_an_error() {
        let error = parse_kv_document("\"maphack\" { \"a\" \"b\"").expect_err("should fail");
        assert_eq!(error.code, "KV_PARSE_ERROR");
        assert!(error.span.is_some());
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let error = parse_kv_document("\"maphack\" { \"a").expect_err("should fail");
        assert_eq!(error.code, "KV_PARSE_ERROR");
    }

    #[test]
    fn document_without_block_is_an_error() {
        let error = parse_kv_document("\"a\" \"b\"").expect_err("should fail");
        assert_eq!(error.code, "KV_PARSE_ERROR");
    }
}
