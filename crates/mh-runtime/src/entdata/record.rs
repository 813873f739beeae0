use mh_parser::{KvNode, KvValue};

use super::token::{next_token, Token};

/// One not-yet-spawned entity as raw `{ "key" "value" ... }` text.
///
/// Every mutation splices the buffer so it always stays a complete record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    data: String,
}

struct Layout<'a> {
    open_end: usize,
    pairs: Vec<(Token<'a>, Token<'a>)>,
    close: Option<Token<'a>>,
}

fn layout(data: &str) -> Layout<'_> {
    let open_end = match next_token(data, 0) {
        Some(token) if token.is_symbol('{') => token.end,
        _ => 0,
    };

    let mut pairs = Vec::new();
    let mut close = None;
    let mut cursor = open_end;
    while let Some(key) = next_token(data, cursor) {
        if key.is_symbol('}') {
            close = Some(key);
            break;
        }
        let Some(value) = next_token(data, key.end) else {
            break;
        };
        if value.is_symbol('}') {
            close = Some(value);
            break;
        }
        cursor = value.end;
        pairs.push((key, value));
    }

    Layout {
        open_end,
        pairs,
        close,
    }
}

fn trim_key(key: &str) -> &str {
    key.trim_end_matches(' ')
}

/// Quotes would split a token in two, so they never reach the buffer.
fn sanitize(text: &str) -> String {
    text.replace('"', "")
}

/// Byte range of the next complete `{ ... }` block at or after `from`.
///
/// Returns `None` at end of input, or when the next token is not `{` or the
/// block never closes.
pub(crate) fn next_record_extent(text: &str, from: usize) -> Option<(usize, usize)> {
    let open = next_token(text, from)?;
    if !open.is_symbol('{') {
        return None;
    }
    let mut cursor = open.end;
    while let Some(token) = next_token(text, cursor) {
        if token.is_symbol('}') {
            return Some((open.start, token.end));
        }
        cursor = token.end;
    }
    None
}

impl Default for EntityRecord {
    fn default() -> Self {
        Self::new_empty()
    }
}

impl EntityRecord {
    pub fn new_empty() -> Self {
        Self {
            data: "{\n}".to_string(),
        }
    }

    /// Parses the first `{ ... }` block of `text`.
    pub fn parse(text: &str) -> Option<Self> {
        let (start, end) = next_record_extent(text, 0)?;
        Some(Self {
            data: text[start..end].to_string(),
        })
    }

    pub(crate) fn from_raw(data: String) -> Self {
        Self { data }
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut data = String::from("{\n");
        for (key, value) in pairs {
            data.push_str("\t\"");
            data.push_str(&sanitize(key.as_ref()));
            data.push_str("\"\t\t\"");
            data.push_str(&sanitize(value.as_ref()));
            data.push_str("\"\n");
        }
        data.push('}');
        Self { data }
    }

    /// Builds a record from a directive node.
    ///
    /// A nested `keyvalues` block becomes the body, with the node's own
    /// `origin`/`angles` carried over. A `connections` block is flattened into
    /// plain pairs and any other nested block is dropped. `classname` is
    /// always the node name.
    pub fn from_directive(node: &KvNode) -> Self {
        let legacy = node.find_block("keyvalues");
        let mut pairs = Vec::new();
        collect_directive_pairs(legacy.unwrap_or(node), &mut pairs);

        let mut record = Self::from_pairs(pairs);
        if legacy.is_some() {
            for key in ["origin", "angles"] {
                if let Some(value) = node.get_string(key) {
                    record.set_key_value(key, value, 0);
                }
            }
        }
        record.set_key_value("classname", &node.name, 0);
        record
    }

    pub fn as_str(&self) -> &str {
        &self.data
    }

    /// Pairs in buffer order, up to the closing brace.
    pub fn pairs(&self) -> RecordPairs<'_> {
        RecordPairs {
            data: &self.data,
            cursor: layout_open_end(&self.data),
            done: false,
        }
    }

    /// First value for `key`, compared case-insensitively.
    pub fn get_key_value(&self, key: &str) -> Option<&str> {
        self.pairs()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value)
    }

    pub fn class_name(&self) -> Option<&str> {
        self.get_key_value("classname")
    }

    pub fn target_name(&self) -> Option<&str> {
        self.get_key_value("targetname")
    }

    pub fn hammer_id(&self) -> Option<i32> {
        self.get_key_value("hammerid").map(mh_core::parse_int_lenient)
    }

    pub fn occurrences(&self, key: &str) -> usize {
        self.pairs().filter(|(name, _)| *name == key).count()
    }

    /// Overwrites the value of the `instance`-th (0-based) occurrence of
    /// `key`, or appends a new pair when there are not that many.
    pub fn set_key_value(&mut self, key: &str, value: &str, instance: usize) {
        let key = sanitize(key);
        let value = sanitize(value);

        let target = layout(&self.data)
            .pairs
            .iter()
            .filter(|(name, _)| trim_key(name.text) == key)
            .nth(instance)
            .map(|(_, token)| (token.start, token.end));

        match target {
            Some((start, end)) => {
                self.data.replace_range(start..end, &format!("\"{}\"", value));
            }
            None => self.insert_value(&key, &value),
        }
    }

    /// Appends `"key" "value"` on its own line right before the closing brace.
    pub fn insert_value(&mut self, key: &str, value: &str) {
        let key = sanitize(key);
        let value = sanitize(value);

        let close = layout(&self.data)
            .close
            .map(|token| token.start)
            .unwrap_or(self.data.len());

        let tail = self.data.split_off(close);
        let tail = tail.strip_prefix('}').unwrap_or(&tail).to_string();
        if self
            .data
            .chars()
            .last()
            .is_some_and(|ch| ch.is_ascii_whitespace())
        {
            self.data.pop();
        }
        self.data
            .push_str(&format!("\n\"{}\" \"{}\"\n}}", key, value));
        self.data.push_str(&tail);
    }

    /// Removes the line holding the first occurrence of `key`, then every
    /// later line with identical text. Returns whether anything was removed.
    pub fn remove_value(&mut self, key: &str) -> bool {
        let key = sanitize(key);

        let range = {
            let layout = layout(&self.data);
            let Some((name, _)) = layout
                .pairs
                .iter()
                .find(|(name, _)| trim_key(name.text) == key)
            else {
                return false;
            };
            let close = layout
                .close
                .map(|token| token.start)
                .unwrap_or(self.data.len());
            let start = self.data[..name.start]
                .rfind('\n')
                .map(|index| index + 1)
                .unwrap_or(0)
                .max(layout.open_end);
            let end = match self.data[name.start..close].find('\n') {
                Some(offset) => name.start + offset + 1,
                None => close,
            };
            start..end
        };

        let line = self.data[range.clone()].to_string();
        let mut cursor = range.start;
        self.data.replace_range(range, "");

        if line.trim().is_empty() {
            return true;
        }
        while let Some(offset) = self.data[cursor..].find(&line) {
            let at = cursor + offset;
            self.data.replace_range(at..at + line.len(), "");
            cursor = at;
        }
        true
    }

    /// Text as written back into the level entity stream.
    pub fn to_lump_text(&self) -> String {
        let mut out = self.data.replace('\t', " ");
        out.push('\n');
        out
    }
}

impl std::fmt::Display for EntityRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.data)
    }
}

fn layout_open_end(data: &str) -> usize {
    match next_token(data, 0) {
        Some(token) if token.is_symbol('{') => token.end,
        _ => 0,
    }
}

fn collect_directive_pairs(node: &KvNode, out: &mut Vec<(String, String)>) {
    for child in node.children() {
        match &child.value {
            KvValue::Text(value) => out.push((child.name.clone(), value.clone())),
            KvValue::Block(_) if child.name.eq_ignore_ascii_case("connections") => {
                collect_directive_pairs(child, out);
            }
            KvValue::Block(_) => {}
        }
    }
}

/// Cursor over the pairs of a record.
pub struct RecordPairs<'a> {
    data: &'a str,
    cursor: usize,
    done: bool,
}

impl<'a> Iterator for RecordPairs<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let key = next_token(self.data, self.cursor).filter(|token| !token.is_symbol('}'));
        let value = key
            .and_then(|key| next_token(self.data, key.end))
            .filter(|token| !token.is_symbol('}'));
        match (key, value) {
            (Some(key), Some(value)) => {
                self.cursor = value.end;
                Some((trim_key(key.text), value.text))
            }
            _ => {
                self.done = true;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIGHT: &str = "{\n\"classname\" \"light\"\n\"angle\" \"0\"\n\"angle\" \"0\"\n\"targetname\" \"lamp\"\n}";

    #[test]
    fn set_key_value_is_idempotent_for_single_key() {
        let mut record = EntityRecord::parse(LIGHT).expect("record should parse");
        record.set_key_value("targetname", "lamp_2", 0);
        record.set_key_value("targetname", "lamp_2", 0);
        assert_eq!(record.get_key_value("targetname"), Some("lamp_2"));
        assert_eq!(record.occurrences("targetname"), 1);
    }

    #[test]
    fn insert_then_get_on_fresh_record() {
        let mut record = EntityRecord::parse("{ }").expect("record should parse");
        record.insert_value("foo", "bar");
        assert_eq!(record.get_key_value("foo"), Some("bar"));
        assert_eq!(record.as_str(), "{\n\"foo\" \"bar\"\n}");
    }

    #[test]
    fn instance_addresses_only_that_occurrence() {
        let mut record = EntityRecord::parse(LIGHT).expect("record should parse");
        record.set_key_value("angle", "90", 1);
        let angles = record
            .pairs()
            .filter(|(key, _)| *key == "angle")
            .map(|(_, value)| value)
            .collect::<Vec<_>>();
        assert_eq!(angles, vec!["0", "90"]);
    }

    #[test]
    fn missing_instance_appends_before_closing_brace() {
        let mut record = EntityRecord::parse(LIGHT).expect("record should parse");
        record.set_key_value("angle", "180", 2);
        assert_eq!(record.occurrences("angle"), 3);
        assert!(record.as_str().ends_with("\"angle\" \"180\"\n}"));
    }

    #[test]
    fn get_key_value_is_case_insensitive_and_stops_at_brace() {
        let record = EntityRecord::parse("{ \"Origin\" \"1 2 3\" } \"late\" \"x\"")
            .expect("record should parse");
        assert_eq!(record.get_key_value("origin"), Some("1 2 3"));
        assert_eq!(record.get_key_value("late"), None);
    }

    #[test]
    fn remove_value_drops_line_and_identical_lines() {
        let mut record = EntityRecord::parse(LIGHT).expect("record should parse");
        assert!(record.remove_value("angle"));
        assert_eq!(record.occurrences("angle"), 0);
        assert_eq!(record.get_key_value("targetname"), Some("lamp"));
        assert!(!record.remove_value("angle"));
        assert!(record.as_str().starts_with('{'));
        assert!(record.as_str().ends_with('}'));
    }

    #[test]
    fn remove_value_keeps_distinct_lines_with_same_key() {
        let mut record =
            EntityRecord::parse("{\n\"OnTrigger\" \"a,Open\"\n\"OnTrigger\" \"b,Close\"\n}")
                .expect("record should parse");
        assert!(record.remove_value("OnTrigger"));
        assert_eq!(record.get_key_value("OnTrigger"), Some("b,Close"));
    }

    #[test]
    fn quotes_are_stripped_from_written_text() {
        let mut record = EntityRecord::new_empty();
        record.set_key_value("message", "say \"hi\"", 0);
        assert_eq!(record.get_key_value("message"), Some("say hi"));
    }

    #[test]
    fn lump_text_replaces_tabs() {
        let record = EntityRecord::from_pairs([("classname", "info_target")]);
        assert_eq!(record.to_lump_text(), "{\n \"classname\"  \"info_target\"\n}\n");
    }

    #[test]
    fn directive_with_legacy_keyvalues_and_connections() {
        let node = KvNode::block(
            "func_button",
            vec![
                KvNode::text("origin", "10 0 0"),
                KvNode::block(
                    "keyvalues",
                    vec![
                        KvNode::text("targetname", "btn"),
                        KvNode::text("origin", "0 0 0"),
                    ],
                ),
                KvNode::block(
                    "connections",
                    vec![KvNode::text("OnPressed", "door,Open,,0,-1")],
                ),
            ],
        );
        let record = EntityRecord::from_directive(&node);
        assert_eq!(record.class_name(), Some("func_button"));
        assert_eq!(record.get_key_value("origin"), Some("10 0 0"));
        assert_eq!(record.target_name(), Some("btn"));
        assert_eq!(record.get_key_value("OnPressed"), None);
    }

    #[test]
    fn directive_connections_flatten_into_pairs() {
        let node = KvNode::block(
            "logic_relay",
            vec![
                KvNode::text("targetname", "relay"),
                KvNode::block(
                    "connections",
                    vec![KvNode::text("OnTrigger", "door,Open,,0,-1")],
                ),
                KvNode::block("ignored", vec![KvNode::text("x", "1")]),
            ],
        );
        let record = EntityRecord::from_directive(&node);
        assert_eq!(record.get_key_value("OnTrigger"), Some("door,Open,,0,-1"));
        assert_eq!(record.get_key_value("x"), None);
        assert_eq!(record.class_name(), Some("logic_relay"));
    }
}
