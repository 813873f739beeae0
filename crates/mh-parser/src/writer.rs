use crate::kv::{KvNode, KvValue};

pub fn escape_kv_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out
}

/// Serializes a node tree in the tab-indented layout the parser reads back.
pub fn write_kv_document(node: &KvNode) -> String {
    let mut out = String::new();
    write_node(node, 0, &mut out);
    out
}

/// Serializes only the children of a block at the given depth.
pub fn write_kv_children(children: &[KvNode], depth: usize, out: &mut String) {
    for child in children {
        write_node(child, depth, out);
    }
}

fn write_node(node: &KvNode, depth: usize, out: &mut String) {
    indent(depth, out);
    out.push('"');
    out.push_str(&escape_kv_string(&node.name));
    out.push('"');
    match &node.value {
        KvValue::Text(value) => {
            out.push_str("\t\t\"");
            out.push_str(&escape_kv_string(value));
            out.push_str("\"\n");
        }
        KvValue::Block(children) => {
            out.push('\n');
            indent(depth, out);
            out.push_str("{\n");
            write_kv_children(children, depth + 1, out);
            indent(depth, out);
            out.push_str("}\n");
        }
    }
}

fn indent(depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push('\t');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::parse_kv_document;

    #[test]
    fn write_kv_document_uses_tab_layout() {
        let node = KvNode::block(
            "maphack",
            vec![
                KvNode::text("msg", "say \"hi\""),
                KvNode::block("entities", vec![]),
            ],
        );
        let text = write_kv_document(&node);
        assert_eq!(
            text,
            "\"maphack\"\n{\n\t\"msg\"\t\t\"say \\\"hi\\\"\"\n\t\"entities\"\n\t{\n\t}\n}\n"
        );
    }

    #[test]
    fn written_documents_parse_back_to_same_tree() {
        let source = r#""maphack" { "vars" { "x" { "type" "float" "value" "1.5" } } "path" "a\\b" }"#;
        let parsed = parse_kv_document(source).expect("source should parse");
        let reparsed = parse_kv_document(&write_kv_document(&parsed)).expect("output should parse");
        assert_eq!(reparsed.children().len(), parsed.children().len());
        assert_eq!(reparsed.get_string("path"), Some("a\\b"));
        let var = reparsed
            .find("vars")
            .and_then(|vars| vars.find("x"))
            .expect("variable block");
        assert_eq!(var.get_string("value"), Some("1.5"));
    }
}
