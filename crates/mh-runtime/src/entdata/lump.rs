use super::record::{next_record_extent, EntityRecord};
use super::token::next_token;

/// Splits a raw level entity stream into one record per `{ ... }` block.
///
/// Parsing stops at the first token that does not open a block, or at a
/// block that never closes.
pub fn parse_lump(text: &str) -> Vec<EntityRecord> {
    let mut records = Vec::new();
    let mut cursor = 0usize;
    while next_token(text, cursor).is_some() {
        let Some((start, end)) = next_record_extent(text, cursor) else {
            tracing::warn!(offset = cursor, "malformed entity data, stopping");
            break;
        };
        records.push(EntityRecord::from_raw(text[start..end].to_string()));
        cursor = end;
    }
    records
}

/// Flattens records back into one entity stream.
pub fn finalize_lump(records: &[EntityRecord]) -> String {
    records.iter().map(EntityRecord::to_lump_text).collect()
}
