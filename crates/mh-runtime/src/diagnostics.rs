use mh_core::MapHackError;

/// Most entries kept before the oldest are dropped.
pub const MAX_DIAGNOSTICS: usize = 256;

/// Non-fatal problems raised while loading or running a script.
///
/// Every entry is also emitted as a `tracing` warning. Only the newest
/// [`MAX_DIAGNOSTICS`] entries are retained; older ones are counted in
/// [`Diagnostics::dropped`].
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    entries: Vec<MapHackError>,
    dropped: usize,
}

impl Diagnostics {
    pub fn warn(&mut self, code: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(code, "{}", message);
        self.record(MapHackError::new(code, message));
    }

    pub fn push(&mut self, error: MapHackError) {
        tracing::warn!(code = error.code.as_str(), "{}", error.message);
        self.record(error);
    }

    fn record(&mut self, error: MapHackError) {
        if self.entries.len() == MAX_DIAGNOSTICS {
            self.entries.remove(0);
            self.dropped += 1;
        }
        self.entries.push(error);
    }

    pub fn entries(&self) -> &[MapHackError] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn last(&self) -> Option<&MapHackError> {
        self.entries.last()
    }

    /// Entries discarded to stay within [`MAX_DIAGNOSTICS`].
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.entries.iter().any(|entry| entry.code == code)
    }

    /// Drains the retained entries and clears the drop count.
    pub fn take(&mut self) -> Vec<MapHackError> {
        self.dropped = 0;
        std::mem::take(&mut self.entries)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_drains_entries() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.warn("MH_VAR_MISSING", "Variable \"x\" does not exist.");
        assert!(diagnostics.has_code("MH_VAR_MISSING"));
        let taken = diagnostics.take();
        assert_eq!(taken.len(), 1);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn oldest_entries_are_dropped_past_the_cap() {
        let mut diagnostics = Diagnostics::default();
        for index in 0..MAX_DIAGNOSTICS + 10 {
            diagnostics.warn("MH_VAR_MISSING", format!("miss {}", index));
        }
        assert_eq!(diagnostics.len(), MAX_DIAGNOSTICS);
        assert_eq!(diagnostics.dropped(), 10);
        assert_eq!(diagnostics.entries()[0].message, "miss 10");
        assert_eq!(
            diagnostics.last().map(|entry| entry.message.as_str()),
            Some(format!("miss {}", MAX_DIAGNOSTICS + 9).as_str())
        );

        assert_eq!(diagnostics.take().len(), MAX_DIAGNOSTICS);
        assert_eq!(diagnostics.dropped(), 0);
    }
}
