/// Tracks the prefix of the current utterance already forwarded to the
/// relay, so only unsent suffixes go over the wire.
///
/// Valid for one connection lifetime: reset on reconnect and whenever an
/// utterance is committed, since the remote side consumes deltas, not state.
#[derive(Debug, Default)]
pub struct SentTextCursor {
    sent: String,
}

impl SentTextCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the unsent suffix of `full` and advance the cursor to cover
    /// all of it. If `full` does not extend the cursor (engine restarts reset
    /// numbering), the cursor is discarded and the whole string is new.
    pub fn delta(&mut self, full: &str) -> String {
        let delta = if full.starts_with(&self.sent) {
            full[self.sent.len()..].trim().to_string()
        } else {
            full.trim().to_string()
        };
        self.sent = full.to_string();
        delta
    }

    pub fn reset(&mut self) {
        self.sent.clear();
    }

    pub fn sent(&self) -> &str {
        &self.sent
    }
}
