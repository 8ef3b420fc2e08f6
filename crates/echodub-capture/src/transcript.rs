use echodub_core::{RecognizerEvent, TextDelta, TranscriptView};
use regex::Regex;
use std::sync::OnceLock;

/// Sentence-ending punctuation that triggers an early forward of interim
/// text. Covers Latin terminators plus Arabic and Devanagari full stops.
fn sentence_end() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("[.!?؛।]").unwrap())
}

/// Character-count length of the longest common prefix of two strings.
pub fn longest_common_prefix(a: &str, b: &str) -> usize {
    a.chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .count()
}

fn join_speech(a: &str, b: &str) -> String {
    let mut s = String::with_capacity(a.len() + b.len() + 1);
    s.push_str(a);
    s.push(' ');
    s.push_str(b);
    s.trim().to_string()
}

fn last_chars(s: &str, n: usize) -> String {
    let count = s.chars().count();
    if count <= n {
        return s.to_string();
    }
    s.chars().skip(count - n).collect()
}

const INTERIM_DISPLAY_CHARS: usize = 160;

/// Monotonic transcript built from revisable recognizer output.
///
/// `finals` is the human-visible history; `carried` is the unflushed
/// remainder after a punctuation split, re-used as the baseline for the next
/// interim merge. Mutated only by `apply` / `pause_flush` / the reset ops.
#[derive(Debug, Default)]
pub struct TranscriptState {
    finals: Vec<String>,
    interim: String,
    carried: String,
    last_interim: String,
}

impl TranscriptState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one recognizer event in, returning any deltas to forward.
    pub fn apply(&mut self, event: &RecognizerEvent) -> Vec<TextDelta> {
        if event.is_final {
            return self.apply_final(&event.text);
        }
        self.apply_interim(&event.text)
    }

    fn apply_final(&mut self, text: &str) -> Vec<TextDelta> {
        let final_text = join_speech(&self.carried, text);
        self.carried.clear();
        self.interim.clear();
        self.last_interim.clear();

        if final_text.is_empty() {
            // Nothing visible, but the remote side still needs the utterance
            // closed out.
            return vec![TextDelta {
                text: String::new(),
                commit: true,
            }];
        }

        self.finals.push(final_text.clone());
        vec![TextDelta {
            text: final_text,
            commit: true,
        }]
    }

    fn apply_interim(&mut self, text: &str) -> Vec<TextDelta> {
        let merged = join_speech(&self.carried, text);

        if let Some(m) = sentence_end().find(&merged) {
            let upto = merged[..m.end()].trim().to_string();
            let rest = merged[m.end()..].trim().to_string();

            let mut out = Vec::new();
            if !upto.is_empty() {
                self.finals.push(upto.clone());
                out.push(TextDelta {
                    text: upto,
                    commit: false,
                });
            }
            self.carried = rest.clone();
            self.interim = rest;
            return out;
        }

        // No terminator yet: show only the suffix that survived revision, so
        // the visible interim text does not flicker as the engine rewrites
        // its estimate.
        let p = longest_common_prefix(&self.last_interim, &merged);
        let stable: String = merged.chars().skip(p).collect();
        self.interim = last_chars(&stable, INTERIM_DISPLAY_CHARS);
        self.last_interim = merged;
        Vec::new()
    }

    /// Force-commit carried text after a pause with no recognizer activity.
    pub fn pause_flush(&mut self) -> Option<TextDelta> {
        let pending = self.carried.trim().to_string();
        if pending.is_empty() {
            return None;
        }
        self.finals.push(pending.clone());
        self.interim.clear();
        self.carried.clear();
        Some(TextDelta {
            text: pending,
            commit: true,
        })
    }

    pub fn has_carried(&self) -> bool {
        !self.carried.trim().is_empty()
    }

    /// Clear the interim display without touching finalized history.
    pub fn clear_interim(&mut self) {
        self.interim.clear();
        self.carried.clear();
        self.last_interim.clear();
    }

    /// Wipe everything, including the visible history.
    pub fn clear(&mut self) {
        self.finals.clear();
        self.clear_interim();
    }

    pub fn view(&self) -> TranscriptView {
        TranscriptView {
            finals: self.finals.clone(),
            interim: self.interim.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interim(text: &str) -> RecognizerEvent {
        RecognizerEvent {
            text: text.to_string(),
            is_final: false,
        }
    }

    fn final_ev(text: &str) -> RecognizerEvent {
        RecognizerEvent {
            text: text.to_string(),
            is_final: true,
        }
    }

    // ── Group A: longest_common_prefix ──────────────────────────

    #[test]
    fn test_lcp_identical() {
        assert_eq!(longest_common_prefix("hello", "hello"), 5);
    }

    #[test]
    fn test_lcp_partial() {
        assert_eq!(longest_common_prefix("hello there", "hello world"), 6);
    }

    #[test]
    fn test_lcp_empty() {
        assert_eq!(longest_common_prefix("", "anything"), 0);
        assert_eq!(longest_common_prefix("anything", ""), 0);
    }

    #[test]
    fn test_lcp_counts_chars_not_bytes() {
        assert_eq!(longest_common_prefix("नमस्ते दुनिया", "नमस्ते जी"), 7);
    }

    // ── Group B: interim merging and stabilization ──────────────

    #[test]
    fn test_interim_no_punctuation_forwards_nothing() {
        let mut state = TranscriptState::new();
        let deltas = state.apply(&interim("hello there"));
        assert!(deltas.is_empty());
        assert_eq!(state.view().interim, "hello there");
    }

    #[test]
    fn test_interim_revision_shows_stable_suffix() {
        let mut state = TranscriptState::new();
        state.apply(&interim("hello there"));
        state.apply(&interim("hello there friend"));
        // Only the newly appended suffix is displayed.
        assert_eq!(state.view().interim, " friend");
    }

    #[test]
    fn test_interim_display_truncated_to_last_160_chars() {
        let mut state = TranscriptState::new();
        let long = "x".repeat(400);
        state.apply(&interim(&long));
        assert_eq!(state.view().interim.chars().count(), 160);
    }

    #[test]
    fn test_interim_punctuation_splits_and_forwards() {
        let mut state = TranscriptState::new();
        let deltas = state.apply(&interim("Hello there. How are you"));
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].text, "Hello there.");
        assert!(!deltas[0].commit);

        let view = state.view();
        assert_eq!(view.finals, vec!["Hello there.".to_string()]);
        assert_eq!(view.interim, "How are you");
        assert!(state.has_carried());
    }

    #[test]
    fn test_interim_punctuation_first_occurrence_only() {
        let mut state = TranscriptState::new();
        let deltas = state.apply(&interim("One. Two. Three"));
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].text, "One.");
        // Remainder, second terminator included, is carried as-is.
        assert_eq!(state.view().interim, "Two. Three");
    }

    #[test]
    fn test_interim_non_latin_terminator_splits() {
        let mut state = TranscriptState::new();
        let deltas = state.apply(&interim("नमस्ते। कैसे हो"));
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].text, "नमस्ते।");
        assert_eq!(state.view().interim, "कैसे हो");
    }

    #[test]
    fn test_carried_text_prefixes_next_interim() {
        let mut state = TranscriptState::new();
        state.apply(&interim("Wait here. okay"));
        // carried = "okay"; the next interim merges behind it.
        let deltas = state.apply(&interim("so I think"));
        assert!(deltas.is_empty());
        assert!(state.has_carried());
        // Merged text is "okay so I think"; no terminator, nothing forwarded.
        assert_eq!(state.view().finals, vec!["Wait here.".to_string()]);
    }

    // ── Group C: finals ──────────────────────────────────────────

    #[test]
    fn test_final_event_commits_verbatim() {
        let mut state = TranscriptState::new();
        let deltas = state.apply(&final_ev("hello world"));
        assert_eq!(
            deltas,
            vec![TextDelta {
                text: "hello world".to_string(),
                commit: true,
            }],
        );
        assert_eq!(state.view().finals, vec!["hello world".to_string()]);
    }

    #[test]
    fn test_final_event_merges_carried() {
        let mut state = TranscriptState::new();
        state.apply(&interim("Right. so"));
        let deltas = state.apply(&final_ev("we begin"));
        assert_eq!(deltas[0].text, "so we begin");
        assert!(deltas[0].commit);
        assert_eq!(
            state.view().finals,
            vec!["Right.".to_string(), "so we begin".to_string()],
        );
        assert!(!state.has_carried());
    }

    #[test]
    fn test_final_event_empty_still_commits() {
        let mut state = TranscriptState::new();
        let deltas = state.apply(&final_ev(""));
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].text, "");
        assert!(deltas[0].commit);
        assert!(state.view().finals.is_empty());
    }

    #[test]
    fn test_final_event_clears_interim_display() {
        let mut state = TranscriptState::new();
        state.apply(&interim("some partial"));
        state.apply(&final_ev("some partial text"));
        assert_eq!(state.view().interim, "");
    }

    // ── Group D: pause flush ─────────────────────────────────────

    #[test]
    fn test_pause_flush_commits_carried() {
        let mut state = TranscriptState::new();
        state.apply(&interim("Hello there. How are you"));
        let flushed = state.pause_flush().unwrap();
        assert_eq!(flushed.text, "How are you");
        assert!(flushed.commit);
        assert_eq!(
            state.view().finals,
            vec!["Hello there.".to_string(), "How are you".to_string()],
        );
        assert_eq!(state.view().interim, "");
    }

    #[test]
    fn test_pause_flush_nothing_pending() {
        let mut state = TranscriptState::new();
        assert!(state.pause_flush().is_none());
        state.apply(&interim("no terminator here"));
        // Interim text without a split is not carried, so nothing to flush.
        assert!(state.pause_flush().is_none());
    }

    #[test]
    fn test_pause_flush_is_idempotent() {
        let mut state = TranscriptState::new();
        state.apply(&interim("Done. leftover"));
        assert!(state.pause_flush().is_some());
        assert!(state.pause_flush().is_none());
    }

    // ── Group E: reset operations ────────────────────────────────

    #[test]
    fn test_clear_interim_preserves_finals() {
        let mut state = TranscriptState::new();
        state.apply(&final_ev("kept"));
        state.apply(&interim("dropped"));
        state.clear_interim();
        let view = state.view();
        assert_eq!(view.finals, vec!["kept".to_string()]);
        assert_eq!(view.interim, "");
    }

    #[test]
    fn test_clear_wipes_everything() {
        let mut state = TranscriptState::new();
        state.apply(&final_ev("one"));
        state.apply(&interim("two"));
        state.clear();
        assert_eq!(state.view(), TranscriptView::default());
    }
}
