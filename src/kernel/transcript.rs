use crate::services::recognizer::protocol::NO_HANDS_SENTINEL;

/// What the reducer did with one label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Appended,
    /// Equal to the last accepted entry.
    Repeated,
    /// The no-hands sentinel. Never reaches the transcript or the adjacency check.
    Filtered,
}

/// Ordered list of accepted sign labels.
///
/// Invariant: no two adjacent entries are equal. Non-adjacent repeats are kept,
/// so a sign can reappear after a different one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    entries: Vec<String>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pure decision: (tail, label) -> Reduction. Does not mutate.
    pub fn classify(tail: Option<&str>, label: &str) -> Reduction {
        if label == NO_HANDS_SENTINEL {
            Reduction::Filtered
        } else if tail == Some(label) {
            Reduction::Repeated
        } else {
            Reduction::Appended
        }
    }

    pub fn reduce(&mut self, label: &str) -> Reduction {
        let outcome = Self::classify(self.last(), label);
        if outcome == Reduction::Appended {
            self.entries.push(label.to_string());
        }
        outcome
    }

    pub fn last(&self) -> Option<&str> {
        self.entries.last().map(String::as_str)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<S: AsRef<str>> FromIterator<S> for Transcript {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut transcript = Transcript::new();
        for label in iter {
            transcript.reduce(label.as_ref());
        }
        transcript
    }
}
