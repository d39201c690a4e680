//! Splitting compound questions into independent sub-questions

use regex::Regex;

use crate::error::{Error, Result};
use crate::types::SubQuestion;

/// Enumeration markers such as `1.`, `2)`, `a.`, `B)`
const MARKER_PATTERN: &str = r"(?:^|[\s(])(\d{1,2}|[A-Za-z])[.)](?:\s+|$)";

/// English and Vietnamese conjunctions between clauses
const CONJUNCTION_PATTERN: &str = r"(?i)\s+(?:and|và)\s+";

/// Punctuation that already terminates a fragment
const TERMINAL: &[char] = &['?', '.', '!', '？', '。'];

/// Rule-based question decomposer.
///
/// Rules are tried in order and the first one that yields two or more
/// fragments wins:
/// 1. sequential numbered or lettered markers
/// 2. `and` / `và` conjunctions, when every fragment is long enough
/// 3. several `?`-terminated clauses that are long enough
pub struct QueryDecomposer {
    min_fragment_chars: usize,
    enabled: bool,
    marker: Regex,
    conjunction: Regex,
}

struct Marker {
    /// Start of the text preceding the marker (whitespace included)
    start: usize,
    /// First byte after the marker
    end: usize,
    label: String,
}

impl QueryDecomposer {
    pub fn new(min_fragment_chars: usize, enabled: bool) -> Result<Self> {
        Ok(Self {
            min_fragment_chars,
            enabled,
            marker: Regex::new(MARKER_PATTERN)
                .map_err(|e| Error::internal(format!("marker pattern: {}", e)))?,
            conjunction: Regex::new(CONJUNCTION_PATTERN)
                .map_err(|e| Error::internal(format!("conjunction pattern: {}", e)))?,
        })
    }

    /// Split `question` into sub-questions. Never returns an empty list; a
    /// question that is not compound comes back unchanged as the only entry.
    pub fn decompose(&self, question: &str) -> Vec<SubQuestion> {
        let fragments = if self.enabled {
            self.split_markers(question)
                .or_else(|| self.split_conjunctions(question))
                .or_else(|| self.split_question_marks(question))
        } else {
            None
        };

        match fragments {
            Some(fragments) => {
                let asked = question.contains('?');
                let subs: Vec<SubQuestion> = fragments
                    .into_iter()
                    .enumerate()
                    .map(|(index, fragment)| SubQuestion::new(finish(fragment, asked), index))
                    .collect();
                tracing::info!("Decomposed question into {} sub-questions", subs.len());
                subs
            }
            None => vec![SubQuestion::new(question.to_string(), 0)],
        }
    }

    fn split_markers(&self, question: &str) -> Option<Vec<String>> {
        let candidates: Vec<Marker> = self
            .marker
            .captures_iter(question)
            .filter_map(|cap| {
                let whole = cap.get(0)?;
                let label = cap.get(1)?;
                Some(Marker {
                    start: whole.start(),
                    end: whole.end(),
                    label: label.as_str().to_string(),
                })
            })
            .collect();

        let markers = sequential(&candidates, |n| Some(n.to_string()))
            .or_else(|| sequential(&candidates, |n| letter(b'a', n)))
            .or_else(|| sequential(&candidates, |n| letter(b'A', n)))?;

        let fragments: Vec<String> = markers
            .iter()
            .enumerate()
            .map(|(i, marker)| {
                let end = markers.get(i + 1).map_or(question.len(), |next| next.start);
                clean(&question[marker.end..end])
            })
            .filter(|f| !f.is_empty())
            .collect();

        (fragments.len() >= 2).then_some(fragments)
    }

    fn split_conjunctions(&self, question: &str) -> Option<Vec<String>> {
        let fragments: Vec<String> = self.conjunction.split(question).map(clean).collect();
        let long_enough = fragments
            .iter()
            .all(|f| f.chars().count() > self.min_fragment_chars);

        (fragments.len() >= 2 && long_enough).then_some(fragments)
    }

    fn split_question_marks(&self, question: &str) -> Option<Vec<String>> {
        let fragments: Vec<String> = question
            .split_inclusive('?')
            .map(clean)
            .filter(|f| f.chars().count() > self.min_fragment_chars)
            .collect();

        let clauses = fragments.iter().filter(|f| f.ends_with('?')).count();
        (fragments.len() >= 2 && clauses >= 2).then_some(fragments)
    }
}

/// The longest run of markers labelled by `label(1), label(2), ...` in text order
fn sequential<'a, F>(candidates: &'a [Marker], label: F) -> Option<Vec<&'a Marker>>
where
    F: Fn(usize) -> Option<String>,
{
    let mut taken: Vec<&Marker> = Vec::new();
    for candidate in candidates {
        if label(taken.len() + 1).as_deref() == Some(candidate.label.as_str()) {
            taken.push(candidate);
        }
    }
    (taken.len() >= 2).then_some(taken)
}

fn letter(base: u8, n: usize) -> Option<String> {
    let offset = u8::try_from(n.checked_sub(1)?).ok()?;
    (offset < 26).then(|| char::from(base + offset).to_string())
}

fn clean(fragment: &str) -> String {
    fragment
        .trim()
        .trim_end_matches(&[',', ';'][..])
        .trim()
        .to_string()
}

fn finish(fragment: String, asked: bool) -> String {
    if asked && !fragment.ends_with(TERMINAL) {
        format!("{}?", fragment)
    } else {
        fragment
    }
}
