use super::backend::SessionPayload;
use crate::store::{ActionItem, Flashcard, KeyTerm, Session, SessionStatus};

/// Items that carry user-override flags and a text identity for matching.
trait Reconcilable: Clone {
    /// Case-insensitive identity used to pair local and incoming items.
    fn key(&self) -> String;

    /// Protected items are never overwritten by an automated merge.
    fn protected(&self) -> bool;
}

impl Reconcilable for KeyTerm {
    fn key(&self) -> String {
        self.term.trim().to_lowercase()
    }
    fn protected(&self) -> bool {
        self.is_user_created || self.is_edited
    }
}

impl Reconcilable for Flashcard {
    fn key(&self) -> String {
        self.question.trim().to_lowercase()
    }
    fn protected(&self) -> bool {
        self.is_user_created || self.is_edited
    }
}

impl Reconcilable for ActionItem {
    fn key(&self) -> String {
        self.text.trim().to_lowercase()
    }
    fn protected(&self) -> bool {
        self.is_user_created || self.is_edited
    }
}

/// Fold regenerated items into the local list.
///
/// - protected local items (user-created or edited) are retained verbatim
/// - unprotected local items matched by key are replaced in place
/// - unprotected local items with no incoming match are superseded and dropped
/// - every incoming item not used as a replacement is appended, including ones
///   whose key collides with a protected item (kept as a separate entry)
fn merge_items<T: Reconcilable>(local: Vec<T>, incoming: Vec<T>) -> Vec<T> {
    let mut used = vec![false; incoming.len()];
    let mut merged = Vec::with_capacity(local.len() + incoming.len());

    for item in local {
        if item.protected() {
            merged.push(item);
            continue;
        }

        let replacement = incoming
            .iter()
            .enumerate()
            .find(|(i, inc)| !used[*i] && inc.key() == item.key());
        if let Some((i, inc)) = replacement {
            used[i] = true;
            merged.push(inc.clone());
        }
    }

    for (i, inc) in incoming.into_iter().enumerate() {
        if !used[i] {
            merged.push(inc);
        }
    }

    merged
}

/// Merge a completed backend result into the local session record.
///
/// Transcript, segments and purely-automated insight sections are replaced
/// wholesale; the override-flagged collections go through `merge_items` so
/// user work survives regeneration. Status becomes `Ready`.
pub fn merge_payload(local: &mut Session, payload: SessionPayload) {
    local.transcript = payload.transcript;
    local.transcript_segments = payload.transcript_segments;

    let mut incoming = payload.insights;

    match local.insights.take() {
        None => {
            local.insights = Some(incoming);
        }
        Some(existing) => {
            // Pinned summary survives regeneration.
            if existing.summary.is_pinned {
                incoming.summary = existing.summary;
            }
            incoming.key_terms = merge_items(existing.key_terms, incoming.key_terms);
            incoming.flashcards = merge_items(existing.flashcards, incoming.flashcards);
            incoming.action_items = merge_items(existing.action_items, incoming.action_items);
            local.insights = Some(incoming);
        }
    }

    local.status = SessionStatus::Ready;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(question: &str, answer: &str) -> Flashcard {
        Flashcard {
            question: question.to_string(),
            answer: answer.to_string(),
            confidence: 0.9,
            source_segments: vec![],
            is_user_created: false,
            is_edited: false,
            is_pinned: false,
            original: None,
        }
    }

    #[test]
    fn protected_item_retained_and_collision_appended() {
        let mut mine = card("What is entropy?", "my own answer");
        mine.is_user_created = true;

        let theirs = card("What is entropy?", "generated answer");

        let merged = merge_items(vec![mine], vec![theirs]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].answer, "my own answer");
        assert!(merged[0].is_user_created);
        assert_eq!(merged[1].answer, "generated answer");
    }

    #[test]
    fn unprotected_match_replaced_in_place() {
        let old = card("Define osmosis", "stale");
        let keep = card("Other card", "unrelated");
        let new = card("define osmosis", "fresh");

        let merged = merge_items(vec![old, keep], vec![new]);

        // Stale automated card replaced (case-insensitive key), the
        // unmatched automated card is superseded and dropped.
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].answer, "fresh");
    }

    #[test]
    fn edited_item_not_overwritten() {
        let mut edited = card("Q1", "edited by hand");
        edited.is_edited = true;
        edited.original = Some(("Q1".to_string(), "machine text".to_string()));

        let merged = merge_items(vec![edited], vec![card("Q2", "new")]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].answer, "edited by hand");
        assert!(merged[0].is_edited);
    }
}
