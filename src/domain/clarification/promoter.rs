//! Assumption promoter - turns resolved questions into catalog entries.

use super::assumption::{AssumptionCatalog, AssumptionItem};
use super::question::Question;
use super::text::slugify;

/// Outcome of promoting one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromotionOutcome {
    /// A new item was added under this key.
    Inserted(String),
    /// An equal key or name already existed and was enabled.
    AlreadyPresent(String),
    /// An equal key or name existed disabled and has been re-enabled.
    Reenabled(String),
    /// The question is neither answered nor marked as an assumption.
    NotEligible,
}

/// Stateless conversion and dedup rules for promotion.
pub struct AssumptionPromoter;

impl AssumptionPromoter {
    /// Derives an assumption from an answered or marked question.
    ///
    /// The key is a slug of the question text and the name is the question
    /// text itself; the content line is `Q: … | A: …` when answered and
    /// `Assumption: …` when only marked.
    pub fn to_assumption(question: &Question) -> Option<AssumptionItem> {
        let content_line = question.context_line()?;
        let key = slugify(&question.text);
        if key.is_empty() {
            return None;
        }
        AssumptionItem::new(key, question.text.clone(), content_line).ok()
    }

    /// Inserts the derived assumption unless the catalog already has one with
    /// an equal key or name.
    pub fn promote(catalog: &mut AssumptionCatalog, question: &Question) -> PromotionOutcome {
        let Some(item) = Self::to_assumption(question) else {
            return PromotionOutcome::NotEligible;
        };

        if let Some(existing) = catalog.find(&item.key, &item.name) {
            let key = existing.key.clone();
            if existing.is_enabled {
                return PromotionOutcome::AlreadyPresent(key);
            }
            catalog.set_enabled(&key, true);
            return PromotionOutcome::Reenabled(key);
        }

        let key = item.key.clone();
        catalog.insert(item);
        PromotionOutcome::Inserted(key)
    }

    /// Disables every catalog entry without deleting any.
    pub fn reset_all(catalog: &mut AssumptionCatalog) -> usize {
        catalog.disable_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answered_question_becomes_qa_line() {
        let q = Question::new("Is X true?").unwrap().with_answer("Yes");
        let item = AssumptionPromoter::to_assumption(&q).unwrap();
        assert_eq!(item.key, "is-x-true");
        assert_eq!(item.name, "Is X true?");
        assert_eq!(item.content_line, "Q: Is X true? | A: Yes");
        assert!(item.is_enabled);
        assert!(!item.is_llm_suggested);
    }

    #[test]
    fn marked_question_becomes_plain_assumption() {
        let mut q = Question::new("Logins are local only").unwrap();
        q.marked_as_assumption = true;
        let item = AssumptionPromoter::to_assumption(&q).unwrap();
        assert_eq!(item.content_line, "Assumption: Logins are local only");
    }

    #[test]
    fn unresolved_question_is_not_eligible() {
        let mut catalog = AssumptionCatalog::new();
        let q = Question::new("Open?").unwrap();
        assert_eq!(
            AssumptionPromoter::promote(&mut catalog, &q),
            PromotionOutcome::NotEligible
        );
        assert!(catalog.is_empty());
    }

    #[test]
    fn promoting_questions_with_equal_keys_yields_one_item() {
        let mut catalog = AssumptionCatalog::new();
        let first = Question::new("Is X True?").unwrap().with_answer("Yes");
        let second = Question::new("is x true").unwrap().with_answer("No");

        assert!(matches!(
            AssumptionPromoter::promote(&mut catalog, &first),
            PromotionOutcome::Inserted(_)
        ));
        assert!(matches!(
            AssumptionPromoter::promote(&mut catalog, &second),
            PromotionOutcome::AlreadyPresent(_)
        ));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn promoting_after_reset_reenables_existing_item() {
        let mut catalog = AssumptionCatalog::new();
        let q = Question::new("Is X true?").unwrap().with_answer("Yes");
        AssumptionPromoter::promote(&mut catalog, &q);
        assert_eq!(AssumptionPromoter::reset_all(&mut catalog), 1);

        assert_eq!(
            AssumptionPromoter::promote(&mut catalog, &q),
            PromotionOutcome::Reenabled("is-x-true".to_string())
        );
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.enabled().count(), 1);
    }
}
