use crate::domain::models::{
    AlternativesSubmission, AlternativesTask, Answer, CardSortingCategory, CardSortingSubmission,
    CardSortingTask, Submission, Task, TaskKind, User,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub card_ids: Vec<String>,
}

/// What a participant sends when finishing a task.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubmissionDraft {
    CardSorting { categories: Vec<CategoryDraft> },
    Alternatives { answers: Vec<Answer> },
}

impl SubmissionDraft {
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::CardSorting { .. } => TaskKind::CardSorting,
            Self::Alternatives { .. } => TaskKind::Alternatives,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SubmissionError {
    #[error("submission type {submitted} does not match task type {expected}")]
    KindMismatch { expected: &'static str, submitted: &'static str },
    #[error("category name must not be empty")]
    EmptyCategoryName,
    #[error("unknown card {0}")]
    UnknownCard(String),
    #[error("card {0} was placed more than once")]
    DuplicateCard(String),
    #[error("{0} card(s) were left unsorted")]
    UnsortedCards(usize),
    #[error("unknown question {0}")]
    UnknownQuestion(String),
    #[error("alternative {alternative} does not belong to question {question}")]
    UnknownAlternative { question: String, alternative: String },
    #[error("question {0} was answered more than once")]
    DuplicateAnswer(String),
    #[error("{0} question(s) were left unanswered")]
    UnansweredQuestions(usize),
}

pub fn new_submission_id() -> String {
    format!("sub-{}", Uuid::new_v4())
}

/// Checks a draft against its task and turns it into a stored submission.
pub fn build_submission(
    task: &Task,
    user: &User,
    draft: SubmissionDraft,
    completed_at: DateTime<Utc>,
) -> Result<Submission, SubmissionError> {
    match (task, draft) {
        (Task::CardSorting(task), SubmissionDraft::CardSorting { categories }) => {
            let results = validate_card_sorting(task, categories)?;
            Ok(Submission::CardSorting(CardSortingSubmission {
                id: new_submission_id(),
                user_id: user.id.clone(),
                task_id: task.id.clone(),
                results,
                completed_at,
            }))
        }
        (Task::Alternatives(task), SubmissionDraft::Alternatives { answers }) => {
            let answers = validate_alternatives(task, answers)?;
            Ok(Submission::Alternatives(AlternativesSubmission {
                id: new_submission_id(),
                user_id: user.id.clone(),
                task_id: task.id.clone(),
                answers,
                completed_at,
            }))
        }
        (task, draft) => Err(SubmissionError::KindMismatch {
            expected: task.kind().as_str(),
            submitted: draft.kind().as_str(),
        }),
    }
}

fn validate_card_sorting(
    task: &CardSortingTask,
    drafts: Vec<CategoryDraft>,
) -> Result<Vec<CardSortingCategory>, SubmissionError> {
    let cards: HashMap<&str, _> = task.cards.iter().map(|c| (c.id.as_str(), c)).collect();
    let mut placed: HashSet<String> = HashSet::new();
    let mut kept = Vec::new();

    for (idx, draft) in drafts.into_iter().enumerate() {
        // Empty categories are dropped before anything else is checked.
        if draft.card_ids.is_empty() {
            continue;
        }
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(SubmissionError::EmptyCategoryName);
        }

        let mut category_cards = Vec::with_capacity(draft.card_ids.len());
        for card_id in draft.card_ids {
            let card = cards
                .get(card_id.as_str())
                .ok_or_else(|| SubmissionError::UnknownCard(card_id.clone()))?;
            if !placed.insert(card_id.clone()) {
                return Err(SubmissionError::DuplicateCard(card_id));
            }
            category_cards.push((*card).clone());
        }

        let id = draft
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        kept.push((idx, id, name.to_string(), category_cards));
    }

    let unsorted = task.cards.len() - placed.len();
    if unsorted > 0 {
        return Err(SubmissionError::UnsortedCards(unsorted));
    }

    // Generated ids never reuse one the client supplied.
    let reserved: HashSet<String> = kept.iter().filter_map(|(_, id, _, _)| id.clone()).collect();
    let mut used: HashSet<String> = HashSet::new();
    let results: Vec<CardSortingCategory> = kept
        .into_iter()
        .map(|(idx, id, name, cards)| {
            let id = match id {
                Some(id) if used.insert(id.clone()) => id,
                _ => next_category_id(idx + 1, &reserved, &mut used),
            };
            CardSortingCategory { id, name, cards }
        })
        .collect();

    Ok(results)
}

fn next_category_id(start: usize, reserved: &HashSet<String>, used: &mut HashSet<String>) -> String {
    let mut n = start;
    loop {
        let candidate = format!("cat-{n}");
        if !reserved.contains(&candidate) && used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn validate_alternatives(
    task: &AlternativesTask,
    answers: Vec<Answer>,
) -> Result<Vec<Answer>, SubmissionError> {
    let mut answered: HashSet<String> = HashSet::new();

    for answer in &answers {
        let question = task
            .questions
            .iter()
            .find(|q| q.id == answer.question_id)
            .ok_or_else(|| SubmissionError::UnknownQuestion(answer.question_id.clone()))?;

        if !question
            .alternatives
            .iter()
            .any(|a| a.id == answer.selected_alternative_id)
        {
            return Err(SubmissionError::UnknownAlternative {
                question: answer.question_id.clone(),
                alternative: answer.selected_alternative_id.clone(),
            });
        }

        if !answered.insert(answer.question_id.clone()) {
            return Err(SubmissionError::DuplicateAnswer(answer.question_id.clone()));
        }
    }

    let unanswered = task.questions.len() - answered.len();
    if unanswered > 0 {
        return Err(SubmissionError::UnansweredQuestions(unanswered));
    }

    Ok(answers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Alternative, Card, Question, Role};

    fn participant() -> User {
        User {
            id: "key-ana".into(),
            first_name: "Ana".into(),
            last_name: "Rojas".into(),
            role: Role::User,
            assigned_tasks: vec!["sort".into(), "survey".into()],
        }
    }

    fn sorting_task() -> Task {
        Task::CardSorting(CardSortingTask {
            id: "sort".into(),
            title: "Menu".into(),
            description: String::new(),
            cards: vec![
                Card { id: "c1".into(), content: "Perfil".into() },
                Card { id: "c2".into(), content: "Contraseña".into() },
                Card { id: "c3".into(), content: "Facturas".into() },
            ],
            created_by: None,
        })
    }

    fn survey_task() -> Task {
        Task::Alternatives(AlternativesTask {
            id: "survey".into(),
            title: "Survey".into(),
            description: String::new(),
            questions: vec![
                Question {
                    id: "q1".into(),
                    text: "Where is billing?".into(),
                    alternatives: vec![
                        Alternative { id: "a1".into(), text: "Menu".into() },
                        Alternative { id: "a2".into(), text: "Profile".into() },
                    ],
                },
                Question {
                    id: "q2".into(),
                    text: "Clear labels?".into(),
                    alternatives: vec![
                        Alternative { id: "yes".into(), text: "Yes".into() },
                        Alternative { id: "no".into(), text: "No".into() },
                    ],
                },
            ],
            created_by: None,
        })
    }

    fn category(name: &str, cards: &[&str]) -> CategoryDraft {
        CategoryDraft {
            id: None,
            name: name.to_string(),
            card_ids: cards.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn answer(q: &str, a: &str) -> Answer {
        Answer {
            question_id: q.into(),
            selected_alternative_id: a.into(),
        }
    }

    #[test]
    fn test_card_sorting_draft_builds_submission() {
        let draft = SubmissionDraft::CardSorting {
            categories: vec![
                category("  Cuenta ", &["c1", "c2"]),
                category("Vacía", &[]),
                category("Pagos", &["c3"]),
            ],
        };
        let submission = build_submission(&sorting_task(), &participant(), draft, Utc::now()).unwrap();
        let Submission::CardSorting(s) = submission else {
            panic!("expected card sorting submission");
        };
        assert!(s.id.starts_with("sub-"));
        assert_eq!(s.user_id, "key-ana");
        assert_eq!(s.results.len(), 2);
        assert_eq!(s.results[0].name, "Cuenta");
        assert_eq!(s.results[0].id, "cat-1");
        assert_eq!(s.results[0].cards[1].content, "Contraseña");
        assert_eq!(s.results[1].id, "cat-3");
    }

    #[test]
    fn test_generated_category_ids_avoid_client_ids() {
        let mut first = category("Cuenta", &["c1"]);
        first.id = Some("cat-3".into());
        let draft = SubmissionDraft::CardSorting {
            categories: vec![first, category("Seguridad", &["c2"]), category("Pagos", &["c3"])],
        };
        let Submission::CardSorting(s) =
            build_submission(&sorting_task(), &participant(), draft, Utc::now()).unwrap()
        else {
            panic!("expected card sorting submission");
        };
        let ids: Vec<&str> = s.results.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["cat-3", "cat-2", "cat-4"]);

        let mut a = category("A", &["c1", "c2"]);
        a.id = Some("menu".into());
        let mut b = category("B", &["c3"]);
        b.id = Some(" menu ".into());
        let draft = SubmissionDraft::CardSorting { categories: vec![a, b] };
        let Submission::CardSorting(s) =
            build_submission(&sorting_task(), &participant(), draft, Utc::now()).unwrap()
        else {
            panic!("expected card sorting submission");
        };
        assert_eq!(s.results[0].id, "menu");
        assert_eq!(s.results[1].id, "cat-2");
    }

    #[test]
    fn test_card_sorting_rejects_unsorted_cards() {
        let draft = SubmissionDraft::CardSorting {
            categories: vec![category("Cuenta", &["c1"])],
        };
        let err = build_submission(&sorting_task(), &participant(), draft, Utc::now()).unwrap_err();
        assert_eq!(err, SubmissionError::UnsortedCards(2));
    }

    #[test]
    fn test_card_sorting_rejects_duplicate_and_unknown_cards() {
        let duplicate = SubmissionDraft::CardSorting {
            categories: vec![category("A", &["c1", "c2"]), category("B", &["c2", "c3"])],
        };
        assert_eq!(
            build_submission(&sorting_task(), &participant(), duplicate, Utc::now()).unwrap_err(),
            SubmissionError::DuplicateCard("c2".into())
        );

        let unknown = SubmissionDraft::CardSorting {
            categories: vec![category("A", &["c1", "c2", "c3", "c9"])],
        };
        assert_eq!(
            build_submission(&sorting_task(), &participant(), unknown, Utc::now()).unwrap_err(),
            SubmissionError::UnknownCard("c9".into())
        );
    }

    #[test]
    fn test_card_sorting_rejects_blank_name() {
        let draft = SubmissionDraft::CardSorting {
            categories: vec![category("   ", &["c1", "c2", "c3"])],
        };
        assert_eq!(
            build_submission(&sorting_task(), &participant(), draft, Utc::now()).unwrap_err(),
            SubmissionError::EmptyCategoryName
        );
    }

    #[test]
    fn test_alternatives_require_every_question() {
        let partial = SubmissionDraft::Alternatives {
            answers: vec![answer("q1", "a1")],
        };
        assert_eq!(
            build_submission(&survey_task(), &participant(), partial, Utc::now()).unwrap_err(),
            SubmissionError::UnansweredQuestions(1)
        );

        let complete = SubmissionDraft::Alternatives {
            answers: vec![answer("q1", "a2"), answer("q2", "yes")],
        };
        let submission = build_submission(&survey_task(), &participant(), complete, Utc::now()).unwrap();
        assert!(submission.belongs_to(&survey_task()));
    }

    #[test]
    fn test_alternatives_reject_foreign_alternative() {
        let draft = SubmissionDraft::Alternatives {
            answers: vec![answer("q1", "yes"), answer("q2", "no")],
        };
        assert_eq!(
            build_submission(&survey_task(), &participant(), draft, Utc::now()).unwrap_err(),
            SubmissionError::UnknownAlternative {
                question: "q1".into(),
                alternative: "yes".into()
            }
        );
    }

    #[test]
    fn test_kind_mismatch() {
        let draft = SubmissionDraft::Alternatives { answers: vec![] };
        let err = build_submission(&sorting_task(), &participant(), draft, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            SubmissionError::KindMismatch {
                expected: "card_sorting",
                submitted: "alternatives"
            }
        );
    }

    #[test]
    fn test_draft_json() {
        let raw = r#"{"type":"card_sorting","categories":[{"name":"Cuenta","cardIds":["c1"]}]}"#;
        let draft: SubmissionDraft = serde_json::from_str(raw).unwrap();
        assert_eq!(draft.kind(), TaskKind::CardSorting);
    }
}
