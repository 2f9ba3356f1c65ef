//! Aggregation of submissions for the admin results view.
//! Card sorting gets an agreement matrix and per-card category groups,
//! alternatives tasks get per-question tallies.
use crate::catalog::Catalog;
use crate::domain::models::{AlternativesTask, CardSortingTask, Submission, Task};
use serde::Serialize;
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

/// Lowercase, trim, decompose (NFD) and drop combining diacritical marks.
pub fn normalize_category_name(name: &str) -> String {
    name.to_lowercase()
        .trim()
        .nfd()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryGroup {
    key: String,
    pub display_name: String,
    pub count: u32,
    pub original_names: Vec<String>,
}

/// Index of the first group related to `normalized` by prefix in either direction.
fn find_group(groups: &[CategoryGroup], normalized: &str) -> Option<usize> {
    groups
        .iter()
        .position(|g| g.key.starts_with(normalized) || normalized.starts_with(g.key.as_str()))
}

/// Category groups for one card, in creation order.
#[derive(Debug, Default, Clone)]
pub struct CategoryGroups {
    groups: Vec<CategoryGroup>,
}

impl CategoryGroups {
    /// Records one placement under `raw_name`. Blank names are ignored.
    pub fn add(&mut self, raw_name: &str) {
        if raw_name.trim().is_empty() {
            return;
        }
        let normalized = normalize_category_name(raw_name);
        if normalized.is_empty() {
            return;
        }

        match find_group(&self.groups, &normalized) {
            Some(idx) => {
                let group = &mut self.groups[idx];
                group.count += 1;
                if !group.original_names.iter().any(|n| n == raw_name) {
                    group.original_names.push(raw_name.to_string());
                }
            }
            None => self.groups.push(CategoryGroup {
                key: normalized,
                display_name: raw_name.to_string(),
                count: 1,
                original_names: vec![raw_name.to_string()],
            }),
        }
    }

    pub fn total_placements(&self) -> u32 {
        self.groups.iter().map(|g| g.count).sum()
    }

    /// Groups by count, highest first. Ties keep creation order.
    pub fn ranked(&self) -> Vec<RankedGroup> {
        let total = self.total_placements();
        let mut sorted: Vec<&CategoryGroup> = self.groups.iter().collect();
        sorted.sort_by(|a, b| b.count.cmp(&a.count));
        sorted
            .into_iter()
            .map(|g| RankedGroup {
                display_name: g.display_name.clone(),
                count: g.count,
                percentage: percentage(g.count as usize, total as usize),
                original_names: g.original_names.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RankedGroup {
    pub display_name: String,
    pub count: u32,
    pub percentage: f64,
    pub original_names: Vec<String>,
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// How often each unordered pair of cards shared a category.
#[derive(Debug, Default, Clone)]
pub struct AgreementMatrix {
    counts: HashMap<(String, String), u32>,
    submissions: usize,
}

impl AgreementMatrix {
    pub fn from_submissions<'a>(
        submissions: impl IntoIterator<Item = &'a crate::domain::models::CardSortingSubmission>,
    ) -> Self {
        let mut matrix = Self::default();
        for submission in submissions {
            matrix.submissions += 1;
            for category in &submission.results {
                for (i, a) in category.cards.iter().enumerate() {
                    for b in &category.cards[i + 1..] {
                        *matrix.counts.entry(pair_key(&a.id, &b.id)).or_insert(0) += 1;
                    }
                }
            }
        }
        matrix
    }

    pub fn count(&self, a: &str, b: &str) -> u32 {
        self.counts.get(&pair_key(a, b)).copied().unwrap_or(0)
    }

    /// Share of submissions that put both cards in the same category.
    pub fn percentage(&self, a: &str, b: &str) -> f64 {
        percentage(self.count(a, b) as usize, self.submissions)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgreementCell {
    pub row_card_id: String,
    pub col_card_id: String,
    pub count: u32,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CardAnalysis {
    pub card_id: String,
    pub content: String,
    pub total_placements: u32,
    pub groups: Vec<RankedGroup>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResultsSummary {
    pub task_id: String,
    pub title: String,
    pub submissions_received: usize,
    pub assigned_participants: usize,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CardSortingResults {
    #[serde(flatten)]
    pub summary: ResultsSummary,
    /// Lower triangle, rows and columns in the task's card order.
    pub agreement: Vec<AgreementCell>,
    pub cards: Vec<CardAnalysis>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlternativeTally {
    pub alternative_id: String,
    pub text: String,
    pub count: u32,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionTally {
    pub question_id: String,
    pub text: String,
    pub responses: u32,
    pub alternatives: Vec<AlternativeTally>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlternativesResults {
    #[serde(flatten)]
    pub summary: ResultsSummary,
    pub questions: Vec<QuestionTally>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskResults {
    CardSorting(CardSortingResults),
    Alternatives(AlternativesResults),
}

impl TaskResults {
    pub fn summary(&self) -> &ResultsSummary {
        match self {
            Self::CardSorting(r) => &r.summary,
            Self::Alternatives(r) => &r.summary,
        }
    }
}

/// Submission count and completion rate for a task.
pub fn summarize(catalog: &Catalog, task: &Task, submissions: usize) -> ResultsSummary {
    let assigned = catalog.assigned_participants(task.id()).len();
    ResultsSummary {
        task_id: task.id().to_string(),
        title: task.title().to_string(),
        submissions_received: submissions,
        assigned_participants: assigned,
        completion_rate: percentage(submissions, assigned),
    }
}

/// Aggregates every submission belonging to `task`. Others are skipped.
pub fn aggregate(catalog: &Catalog, task: &Task, submissions: &[Submission]) -> TaskResults {
    let relevant: Vec<&Submission> = submissions
        .iter()
        .filter(|s| s.task_id() == task.id())
        .filter(|s| {
            let ok = s.kind() == task.kind();
            if !ok {
                tracing::warn!(
                    "Skipping submission {} for task {}: type {} does not match task type {}",
                    s.id(),
                    task.id(),
                    s.kind().as_str(),
                    task.kind().as_str()
                );
            }
            ok
        })
        .collect();

    let summary = summarize(catalog, task, relevant.len());

    match task {
        Task::CardSorting(t) => {
            TaskResults::CardSorting(aggregate_card_sorting(t, summary, &relevant))
        }
        Task::Alternatives(t) => {
            TaskResults::Alternatives(aggregate_alternatives(t, summary, &relevant))
        }
    }
}

fn aggregate_card_sorting(
    task: &CardSortingTask,
    summary: ResultsSummary,
    submissions: &[&Submission],
) -> CardSortingResults {
    let sorted: Vec<_> = submissions
        .iter()
        .filter_map(|s| match s {
            Submission::CardSorting(s) => Some(s),
            Submission::Alternatives(_) => None,
        })
        .collect();

    let matrix = AgreementMatrix::from_submissions(sorted.iter().copied());

    let mut agreement = Vec::new();
    for (row, row_card) in task.cards.iter().enumerate() {
        for col_card in &task.cards[..row] {
            agreement.push(AgreementCell {
                row_card_id: row_card.id.clone(),
                col_card_id: col_card.id.clone(),
                count: matrix.count(&row_card.id, &col_card.id),
                percentage: matrix.percentage(&row_card.id, &col_card.id),
            });
        }
    }

    let mut groups: HashMap<&str, CategoryGroups> = task
        .cards
        .iter()
        .map(|c| (c.id.as_str(), CategoryGroups::default()))
        .collect();
    for submission in &sorted {
        for category in &submission.results {
            for card in &category.cards {
                if let Some(card_groups) = groups.get_mut(card.id.as_str()) {
                    card_groups.add(&category.name);
                }
            }
        }
    }

    let cards = task
        .cards
        .iter()
        .map(|card| {
            let card_groups = groups.remove(card.id.as_str()).unwrap_or_default();
            CardAnalysis {
                card_id: card.id.clone(),
                content: card.content.clone(),
                total_placements: card_groups.total_placements(),
                groups: card_groups.ranked(),
            }
        })
        .collect();

    CardSortingResults {
        summary,
        agreement,
        cards,
    }
}

fn aggregate_alternatives(
    task: &AlternativesTask,
    summary: ResultsSummary,
    submissions: &[&Submission],
) -> AlternativesResults {
    let mut counts: HashMap<(&str, &str), u32> = HashMap::new();
    for submission in submissions {
        let Submission::Alternatives(s) = submission else {
            continue;
        };
        for answer in &s.answers {
            *counts
                .entry((answer.question_id.as_str(), answer.selected_alternative_id.as_str()))
                .or_insert(0) += 1;
        }
    }

    let questions = task
        .questions
        .iter()
        .map(|q| {
            let tallies: Vec<u32> = q
                .alternatives
                .iter()
                .map(|a| counts.get(&(q.id.as_str(), a.id.as_str())).copied().unwrap_or(0))
                .collect();
            let responses: u32 = tallies.iter().sum();
            QuestionTally {
                question_id: q.id.clone(),
                text: q.text.clone(),
                responses,
                alternatives: q
                    .alternatives
                    .iter()
                    .zip(tallies)
                    .map(|(a, count)| AlternativeTally {
                        alternative_id: a.id.clone(),
                        text: a.text.clone(),
                        count,
                        percentage: percentage(count as usize, responses as usize),
                    })
                    .collect(),
            }
        })
        .collect();

    AlternativesResults { summary, questions }
}
