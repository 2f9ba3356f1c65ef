use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

/// A participant or administrator from the static roster.
/// `id` doubles as the access key used to log in.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub role: Role,
    #[serde(default)]
    pub assigned_tasks: Vec<String>,
}

impl User {
    pub fn full_name(&self) -> String {
        let last = self.last_name.trim();
        if last.is_empty() {
            self.first_name.trim().to_string()
        } else {
            format!("{} {}", self.first_name.trim(), last)
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_assigned(&self, task_id: &str) -> bool {
        self.assigned_tasks.iter().any(|t| t == task_id)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Card {
    pub id: String,
    #[serde(alias = "text")]
    pub content: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Alternative {
    pub id: String,
    pub text: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub alternatives: Vec<Alternative>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CardSortingTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub cards: Vec<Card>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlternativesTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub questions: Vec<Question>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    CardSorting,
    Alternatives,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CardSorting => "card_sorting",
            Self::Alternatives => "alternatives",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Task {
    CardSorting(CardSortingTask),
    Alternatives(AlternativesTask),
}

impl Task {
    pub fn id(&self) -> &str {
        match self {
            Self::CardSorting(t) => &t.id,
            Self::Alternatives(t) => &t.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::CardSorting(t) => &t.title,
            Self::Alternatives(t) => &t.title,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::CardSorting(t) => &t.description,
            Self::Alternatives(t) => &t.description,
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            Self::CardSorting(_) => TaskKind::CardSorting,
            Self::Alternatives(_) => TaskKind::Alternatives,
        }
    }

    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            id: self.id().to_string(),
            kind: self.kind(),
            title: self.title().to_string(),
            description: self.description().to_string(),
        }
    }
}

/// Listing view of a task, without cards or questions.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct TaskSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub title: String,
    pub description: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CardSortingCategory {
    pub id: String,
    pub name: String,
    pub cards: Vec<Card>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_id: String,
    pub selected_alternative_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CardSortingSubmission {
    pub id: String,
    pub user_id: String,
    pub task_id: String,
    pub results: Vec<CardSortingCategory>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlternativesSubmission {
    pub id: String,
    pub user_id: String,
    pub task_id: String,
    pub answers: Vec<Answer>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Submission {
    CardSorting(CardSortingSubmission),
    Alternatives(AlternativesSubmission),
}

impl Submission {
    pub fn id(&self) -> &str {
        match self {
            Self::CardSorting(s) => &s.id,
            Self::Alternatives(s) => &s.id,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            Self::CardSorting(s) => &s.user_id,
            Self::Alternatives(s) => &s.user_id,
        }
    }

    pub fn task_id(&self) -> &str {
        match self {
            Self::CardSorting(s) => &s.task_id,
            Self::Alternatives(s) => &s.task_id,
        }
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        match self {
            Self::CardSorting(s) => s.completed_at,
            Self::Alternatives(s) => s.completed_at,
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            Self::CardSorting(_) => TaskKind::CardSorting,
            Self::Alternatives(_) => TaskKind::Alternatives,
        }
    }

    /// Same task id and same variant.
    pub fn belongs_to(&self, task: &Task) -> bool {
        self.task_id() == task.id() && self.kind() == task.kind()
    }
}
