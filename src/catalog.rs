//! Static roster and task catalog loaded from JSON files at startup
use crate::domain::models::{Role, Task, User};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("duplicate user id in roster")]
    DuplicateUser,
    #[error("duplicate task id {0}")]
    DuplicateTask(String),
    #[error("task {task} has duplicate {what} id {id}")]
    DuplicateItem {
        task: String,
        what: &'static str,
        id: String,
    },
}

#[derive(Debug, Clone)]
pub struct Catalog {
    users: Vec<User>,
    tasks: Vec<Task>,
}

impl Catalog {
    pub fn load(users_path: &Path, tasks_path: &Path) -> Result<Self, CatalogError> {
        let users: Vec<User> = read_json(users_path)?;
        let tasks: Vec<Task> = read_json(tasks_path)?;
        Self::from_parts(users, tasks)
    }

    pub fn from_parts(users: Vec<User>, tasks: Vec<Task>) -> Result<Self, CatalogError> {
        let mut user_ids = HashSet::new();
        for user in &users {
            // The id is the access key, so it is never echoed into the error.
            if !user_ids.insert(user.id.as_str()) {
                return Err(CatalogError::DuplicateUser);
            }
        }

        let mut task_ids = HashSet::new();
        for task in &tasks {
            if !task_ids.insert(task.id()) {
                return Err(CatalogError::DuplicateTask(task.id().to_string()));
            }
            check_task_items(task)?;
        }

        for user in &users {
            for assigned in &user.assigned_tasks {
                if !task_ids.contains(assigned.as_str()) {
                    tracing::warn!(
                        "User {} is assigned to unknown task {}",
                        user.full_name(),
                        assigned
                    );
                }
            }
        }

        tracing::info!("Catalog loaded: {} users, {} tasks", users.len(), tasks.len());
        Ok(Self { users, tasks })
    }

    /// Exact match on the trimmed key. An empty key never matches.
    pub fn find_user_by_key(&self, key: &str) -> Option<&User> {
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        self.users.iter().find(|u| u.id == key)
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id() == id)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Tasks visible to a user: everything for admins, assigned tasks otherwise.
    pub fn tasks_for(&self, user: &User) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| user.is_admin() || user.is_assigned(t.id()))
            .collect()
    }

    pub fn assigned_participants(&self, task_id: &str) -> Vec<&User> {
        self.users
            .iter()
            .filter(|u| u.role == Role::User && u.is_assigned(task_id))
            .collect()
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CatalogError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| CatalogError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn check_task_items(task: &Task) -> Result<(), CatalogError> {
    let duplicate = |what: &'static str, id: &str| CatalogError::DuplicateItem {
        task: task.id().to_string(),
        what,
        id: id.to_string(),
    };

    match task {
        Task::CardSorting(t) => {
            let mut seen = HashSet::new();
            for card in &t.cards {
                if !seen.insert(card.id.as_str()) {
                    return Err(duplicate("card", &card.id));
                }
            }
        }
        Task::Alternatives(t) => {
            let mut seen = HashSet::new();
            for question in &t.questions {
                if !seen.insert(question.id.as_str()) {
                    return Err(duplicate("question", &question.id));
                }
                let mut alternatives = HashSet::new();
                for alt in &question.alternatives {
                    if !alternatives.insert(alt.id.as_str()) {
                        return Err(duplicate("alternative", &alt.id));
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::domain::models::{
        Alternative, AlternativesTask, Card, CardSortingTask, Question,
    };

    pub fn user(id: &str, role: Role, tasks: &[&str]) -> User {
        User {
            id: id.to_string(),
            first_name: id.trim_start_matches("key-").to_string(),
            last_name: String::new(),
            role,
            assigned_tasks: tasks.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn sorting_task(id: &str, cards: &[(&str, &str)]) -> Task {
        Task::CardSorting(CardSortingTask {
            id: id.to_string(),
            title: format!("Task {id}"),
            description: "Group the cards".to_string(),
            cards: cards
                .iter()
                .map(|(id, content)| Card {
                    id: id.to_string(),
                    content: content.to_string(),
                })
                .collect(),
            created_by: Some("key-admin".to_string()),
        })
    }

    pub fn survey_task(id: &str) -> Task {
        Task::Alternatives(AlternativesTask {
            id: id.to_string(),
            title: format!("Survey {id}"),
            description: String::new(),
            questions: vec![Question {
                id: "q1".into(),
                text: "Where would you look for invoices?".into(),
                alternatives: vec![
                    Alternative { id: "a1".into(), text: "Account".into() },
                    Alternative { id: "a2".into(), text: "Payments".into() },
                ],
            }],
            created_by: None,
        })
    }

    pub fn catalog() -> Catalog {
        Catalog::from_parts(
            vec![
                user("key-admin", Role::Admin, &[]),
                user("key-ana", Role::User, &["sort", "survey"]),
                user("key-luis", Role::User, &["sort"]),
            ],
            vec![
                sorting_task("sort", &[("c1", "Perfil"), ("c2", "Contraseña"), ("c3", "Facturas")]),
                survey_task("survey"),
            ],
        )
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use std::io::Write;

    #[test]
    fn test_login_key_exact_match() {
        let catalog = catalog();
        assert_eq!(catalog.find_user_by_key("key-ana").unwrap().id, "key-ana");
        assert_eq!(catalog.find_user_by_key("  key-ana\n").unwrap().id, "key-ana");
        assert!(catalog.find_user_by_key("KEY-ANA").is_none());
        assert!(catalog.find_user_by_key("key-an").is_none());
        assert!(catalog.find_user_by_key("key-ana2").is_none());
        assert!(catalog.find_user_by_key("").is_none());
        assert!(catalog.find_user_by_key("   ").is_none());
    }

    #[test]
    fn test_tasks_for_user_and_admin() {
        let catalog = catalog();
        let luis = catalog.user("key-luis").unwrap();
        let ids: Vec<&str> = catalog.tasks_for(luis).iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec!["sort"]);

        let admin = catalog.user("key-admin").unwrap();
        assert_eq!(catalog.tasks_for(admin).len(), 2);
    }

    #[test]
    fn test_assigned_participants_skip_admins() {
        let catalog = Catalog::from_parts(
            vec![
                user("key-boss", Role::Admin, &["sort"]),
                user("key-ana", Role::User, &["sort"]),
            ],
            vec![sorting_task("sort", &[("c1", "A")])],
        )
        .unwrap();
        assert_eq!(catalog.assigned_participants("sort").len(), 1);
    }

    #[test]
    fn test_duplicates_rejected() {
        let users = vec![user("k", Role::User, &[]), user("k", Role::Admin, &[])];
        assert!(matches!(
            Catalog::from_parts(users, vec![]),
            Err(CatalogError::DuplicateUser)
        ));

        let tasks = vec![sorting_task("t", &[("c1", "A"), ("c1", "B")])];
        assert!(matches!(
            Catalog::from_parts(vec![], tasks),
            Err(CatalogError::DuplicateItem { what: "card", .. })
        ));
    }

    #[test]
    fn test_load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let users_path = dir.path().join("users.json");
        let tasks_path = dir.path().join("tasks.json");

        let mut users = std::fs::File::create(&users_path).unwrap();
        write!(
            users,
            r#"[{{"id":"abc","firstName":"Ana","lastName":"Rojas","role":"user","assignedTasks":["t1"]}}]"#
        )
        .unwrap();
        let mut tasks = std::fs::File::create(&tasks_path).unwrap();
        write!(
            tasks,
            r#"[{{"id":"t1","type":"card_sorting","title":"Menu","description":"","cards":[{{"id":"c1","content":"Perfil"}}]}}]"#
        )
        .unwrap();

        let catalog = Catalog::load(&users_path, &tasks_path).unwrap();
        assert_eq!(catalog.users().len(), 1);
        assert_eq!(catalog.task("t1").unwrap().title(), "Menu");
    }

    #[test]
    fn test_bundled_config_loads() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("config");
        let catalog = Catalog::load(&root.join("users.json"), &root.join("tasks.json")).unwrap();
        assert!(catalog.users().iter().any(|u| u.is_admin()));
        assert_eq!(catalog.assigned_participants("menu-sort").len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Catalog::load(&dir.path().join("nope.json"), &dir.path().join("t.json")).unwrap_err();
        assert!(matches!(err, CatalogError::Read { .. }));
    }
}
