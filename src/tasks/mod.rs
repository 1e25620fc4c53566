use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct Task {
    /// Creation timestamp in milliseconds, unique within the list.
    pub id: i64,
    pub text: String,
    pub done: bool,
}

/// Tasks in insertion order.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone, Default)]
#[serde(transparent)]
pub struct TaskList {
    tasks: Vec<Task>,
}

impl TaskList {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    /// Appends a task. Blank text is ignored.
    pub fn add(&mut self, text: &str, now_ms: i64) -> Option<&Task> {
        if text.trim().is_empty() {
            debug!("Ignoring empty task");
            return None;
        }
        let id = match self.tasks.iter().map(|t| t.id).max() {
            Some(last) if last >= now_ms => last + 1,
            _ => now_ms,
        };
        self.tasks.push(Task {
            id,
            text: text.to_string(),
            done: false,
        });
        info!("Added task {id}");
        self.tasks.last()
    }

    pub fn toggle(&mut self, id: i64) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                task.done = !task.done;
                info!("Task {id} done: {}", task.done);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: i64) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        let removed = self.tasks.len() != before;
        if removed {
            info!("Removed task {id}");
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.tasks.iter().filter(|t| !t.done).count()
    }
}
