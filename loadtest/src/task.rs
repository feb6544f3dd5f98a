//! Weighted task selection

use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use serde::Serialize;
use std::fmt;

/// The closed set of tasks a virtual user can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Register,
    Login,
    Logout,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [TaskKind::Register, TaskKind::Login, TaskKind::Logout];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Register => "register",
            TaskKind::Login => "login",
            TaskKind::Logout => "logout",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relative weights per task. Zero disables a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskWeights {
    pub register: u32,
    pub login: u32,
    pub logout: u32,
}

impl Default for TaskWeights {
    fn default() -> Self {
        Self {
            register: 1,
            login: 2,
            logout: 1,
        }
    }
}

impl TaskWeights {
    pub fn weight(&self, task: TaskKind) -> u32 {
        match task {
            TaskKind::Register => self.register,
            TaskKind::Login => self.login,
            TaskKind::Logout => self.logout,
        }
    }

    pub fn total(&self) -> u64 {
        TaskKind::ALL.iter().map(|t| self.weight(*t) as u64).sum()
    }
}

/// Discrete weighted selector over [`TaskKind`]
#[derive(Debug, Clone)]
pub struct TaskSelector {
    index: WeightedIndex<u32>,
}

impl TaskSelector {
    /// Returns `None` when every weight is zero.
    pub fn new(weights: TaskWeights) -> Option<Self> {
        let index = WeightedIndex::new(TaskKind::ALL.iter().map(|t| weights.weight(*t))).ok()?;
        Some(Self { index })
    }

    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> TaskKind {
        TaskKind::ALL[self.index.sample(rng)]
    }
}
