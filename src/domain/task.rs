use crate::domain::ids::{ColumnId, TaskId, UserId};
use crate::domain::normalize_title;
use crate::error::{PlankoError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Priority of a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
        }
    }
}

impl FromStr for Priority {
    type Err = PlankoError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(PlankoError::InvalidPriority(s.to_string())),
        }
    }
}

/// Where a task sits: its column and its position among siblings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPosition {
    pub column_id: ColumnId,
    pub order_index: u32,
}

/// A kanban task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub column_id: ColumnId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<UserId>,
    pub order_index: u32,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Creates a new medium-priority task at the given position
    pub fn new(column_id: ColumnId, title: String, order_index: u32) -> Self {
        Self {
            id: TaskId::new(),
            column_id,
            title,
            description: None,
            priority: Priority::default(),
            due_date: None,
            assignee_id: None,
            order_index,
            created_at: Utc::now(),
        }
    }

    pub fn position(&self) -> TaskPosition {
        TaskPosition {
            column_id: self.column_id,
            order_index: self.order_index,
        }
    }

    pub fn set_position(&mut self, position: TaskPosition) {
        self.column_id = position.column_id;
        self.order_index = position.order_index;
    }

    /// Applies a field patch, validating the title if one is given
    pub fn apply(&mut self, update: &TaskUpdate) -> Result<()> {
        if let Some(title) = &update.title {
            self.title = normalize_title(title)?;
        }
        if let Some(description) = &update.description {
            self.description = description
                .as_ref()
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty());
        }
        if let Some(priority) = update.priority {
            self.priority = priority;
        }
        if let Some(due_date) = update.due_date {
            self.due_date = due_date;
        }
        if let Some(assignee_id) = update.assignee_id {
            self.assignee_id = assignee_id;
        }
        Ok(())
    }

    /// A task is overdue once the whole of its due day has passed
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.due_date
            .map(|due| due.date_naive() < now.date_naive())
            .unwrap_or(false)
    }
}

/// Partial update of a task's editable fields.
///
/// Outer `None` leaves a field untouched; for the nullable fields
/// `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<Option<UserId>>,
}

impl TaskUpdate {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn due_date(mut self, due_date: Option<DateTime<Utc>>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn assignee(mut self, assignee_id: Option<UserId>) -> Self {
        self.assignee_id = Some(assignee_id);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
