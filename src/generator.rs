//! Subtask breakdown from a language model.
//!
//! Only the prompt and the response parsing live here; the transport to a
//! model is supplied by the embedder through [`SubtaskGenerator`].

use crate::domain::TaskId;
use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Input for a breakdown: the task being split up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownRequest {
    pub task_id: TaskId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Produces subtask titles for a task
#[async_trait]
pub trait SubtaskGenerator: Send + Sync {
    async fn generate(&self, request: &BreakdownRequest) -> anyhow::Result<Vec<String>>;
}

/// Builds the instruction sent to the model
pub fn breakdown_prompt(request: &BreakdownRequest) -> String {
    let description = request
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| format!(" (Description: {})", d))
        .unwrap_or_default();

    format!(
        "You are a project manager. Break down the task '{}'{} into 3-5 actionable subtasks. \
         Return ONLY a raw JSON array of strings (e.g. [\"Task 1\", \"Task 2\"]). \
         Do not use Markdown formatting or code blocks.",
        request.title, description
    )
}

/// Parses model output into subtask titles.
///
/// Markdown code fences are stripped before parsing. Titles are trimmed and
/// blank ones dropped.
pub fn parse_breakdown(text: &str) -> anyhow::Result<Vec<String>> {
    let cleaned = text.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        bail!("model returned an empty response");
    }

    let value: serde_json::Value =
        serde_json::from_str(cleaned).context("model did not return valid JSON")?;
    let items = match value {
        serde_json::Value::Array(items) => items,
        _ => bail!("model response was not an array"),
    };

    let mut titles = Vec::with_capacity(items.len());
    for item in items {
        match item {
            serde_json::Value::String(title) => {
                let title = title.trim();
                if !title.is_empty() {
                    titles.push(title.to_string());
                }
            }
            other => bail!("expected a string subtask, got {}", other),
        }
    }
    Ok(titles)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(description: Option<&str>) -> BreakdownRequest {
        BreakdownRequest {
            task_id: TaskId::new(),
            title: "Launch landing page".to_string(),
            description: description.map(str::to_string),
        }
    }

    #[test]
    fn test_prompt_mentions_task() {
        let prompt = breakdown_prompt(&request(Some("Marketing site for v2")));
        assert!(prompt.contains("'Launch landing page'"));
        assert!(prompt.contains("(Description: Marketing site for v2)"));
        assert!(prompt.contains("3-5 actionable subtasks"));

        let prompt = breakdown_prompt(&request(Some("   ")));
        assert!(!prompt.contains("Description"));
    }

    #[test]
    fn test_parse_plain_array() {
        let titles = parse_breakdown(r#"["Draft copy", " Pick hosting ", ""]"#).unwrap();
        assert_eq!(titles, vec!["Draft copy", "Pick hosting"]);
    }

    #[test]
    fn test_parse_fenced_array() {
        let text = "```json\n[\"Design hero\", \"Wire signup form\"]\n```";
        let titles = parse_breakdown(text).unwrap();
        assert_eq!(titles, vec!["Design hero", "Wire signup form"]);
    }

    #[test]
    fn test_parse_rejects_non_arrays() {
        assert!(parse_breakdown(r#"{"subtasks": []}"#).is_err());
        assert!(parse_breakdown("Sure! Here are some subtasks").is_err());
        assert!(parse_breakdown("[1, 2]").is_err());
        assert!(parse_breakdown("```\n```").is_err());
    }
}
