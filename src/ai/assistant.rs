use log::debug;
use serde::Deserialize;
use serde_json::json;

use crate::error::{PipeSightError, Result};

use super::client::AiClient;

#[derive(Deserialize)]
struct Created {
    id: String,
}

#[derive(Deserialize)]
struct RunState {
    status: String,
    #[serde(default)]
    last_error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct MessageList {
    #[serde(default)]
    data: Vec<ThreadMessage>,
}

#[derive(Deserialize)]
struct ThreadMessage {
    role: String,
    #[serde(default)]
    content: Vec<MessageContent>,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    text: Option<MessageText>,
}

#[derive(Deserialize)]
struct MessageText {
    value: String,
}

impl AiClient {
    /// Runs a persistent assistant on a fresh thread and returns its reply.
    ///
    /// Creates a thread, posts `user_prompt`, starts a run with `instructions`
    /// as additional instructions and polls until the run reaches a terminal
    /// state. The newest assistant message is returned.
    ///
    /// # Errors
    ///
    /// Fails on any HTTP error, when the run ends as `failed`, `cancelled` or
    /// `expired`, when polling is exhausted, or when no assistant message exists.
    pub async fn run_assistant(
        &self,
        assistant_id: &str,
        user_prompt: &str,
        instructions: Option<&str>,
    ) -> Result<String> {
        let threads_url = self.api_url("threads")?;
        let thread: Created = self
            .send_with_retry(|| self.post(&threads_url, &json!({})))
            .await?
            .json()
            .await?;
        debug!("Created assistant thread {}", thread.id);

        let messages_url = self.api_url(&format!("threads/{}/messages", thread.id))?;
        let message = json!({"role": "user", "content": user_prompt});
        self.send_with_retry(|| self.post(&messages_url, &message))
            .await?;

        let runs_url = self.api_url(&format!("threads/{}/runs", thread.id))?;
        let mut run_body = json!({ "assistant_id": assistant_id });
        if let Some(instructions) = instructions {
            run_body["additional_instructions"] = json!(instructions);
        }
        let run: Created = self
            .send_with_retry(|| self.post(&runs_url, &run_body))
            .await?
            .json()
            .await?;

        let status_url = self.api_url(&format!("threads/{}/runs/{}", thread.id, run.id))?;
        for poll in 0..self.max_polls {
            let state: RunState = self
                .send_with_retry(|| self.get(&status_url))
                .await?
                .json()
                .await?;

            match state.status.as_str() {
                "completed" => {
                    debug!("Assistant run {} completed after {} polls", run.id, poll + 1);
                    return self.latest_assistant_message(&messages_url).await;
                }
                "failed" | "cancelled" | "expired" => {
                    let detail = state
                        .last_error
                        .map(|e| format!(": {e}"))
                        .unwrap_or_default();
                    return Err(PipeSightError::Assistant(format!(
                        "run {} {}{detail}",
                        run.id, state.status
                    )));
                }
                _ => tokio::time::sleep(self.poll_interval).await,
            }
        }

        Err(PipeSightError::Assistant(format!(
            "run {} did not complete after {} polls",
            run.id, self.max_polls
        )))
    }

    async fn latest_assistant_message(&self, messages_url: &url::Url) -> Result<String> {
        let list: MessageList = self
            .send_with_retry(|| self.get(messages_url))
            .await?
            .json()
            .await?;

        // Thread messages are listed newest first.
        list.data
            .into_iter()
            .filter(|message| message.role == "assistant")
            .find_map(|message| {
                message
                    .content
                    .into_iter()
                    .find_map(|content| content.text.map(|text| text.value))
            })
            .ok_or_else(|| PipeSightError::Assistant("no assistant response found".to_string()))
    }
}
