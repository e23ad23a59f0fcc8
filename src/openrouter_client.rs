use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MODEL: &str = "deepseek/deepseek-chat-v3.1:free";

/// Persona sent as the system message with every completion. Keeps the bot
/// scoped to timesheet questions.
pub const SYSTEM_INSTRUCTIONS: &str = "You are a specialized Timesheet Data Analyst Bot. \
Your function is strictly limited to reviewing the provided timesheet data. \
For any question that falls outside the scope of the timesheet, you will politely decline and state, \
'My expertise is limited to timesheet data. Please ask me a question about the timesheet.'";

#[derive(Debug, thiserror::Error)]
pub enum OpenRouterError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API returned status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("API response contained no choices")]
    EmptyResponse,
}

/// Thin client for the OpenRouter chat-completions API. No retries here;
/// failures surface to the route boundary as upstream errors.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

impl OpenRouterClient {
    pub fn new(api_key: String) -> Self {
        let model =
            std::env::var("OPENROUTER_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        OpenRouterClient {
            client: Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model,
        }
    }

    /// Send system instructions plus a prompt, return the reply text.
    pub async fn complete(
        &self,
        system_instructions: &str,
        prompt: &str,
    ) -> Result<String, OpenRouterError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system_instructions.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", "http://localhost:3000")
            .header("X-Title", "Timesheet Reviewer Bot")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OpenRouterError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(OpenRouterError::EmptyResponse)
    }
}

/// Combine the user's question with the bounded timesheet preview.
pub fn build_prompt(query: &str, timesheet_preview: &str) -> String {
    format!(
        "Here is the timesheet data:\n{timesheet_preview}\n\nUser Query: {query}\n"
    )
}
