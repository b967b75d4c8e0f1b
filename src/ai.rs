use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use genai::adapter::AdapterKind;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest};
use genai::resolver::{AuthData, Endpoint, ServiceTargetResolver};
use genai::{Client, ModelIden, ServiceTarget};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::chats::{Message, Role};
use crate::error::{AppError, AppResult};
use crate::event::Event;

/// Everything one remote call needs; detached from the live session.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f64,
    pub history: Vec<Message>,
}

#[derive(Debug)]
pub struct CompletionJob {
    pub request_id: u64,
    pub request: CompletionRequest,
}

#[derive(Debug)]
pub struct CompletionOutcome {
    pub request_id: u64,
    pub result: AppResult<String>,
}

#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> AppResult<String>;
}

/// Talks to any OpenAI-compatible endpoint through `genai`.
#[derive(Debug, Default, Clone)]
pub struct GenaiCompleter;

fn client_for(endpoint: &str, api_key: &str) -> Client {
    // genai joins "chat/completions" onto the endpoint.
    let endpoint = if endpoint.ends_with('/') {
        endpoint.to_string()
    } else {
        format!("{endpoint}/")
    };
    let api_key = api_key.to_string();
    let target_resolver = ServiceTargetResolver::from_resolver_fn(
        move |service_target: ServiceTarget| -> Result<ServiceTarget, genai::resolver::Error> {
            let ServiceTarget { model, .. } = service_target;
            Ok(ServiceTarget {
                endpoint: Endpoint::from_owned(endpoint.clone()),
                auth: AuthData::from_single(api_key.clone()),
                model: ModelIden::new(AdapterKind::OpenAI, model.model_name),
            })
        },
    );
    Client::builder()
        .with_service_target_resolver(target_resolver)
        .build()
}

fn chat_messages(history: &[Message]) -> Vec<ChatMessage> {
    history
        .iter()
        .map(|m| match m.role {
            Role::System => ChatMessage::system(m.content.as_str()),
            Role::User => ChatMessage::user(m.content.as_str()),
            Role::Assistant => ChatMessage::assistant(m.content.as_str()),
        })
        .collect()
}

#[async_trait]
impl Completer for GenaiCompleter {
    async fn complete(&self, request: &CompletionRequest) -> AppResult<String> {
        let client = client_for(&request.endpoint, &request.api_key);
        let chat_req = ChatRequest::new(chat_messages(&request.history));
        let options = ChatOptions::default().with_temperature(request.temperature);

        let chat_res = client
            .exec_chat(request.model.as_str(), chat_req, Some(&options))
            .await
            .map_err(|e| AppError::RemoteCall(e.to_string()))?;
        chat_res
            .first_text()
            .map(str::to_string)
            .ok_or_else(|| AppError::RemoteCall("the model returned no text".into()))
    }
}

/// Runs `request`, failing with [`AppError::RemoteCall`] once `limit` passes.
pub async fn complete_within(
    completer: &dyn Completer,
    request: &CompletionRequest,
    limit: Duration,
) -> AppResult<String> {
    match tokio::time::timeout(limit, completer.complete(request)).await {
        Ok(result) => result,
        Err(_) => Err(AppError::RemoteCall(format!(
            "no reply within {} seconds",
            limit.as_secs()
        ))),
    }
}

/// Runs `job` on its own task and posts the outcome back to the event loop.
pub fn spawn_completion(
    completer: Arc<dyn Completer>,
    job: CompletionJob,
    limit: Duration,
    sender: UnboundedSender<Event>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let CompletionJob {
            request_id,
            request,
        } = job;
        let result = complete_within(completer.as_ref(), &request, limit).await;
        match &result {
            Ok(reply) => tracing::info!(request_id, chars = reply.len(), "reply received"),
            Err(e) => tracing::warn!(request_id, error = %e, "request failed"),
        }
        // The loop is gone when the app is shutting down.
        let _ = sender.send(Event::Completion(CompletionOutcome { request_id, result }));
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    struct Scripted {
        reply: &'static str,
        delay: Duration,
    }

    #[async_trait]
    impl Completer for Scripted {
        async fn complete(&self, request: &CompletionRequest) -> AppResult<String> {
            tokio::time::sleep(self.delay).await;
            Ok(format!("{} ({} messages)", self.reply, request.history.len()))
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            endpoint: "http://localhost:1/v1".into(),
            api_key: String::new(),
            model: "test-model".into(),
            temperature: 0.5,
            history: vec![
                Message::new(Role::System, "sys"),
                Message::new(Role::User, "hi"),
            ],
        }
    }

    #[tokio::test]
    async fn slow_completer_times_out() {
        let completer = Scripted {
            reply: "late",
            delay: Duration::from_secs(5),
        };
        let err = complete_within(&completer, &request(), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RemoteCall(_)));
    }

    #[tokio::test]
    async fn outcome_is_posted_to_event_loop() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let completer: Arc<dyn Completer> = Arc::new(Scripted {
            reply: "hello",
            delay: Duration::ZERO,
        });
        let job = CompletionJob {
            request_id: 7,
            request: request(),
        };
        spawn_completion(completer, job, Duration::from_secs(1), sender)
            .await
            .unwrap();

        match receiver.recv().await {
            Some(Event::Completion(outcome)) => {
                assert_eq!(outcome.request_id, 7);
                assert_eq!(outcome.result.unwrap(), "hello (2 messages)");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn history_maps_to_chat_messages() {
        assert_eq!(chat_messages(&request().history).len(), 2);
    }
}
