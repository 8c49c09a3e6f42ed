use parking_lot::Mutex;

use lab_types::{Error, Result};

use crate::traits::{ChatRequest, ChatResponse, LlmProvider};

/// Scripted test double: returns its queued responses in order, one per
/// `chat` call. Panics-free by design — an exhausted script yields a
/// `Provider` error instead, so test failures show up as assertion
/// failures on the caller's side rather than a panic inside the engine.
pub struct FakeProvider {
    id: String,
    script: Mutex<Vec<ChatResponse>>,
    calls: Mutex<Vec<ChatRequest>>,
}

impl FakeProvider {
    pub fn new(id: impl Into<String>, script: Vec<ChatResponse>) -> Self {
        Self { id: id.into(), script: Mutex::new(script), calls: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> Vec<ChatRequest> {
        self.calls.lock().clone()
    }
}

#[async_trait::async_trait]
impl LlmProvider for FakeProvider {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
        self.calls.lock().push(req);
        let mut script = self.script.lock();
        if script.is_empty() {
            return Err(Error::Provider {
                kind: lab_types::error::ProviderErrorKind::Transport,
                message: format!("FakeProvider {} script exhausted", self.id),
            });
        }
        Ok(script.remove(0))
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_scripted_responses_in_order() {
        let fake = FakeProvider::new(
            "fake-1",
            vec![
                ChatResponse { content: "first".into(), ..Default::default() },
                ChatResponse { content: "second".into(), ..Default::default() },
            ],
        );
        let r1 = fake.chat(ChatRequest::default()).await.unwrap();
        let r2 = fake.chat(ChatRequest::default()).await.unwrap();
        assert_eq!(r1.content, "first");
        assert_eq!(r2.content, "second");
        assert_eq!(fake.calls().len(), 2);
    }

    #[tokio::test]
    async fn exhausted_script_errors_instead_of_panicking() {
        let fake = FakeProvider::new("fake-1", vec![]);
        let err = fake.chat(ChatRequest::default()).await.unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
    }
}
