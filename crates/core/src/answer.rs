use crate::embeddings::Embedder;
use crate::error::{GenerationError, Result, ValidationError};
use crate::models::{Answer, QueryRequest, ScoredChunk};
use crate::retrieval::Retriever;
use crate::traits::{CompletionModel, DocumentStore};
use tracing::{info, warn};

pub const SYSTEM_PROMPT: &str = "Answer using only the given context";

pub const NO_RELEVANT_INFORMATION: &str = "No relevant information found.";

/// Joins retrieved chunk contents, in ranked order, with a blank line.
pub fn build_context(sources: &[ScoredChunk]) -> String {
    sources
        .iter()
        .map(|source| source.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_prompt(context: &str, question: &str) -> String {
    format!("{context}\n\nQuestion: {question}")
}

/// Grounded question answering: retrieve context, then ask the model.
pub struct AnswerSynthesizer<S, E, M>
where
    S: DocumentStore,
    E: Embedder,
    M: CompletionModel,
{
    retriever: Retriever<S, E>,
    model: M,
    top_k: usize,
}

impl<S, E, M> AnswerSynthesizer<S, E, M>
where
    S: DocumentStore + Send + Sync,
    E: Embedder + Send + Sync,
    M: CompletionModel + Send + Sync,
{
    pub fn new(retriever: Retriever<S, E>, model: M, top_k: usize) -> Self {
        Self {
            retriever,
            model,
            top_k,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub async fn answer_request(&self, request: &QueryRequest) -> Result<Answer> {
        let question = request
            .question
            .as_deref()
            .ok_or(ValidationError::EmptyQuestion)?;
        self.answer(question).await
    }

    /// Answers from retrieved context only.
    ///
    /// With nothing retrieved the model is not called and the fixed
    /// [`NO_RELEVANT_INFORMATION`] answer is returned. A model failure is a
    /// [`GenerationError`] carrying the retrieved sources.
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let sources = self.retriever.retrieve(question, self.top_k).await?;

        if sources.is_empty() {
            info!("no context retrieved; skipping generation");
            return Ok(Answer {
                answer: NO_RELEVANT_INFORMATION.to_string(),
                sources,
            });
        }

        let prompt = build_prompt(&build_context(&sources), question);

        match self.model.complete(SYSTEM_PROMPT, &prompt).await {
            Ok(answer) => {
                info!(sources = sources.len(), "answer generated");
                Ok(Answer { answer, sources })
            }
            Err(failure) => {
                warn!(error = %failure, sources = sources.len(), "generation failed");
                Err(GenerationError {
                    message: failure.to_string(),
                    sources,
                }
                .into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashSeededEmbedder;
    use crate::error::{CompletionFailure, PipelineError};
    use crate::stores::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeModel {
        calls: AtomicUsize,
        prompts: Mutex<Vec<(String, String)>>,
        reply: std::result::Result<String, CompletionFailure>,
    }

    impl FakeModel {
        fn replying(reply: std::result::Result<String, CompletionFailure>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
                reply,
            }
        }
    }

    #[async_trait]
    impl CompletionModel for FakeModel {
        async fn complete(
            &self,
            system: &str,
            prompt: &str,
        ) -> std::result::Result<String, CompletionFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts
                .lock()
                .unwrap()
                .push((system.to_string(), prompt.to_string()));
            self.reply.clone()
        }
    }

    async fn seeded_store(texts: &[&str]) -> InMemoryStore {
        let embedder = HashSeededEmbedder::default();
        let store = InMemoryStore::new(embedder.dimensions());
        let doc = store.create_document("handbook.md").await.unwrap();
        for text in texts {
            store.insert_chunk(&doc, text, &embedder.embed(text)).await.unwrap();
        }
        store
    }

    fn synthesizer(
        store: InMemoryStore,
        model: FakeModel,
    ) -> AnswerSynthesizer<InMemoryStore, HashSeededEmbedder, FakeModel> {
        AnswerSynthesizer::new(
            Retriever::new(store, HashSeededEmbedder::default()),
            model,
            5,
        )
    }

    #[test]
    fn context_uses_blank_line_separators() {
        let sources = vec![
            ScoredChunk {
                content: "first".to_string(),
                score: 0.9,
                document_id: "d".to_string(),
            },
            ScoredChunk {
                content: "second".to_string(),
                score: 0.5,
                document_id: "d".to_string(),
            },
        ];
        assert_eq!(build_context(&sources), "first\n\nsecond");
        assert_eq!(
            build_prompt("first\n\nsecond", "why?"),
            "first\n\nsecond\n\nQuestion: why?"
        );
    }

    #[tokio::test]
    async fn empty_store_short_circuits_without_calling_the_model() {
        let synthesizer = synthesizer(
            InMemoryStore::new(384),
            FakeModel::replying(Ok("unused".to_string())),
        );

        let answer = synthesizer.answer("anything?").await.unwrap();
        assert_eq!(answer.answer, "No relevant information found.");
        assert!(answer.sources.is_empty());
        assert_eq!(synthesizer.model().calls.load(Ordering::SeqCst), 0);

        let json = serde_json::to_value(&answer).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"answer": "No relevant information found.", "sources": []})
        );
    }

    #[tokio::test]
    async fn answer_is_model_output_with_ranked_sources() {
        let store = seeded_store(&["pumps move fluid", "valves stop fluid"]).await;
        let synthesizer = synthesizer(
            store,
            FakeModel::replying(Ok("Pumps move it.".to_string())),
        );

        let answer = synthesizer.answer("pumps move fluid").await.unwrap();
        assert_eq!(answer.answer, "Pumps move it.");
        assert_eq!(answer.sources.len(), 2);
        assert_eq!(answer.sources[0].content, "pumps move fluid");

        let prompts = synthesizer.model().prompts.lock().unwrap().clone();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].0, SYSTEM_PROMPT);
        let expected_context = build_context(&answer.sources);
        assert_eq!(
            prompts[0].1,
            format!("{expected_context}\n\nQuestion: pumps move fluid")
        );
    }

    #[tokio::test]
    async fn generation_failure_keeps_the_sources() {
        let store = seeded_store(&["only passage"]).await;
        let synthesizer = synthesizer(
            store,
            FakeModel::replying(Err(CompletionFailure::Timeout)),
        );

        match synthesizer.answer("only passage").await {
            Err(PipelineError::Generation(error)) => {
                assert_eq!(error.sources.len(), 1);
                assert_eq!(error.sources[0].content, "only passage");
                assert!(error.message.contains("timed out"));
            }
            other => panic!("expected generation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_question_is_rejected_before_retrieval() {
        let synthesizer = synthesizer(
            seeded_store(&["passage"]).await,
            FakeModel::replying(Ok("unused".to_string())),
        );

        let request: QueryRequest = serde_json::from_str(r#"{"question": ""}"#).unwrap();
        let result = synthesizer.answer_request(&request).await;
        assert!(matches!(result, Err(ref error) if error.is_client_error()));

        let missing = synthesizer.answer_request(&QueryRequest::default()).await;
        assert!(matches!(
            missing,
            Err(PipelineError::Validation(ValidationError::EmptyQuestion))
        ));
        assert_eq!(synthesizer.model().calls.load(Ordering::SeqCst), 0);
    }
}
