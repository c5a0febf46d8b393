//! One chat turn: retrieve context, stream the answer, persist the exchange

use chrono::Utc;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::config::KbConfig;
use crate::error::{Error, Result, CHAT_FAILURE_MESSAGE};
use crate::generation::PromptBuilder;
use crate::providers::{IndexProvider, LlmProvider};
use crate::storage::Database;
use crate::types::{flatten_exchanges, ChatExchange, ChatMessage};

use super::ChatEvent;

/// Stream of events for one turn, ending with `Done` or `Error`
pub type ChatStream = ReceiverStream<ChatEvent>;

const EVENT_BUFFER: usize = 64;

/// Runs chat turns against the index and the generation model
#[derive(Clone)]
pub struct ChatOrchestrator {
    db: Arc<Database>,
    index: Arc<dyn IndexProvider>,
    llm: Arc<dyn LlmProvider>,
    top_k: usize,
    history_turns: usize,
    max_question_chars: usize,
    turn_timeout: Duration,
}

impl ChatOrchestrator {
    pub fn new(
        db: Arc<Database>,
        index: Arc<dyn IndexProvider>,
        llm: Arc<dyn LlmProvider>,
        config: &KbConfig,
    ) -> Self {
        Self {
            db,
            index,
            llm,
            top_k: config.rag_service.top_k,
            history_turns: config.chat.history_turns,
            max_question_chars: config.chat.max_question_chars,
            turn_timeout: Duration::from_secs(config.llm.timeout_secs),
        }
    }

    /// Validate the question and start the turn in the background.
    ///
    /// `history` is used as given when present; otherwise the user's most
    /// recent exchanges are loaded. Dropping the returned stream cancels the
    /// turn and nothing is persisted.
    pub fn ask(
        &self,
        user_id: Uuid,
        question: &str,
        history: Option<Vec<ChatMessage>>,
    ) -> Result<ChatStream> {
        let question = self.validate_question(question)?;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let turn = self.clone();
        tokio::spawn(async move { turn.run(user_id, question, history, tx).await });

        Ok(ReceiverStream::new(rx))
    }

    fn validate_question(&self, question: &str) -> Result<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::validation("Question is required"));
        }
        if question.chars().count() > self.max_question_chars {
            return Err(Error::validation(format!(
                "Question must be at most {} characters",
                self.max_question_chars
            )));
        }
        Ok(question.to_string())
    }

    async fn run(
        self,
        user_id: Uuid,
        question: String,
        history: Option<Vec<ChatMessage>>,
        tx: mpsc::Sender<ChatEvent>,
    ) {
        let asked_at = Utc::now();

        let outcome = tokio::select! {
            result = tokio::time::timeout(
                self.turn_timeout,
                self.stream_answer(user_id, &question, history, &tx),
            ) => result,
            _ = tx.closed() => {
                tracing::debug!(%user_id, "chat client disconnected, turn cancelled");
                return;
            }
        };

        let answer = match outcome {
            Ok(Ok(Some(answer))) => answer,
            Ok(Ok(None)) => {
                tracing::debug!(%user_id, "chat client disconnected, turn cancelled");
                return;
            }
            Ok(Err(e)) => return fail(&tx, user_id, e).await,
            Err(_) => {
                let e = Error::generation(format!(
                    "turn exceeded {}s",
                    self.turn_timeout.as_secs()
                ));
                return fail(&tx, user_id, e).await;
            }
        };

        let exchange = ChatExchange::new(user_id, question, answer, asked_at);
        if let Err(e) = self.db.insert_exchange(&exchange) {
            return fail(&tx, user_id, e).await;
        }

        tracing::info!(%user_id, exchange_id = %exchange.id, "chat turn complete");
        let _ = tx
            .send(ChatEvent::Done {
                exchange_id: exchange.id,
            })
            .await;
    }

    /// Forward fragments as they arrive; `None` means the client went away
    async fn stream_answer(
        &self,
        user_id: Uuid,
        question: &str,
        history: Option<Vec<ChatMessage>>,
        tx: &mpsc::Sender<ChatEvent>,
    ) -> Result<Option<String>> {
        let history = match history {
            Some(history) => history,
            None => flatten_exchanges(&self.db.recent_exchanges(user_id, self.history_turns)?),
        };

        let snippets = self.index.retrieve(question, self.top_k).await?;
        tracing::debug!("Retrieved {} context snippets", snippets.len());

        let context = PromptBuilder::build_context(&snippets);
        let prompt = PromptBuilder::build_chat_prompt(question, &context, &history);

        let mut fragments = self.llm.generate_stream(&prompt).await?;
        let mut answer = String::new();

        while let Some(fragment) = fragments.next().await {
            let fragment = fragment?;
            if fragment.is_empty() {
                continue;
            }
            answer.push_str(&fragment);
            if tx.send(ChatEvent::Fragment(fragment)).await.is_err() {
                return Ok(None);
            }
        }

        if answer.trim().is_empty() {
            return Err(Error::generation("model returned an empty answer"));
        }

        Ok(Some(answer))
    }
}

async fn fail(tx: &mpsc::Sender<ChatEvent>, user_id: Uuid, cause: Error) {
    tracing::error!(%user_id, error = %cause, "chat turn failed");
    let _ = tx
        .send(ChatEvent::Error {
            message: CHAT_FAILURE_MESSAGE.to_string(),
        })
        .await;
}
