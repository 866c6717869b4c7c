//! The SQL agent loop.
//!
//! Binds a chat model to the current store and the session history, then
//! iterates bounded query/execute/observe cycles until the model produces a
//! final answer. Failed queries are fed back as observations so the model
//! can correct itself.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use tabletalk_core::config::LlmConfig;
use tabletalk_core::error::{Result, TabletalkError};
use tabletalk_llm::{ChatModel, CompletionRequest, Message};
use tabletalk_store::{execute_select, Database};

use crate::memory::ChatHistory;
use crate::prompts;

/// Hook observing each query the agent actually executes.
pub trait QueryObserver: Send + Sync {
    fn on_query(&self, sql: &str);
}

/// Observer retaining the literal text of the last executed query.
#[derive(Default)]
pub struct LastQueryRecorder {
    last: Mutex<Option<String>>,
}

impl LastQueryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the recorded query, leaving the recorder empty.
    pub fn take(&self) -> Option<String> {
        self.last.lock().ok().and_then(|mut guard| guard.take())
    }
}

impl QueryObserver for LastQueryRecorder {
    fn on_query(&self, sql: &str) {
        if let Ok(mut guard) = self.last.lock() {
            *guard = Some(sql.to_string());
        }
    }
}

/// What one model reply asks the loop to do next.
enum AgentReply {
    Query(String),
    Answer(String),
}

/// Model-driven SQL agent over a single store.
pub struct SqlAgent {
    model: Arc<dyn ChatModel>,
    temperature: f32,
    max_tokens: usize,
    max_steps: usize,
}

impl SqlAgent {
    pub fn new(model: Arc<dyn ChatModel>, llm: &LlmConfig) -> Self {
        Self {
            model,
            temperature: llm.agent_temperature,
            max_tokens: llm.max_tokens,
            max_steps: llm.max_agent_steps,
        }
    }

    /// Answer a question over the store, replaying the session history.
    ///
    /// Each executed query's literal text is reported to `observer`. Returns
    /// the final natural-language answer, or an error when the step budget
    /// is exhausted or the model API fails.
    pub async fn run(
        &self,
        db: &Database,
        history: &ChatHistory,
        question: &str,
        observer: Option<&dyn QueryObserver>,
    ) -> Result<String> {
        let schema = tabletalk_store::describe(db)?;

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(prompts::agent_system_prompt(&schema)));
        messages.extend(history.to_messages());
        messages.push(Message::user(question.to_string()));

        for step in 1..=self.max_steps {
            let request = CompletionRequest {
                messages: messages.clone(),
                temperature: Some(self.temperature),
                max_tokens: Some(self.max_tokens),
            };
            let reply = self.model.complete(&request).await?;

            match parse_reply(&reply) {
                AgentReply::Answer(answer) => {
                    debug!(step, "Agent produced final answer");
                    return Ok(answer);
                }
                AgentReply::Query(sql) => {
                    debug!(step, sql = %sql, "Agent requested query");
                    if let Some(observer) = observer {
                        observer.on_query(&sql);
                    }
                    messages.push(Message::assistant(reply.clone()));
                    match execute_select(db, &sql) {
                        Ok(output) => {
                            messages.push(Message::user(prompts::observation(&output.to_string())));
                        }
                        Err(e) => {
                            warn!(step, error = %e, "Agent query failed; feeding error back");
                            messages.push(Message::user(prompts::query_error(&e.to_string())));
                        }
                    }
                }
            }
        }

        Err(TabletalkError::Agent(format!(
            "No final answer after {} steps",
            self.max_steps
        )))
    }
}

/// Interpret one model reply.
///
/// Markers are checked first; a bare SELECT/WITH statement also counts as a
/// query; anything else is taken as the final answer.
fn parse_reply(reply: &str) -> AgentReply {
    let text = prompts::strip_code_fences(reply);

    if let Some(rest) = strip_prefix_ci(text, "ANSWER:") {
        return AgentReply::Answer(rest.trim().to_string());
    }
    if let Some(rest) = strip_prefix_ci(text, "SQL:") {
        return AgentReply::Query(prompts::strip_code_fences(rest).to_string());
    }

    let first_word = text
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_uppercase();
    if first_word == "SELECT" || first_word == "WITH" {
        return AgentReply::Query(text.to_string());
    }

    AgentReply::Answer(text.to_string())
}

fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    if text.len() >= prefix.len() && text[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use async_trait::async_trait;

    use tabletalk_core::config::LlmConfig;

    /// Model stub replaying a fixed script of replies.
    struct ScriptedModel {
        replies: Mutex<VecDeque<String>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedModel {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| TabletalkError::Llm("script exhausted".to_string()))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn seeded_db() -> Database {
        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TABLE sales (region TEXT, amount INTEGER);
                 INSERT INTO sales VALUES ('north', 10), ('south', 20), ('east', 12);",
            )
            .map_err(|e| TabletalkError::Storage(e.to_string()))
        })
        .unwrap();
        db
    }

    fn agent_with(model: Arc<dyn ChatModel>) -> SqlAgent {
        SqlAgent::new(model, &LlmConfig::default())
    }

    // ---- Loop behavior ----

    #[tokio::test]
    async fn test_query_then_answer() {
        let model = Arc::new(ScriptedModel::new(&[
            "SQL: SELECT SUM(amount) FROM sales",
            "ANSWER: The total amount is 42.",
        ]));
        let agent = agent_with(model.clone());
        let db = seeded_db();

        let answer = agent
            .run(&db, &ChatHistory::new(), "what is the total?", None)
            .await
            .unwrap();
        assert_eq!(answer, "The total amount is 42.");

        // The second request must contain the observation with the real sum.
        let requests = model.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        let observation = &requests[1].messages.last().unwrap().content;
        assert!(observation.contains("42"), "got: {}", observation);
    }

    #[tokio::test]
    async fn test_immediate_answer_runs_no_query() {
        let model = Arc::new(ScriptedModel::new(&["ANSWER: Hello."]));
        let agent = agent_with(model.clone());
        let db = seeded_db();

        let recorder = LastQueryRecorder::new();
        let answer = agent
            .run(&db, &ChatHistory::new(), "hi", Some(&recorder))
            .await
            .unwrap();
        assert_eq!(answer, "Hello.");
        assert!(recorder.take().is_none());
    }

    #[tokio::test]
    async fn test_observer_records_last_query() {
        let model = Arc::new(ScriptedModel::new(&[
            "SQL: SELECT COUNT(*) FROM sales",
            "SQL: SELECT SUM(amount) FROM sales",
            "ANSWER: 42.",
        ]));
        let agent = agent_with(model);
        let db = seeded_db();

        let recorder = LastQueryRecorder::new();
        agent
            .run(&db, &ChatHistory::new(), "total?", Some(&recorder))
            .await
            .unwrap();
        assert_eq!(
            recorder.take().as_deref(),
            Some("SELECT SUM(amount) FROM sales")
        );
    }

    #[tokio::test]
    async fn test_failed_query_feeds_error_back() {
        let model = Arc::new(ScriptedModel::new(&[
            "SQL: SELECT wrong_column FROM sales",
            "ANSWER: I could not compute it.",
        ]));
        let agent = agent_with(model.clone());
        let db = seeded_db();

        let answer = agent
            .run(&db, &ChatHistory::new(), "total?", None)
            .await
            .unwrap();
        assert_eq!(answer, "I could not compute it.");

        let requests = model.requests.lock().unwrap();
        let feedback = &requests[1].messages.last().unwrap().content;
        assert!(feedback.contains("The query failed"), "got: {}", feedback);
    }

    #[tokio::test]
    async fn test_step_budget_exhaustion_errors() {
        let replies: Vec<&str> = std::iter::repeat("SQL: SELECT 1").take(10).collect();
        let model = Arc::new(ScriptedModel::new(&replies));
        let agent = agent_with(model);
        let db = seeded_db();

        let err = agent
            .run(&db, &ChatHistory::new(), "loop forever", None)
            .await
            .unwrap_err();
        assert!(matches!(err, TabletalkError::Agent(_)));
    }

    #[tokio::test]
    async fn test_model_error_propagates() {
        let model = Arc::new(ScriptedModel::new(&[]));
        let agent = agent_with(model);
        let db = seeded_db();

        let err = agent
            .run(&db, &ChatHistory::new(), "anything", None)
            .await
            .unwrap_err();
        assert!(matches!(err, TabletalkError::Llm(_)));
    }

    // ---- Prompt assembly ----

    #[tokio::test]
    async fn test_schema_and_history_in_prompt() {
        let model = Arc::new(ScriptedModel::new(&["ANSWER: ok"]));
        let agent = agent_with(model.clone());
        let db = seeded_db();

        let history = ChatHistory::from(vec![
            tabletalk_core::types::MessageRecord::human("earlier question"),
            tabletalk_core::types::MessageRecord::ai("earlier answer"),
        ]);
        agent.run(&db, &history, "follow-up", None).await.unwrap();

        let requests = model.requests.lock().unwrap();
        let messages = &requests[0].messages;
        assert!(messages[0].content.contains("Table sales"));
        assert_eq!(messages[1].content, "earlier question");
        assert_eq!(messages[2].content, "earlier answer");
        assert_eq!(messages[3].content, "follow-up");
    }

    #[tokio::test]
    async fn test_agent_uses_configured_sampling() {
        let model = Arc::new(ScriptedModel::new(&["ANSWER: ok"]));
        let llm = LlmConfig {
            agent_temperature: 0.0,
            max_tokens: 256,
            ..LlmConfig::default()
        };
        let agent = SqlAgent::new(model.clone(), &llm);
        let db = seeded_db();

        agent.run(&db, &ChatHistory::new(), "q", None).await.unwrap();
        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[0].temperature, Some(0.0));
        assert_eq!(requests[0].max_tokens, Some(256));
    }

    // ---- Reply parsing ----

    #[test]
    fn test_parse_reply_markers() {
        assert!(matches!(
            parse_reply("ANSWER: forty-two"),
            AgentReply::Answer(a) if a == "forty-two"
        ));
        assert!(matches!(
            parse_reply("SQL: SELECT 1"),
            AgentReply::Query(q) if q == "SELECT 1"
        ));
        assert!(matches!(
            parse_reply("sql: select 1"),
            AgentReply::Query(q) if q == "select 1"
        ));
    }

    #[test]
    fn test_parse_reply_fenced_sql() {
        let reply = "SQL: ```sql\nSELECT COUNT(*) FROM sales\n```";
        assert!(matches!(
            parse_reply(reply),
            AgentReply::Query(q) if q == "SELECT COUNT(*) FROM sales"
        ));
    }

    #[test]
    fn test_parse_reply_bare_select_is_query() {
        assert!(matches!(
            parse_reply("SELECT * FROM sales"),
            AgentReply::Query(_)
        ));
        assert!(matches!(
            parse_reply("WITH x AS (SELECT 1) SELECT * FROM x"),
            AgentReply::Query(_)
        ));
    }

    #[test]
    fn test_parse_reply_plain_text_is_answer() {
        assert!(matches!(
            parse_reply("The data shows three regions."),
            AgentReply::Answer(_)
        ));
    }
}
