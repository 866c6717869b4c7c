//! Best-effort visualization classifier.
//!
//! Asks the model whether an answer is chart-worthy and strict-parses the
//! reply into a `ChartSuggestion`. Every failure path — model error, `null`
//! reply, prose, malformed JSON — yields `None`; the classifier never blocks
//! the primary answer.

use std::sync::Arc;

use tracing::debug;

use tabletalk_core::config::{ChartConfig, LlmConfig};
use tabletalk_core::types::ChartSuggestion;
use tabletalk_llm::{ChatModel, CompletionRequest, Message};

use crate::prompts;

/// Chart-worthiness classifier over a chat model.
pub struct ChartClassifier {
    model: Arc<dyn ChatModel>,
    temperature: f32,
    max_tokens: usize,
    enabled: bool,
}

impl ChartClassifier {
    pub fn new(model: Arc<dyn ChatModel>, llm: &LlmConfig, chart: &ChartConfig) -> Self {
        Self {
            model,
            temperature: llm.chart_temperature,
            max_tokens: llm.max_tokens,
            enabled: chart.enabled,
        }
    }

    /// Classify answer text, returning a chart suggestion only when the
    /// model emits one that parses cleanly.
    pub async fn classify(&self, answer_text: &str) -> Option<ChartSuggestion> {
        if !self.enabled {
            return None;
        }

        let request = CompletionRequest {
            messages: vec![Message::user(prompts::chart_prompt(answer_text))],
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
        };

        let reply = match self.model.complete(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                debug!(error = %e, "Visualization classification failed; no chart");
                return None;
            }
        };

        let cleaned = prompts::strip_code_fences(&reply);
        if cleaned.eq_ignore_ascii_case("null") {
            return None;
        }

        match serde_json::from_str::<ChartSuggestion>(cleaned) {
            Ok(chart) => Some(chart),
            Err(e) => {
                debug!(error = %e, reply = cleaned, "Chart reply failed strict parse; no chart");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use tabletalk_core::error::{Result, TabletalkError};
    use tabletalk_core::types::ChartKind;

    /// Model stub returning one fixed reply (or an error).
    struct FixedModel {
        reply: Result<&'static str>,
    }

    impl FixedModel {
        fn ok(reply: &'static str) -> Arc<Self> {
            Arc::new(Self { reply: Ok(reply) })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(TabletalkError::Llm("boom".to_string())),
            })
        }
    }

    #[async_trait]
    impl ChatModel for FixedModel {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            match &self.reply {
                Ok(reply) => Ok(reply.to_string()),
                Err(_) => Err(TabletalkError::Llm("boom".to_string())),
            }
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    fn classifier(model: Arc<dyn ChatModel>) -> ChartClassifier {
        ChartClassifier::new(model, &LlmConfig::default(), &ChartConfig::default())
    }

    const VALID_CHART: &str = r#"{
        "chartType": "Bar Chart",
        "labels": ["north", "south", "east"],
        "data": [10, 20, 12],
        "title": "Amount by region"
    }"#;

    #[tokio::test]
    async fn test_valid_chart_parsed() {
        let chart = classifier(FixedModel::ok(VALID_CHART))
            .classify("north 10, south 20, east 12")
            .await
            .unwrap();
        assert_eq!(chart.chart_type, ChartKind::Bar);
        assert_eq!(chart.labels.len(), 3);
        assert_eq!(chart.data, vec![10.0, 20.0, 12.0]);
    }

    #[tokio::test]
    async fn test_fenced_chart_parsed() {
        let fenced = "```json\n{\"chartType\": \"Pie Chart\", \"labels\": [\"a\"], \"data\": [1], \"title\": \"t\"}\n```";
        let chart = classifier(FixedModel::ok(fenced)).classify("a: 1").await;
        assert_eq!(chart.unwrap().chart_type, ChartKind::Pie);
    }

    #[tokio::test]
    async fn test_null_reply_yields_none() {
        assert!(classifier(FixedModel::ok("null")).classify("hi").await.is_none());
        assert!(classifier(FixedModel::ok("NULL")).classify("hi").await.is_none());
        assert!(classifier(FixedModel::ok("```json\nnull\n```"))
            .classify("hi")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_prose_reply_yields_none() {
        let model = FixedModel::ok("This text is not suitable for visualization.");
        assert!(classifier(model).classify("hello").await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_json_yields_none() {
        let model = FixedModel::ok(r#"{"chartType": "Bar Chart", "labels": ["#);
        assert!(classifier(model).classify("x").await.is_none());
    }

    #[tokio::test]
    async fn test_wrong_schema_yields_none() {
        // Parses as JSON but not as a chart suggestion.
        let model = FixedModel::ok(r#"{"kind": "bar", "values": [1, 2]}"#);
        assert!(classifier(model).classify("x").await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_chart_kind_yields_none() {
        let model = FixedModel::ok(
            r#"{"chartType": "Radar Chart", "labels": ["a"], "data": [1], "title": "t"}"#,
        );
        assert!(classifier(model).classify("x").await.is_none());
    }

    #[tokio::test]
    async fn test_model_error_yields_none() {
        assert!(classifier(FixedModel::failing()).classify("x").await.is_none());
    }

    #[tokio::test]
    async fn test_disabled_classifier_skips_model() {
        let chart_config = ChartConfig { enabled: false };
        let classifier =
            ChartClassifier::new(FixedModel::ok(VALID_CHART), &LlmConfig::default(), &chart_config);
        assert!(classifier.classify("x").await.is_none());
    }
}
