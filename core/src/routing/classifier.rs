//! Source classification
//!
//! Never fails: any problem with the model call or its output degrades to
//! `{general, 0.0}`, which the resolver's gate turns into a general lookup.

use super::{ClassificationResult, Source};
use crate::extract::{StructuredExtractor, StructuredObject};
use crate::llm::TextModel;
use serde_json::Value;

pub struct SourceClassifier<'a> {
    model: &'a dyn TextModel,
    system_prompt: &'a str,
    extractor: &'a StructuredExtractor,
    max_tokens: u32,
}

impl<'a> SourceClassifier<'a> {
    pub fn new(
        model: &'a dyn TextModel,
        system_prompt: &'a str,
        extractor: &'a StructuredExtractor,
        max_tokens: u32,
    ) -> Self {
        Self {
            model,
            system_prompt,
            extractor,
            max_tokens,
        }
    }

    pub async fn classify(&self, user_input: &str) -> ClassificationResult {
        let raw = match self
            .model
            .generate(self.system_prompt, user_input, self.max_tokens)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "source classifier call failed, using default");
                return ClassificationResult::default();
            }
        };

        let object = match self.extractor.extract_object(&raw) {
            Ok(object) => object,
            Err(e) => {
                tracing::warn!(error = %e, "classifier output unusable, using default");
                return ClassificationResult::default();
            }
        };

        match interpret(&object) {
            Some(result) => {
                tracing::info!(source = %result.source, confidence = result.confidence, "source classified");
                result
            }
            None => {
                tracing::warn!(?object, "classifier output lacks source/confidence, using default");
                ClassificationResult::default()
            }
        }
    }
}

/// Both fields must be present. An unknown source name maps to `general`.
fn interpret(object: &StructuredObject) -> Option<ClassificationResult> {
    let raw_source = object.get("source")?.as_str()?;
    let confidence = match object.get("confidence")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    let source = raw_source.parse::<Source>().unwrap_or_else(|e| {
        tracing::warn!("{}, treating as general", e);
        Source::General
    });

    Some(ClassificationResult::new(source, confidence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, RouterError};
    use async_trait::async_trait;

    struct Fixed(std::result::Result<&'static str, &'static str>);

    #[async_trait]
    impl TextModel for Fixed {
        async fn generate(&self, _system: &str, _user: &str, _max_tokens: u32) -> Result<String> {
            match self.0 {
                Ok(text) => Ok(text.to_string()),
                Err(msg) => Err(RouterError::llm(msg)),
            }
        }
    }

    async fn classify(model: Fixed) -> ClassificationResult {
        let extractor = StructuredExtractor::default();
        SourceClassifier::new(&model, "classify", &extractor, 64)
            .classify("오늘 테슬라 주가 확인해봐")
            .await
    }

    #[tokio::test]
    async fn reads_source_and_confidence() {
        let result = classify(Fixed(Ok(r#"{"source": "web", "confidence": 0.8}"#))).await;
        assert_eq!(result, ClassificationResult::new(Source::Web, 0.8));
    }

    #[tokio::test]
    async fn numeric_string_confidence_is_accepted() {
        let result = classify(Fixed(Ok(r#"{"source": "Code", "confidence": "0.6"}"#))).await;
        assert_eq!(result, ClassificationResult::new(Source::Code, 0.6));
    }

    #[tokio::test]
    async fn non_json_output_degrades_to_default() {
        let result = classify(Fixed(Ok("I believe this is a web question."))).await;
        assert_eq!(result, ClassificationResult::default());
    }

    #[tokio::test]
    async fn missing_confidence_degrades_to_default() {
        let result = classify(Fixed(Ok(r#"{"source": "web"}"#))).await;
        assert_eq!(result, ClassificationResult::default());
    }

    #[tokio::test]
    async fn model_failure_degrades_to_default() {
        let result = classify(Fixed(Err("connection refused"))).await;
        assert_eq!(result, ClassificationResult::default());
    }

    #[tokio::test]
    async fn unknown_source_becomes_general() {
        let result = classify(Fixed(Ok(r#"{"source": "finance", "confidence": 0.9}"#))).await;
        assert_eq!(result.source, Source::General);
        assert_eq!(result.confidence, 0.9);
    }
}
