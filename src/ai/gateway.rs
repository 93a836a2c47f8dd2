use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{
    fallback_feedback, score_percent, AuthenticityAssessment, QuizFeedback, QuizQuestion,
    ReferenceList, SummaryRequest,
};

use super::client::{GenerateRequest, GenerationParams, GenerativeBackend};
use super::parse::{parse_authenticity, parse_quiz_questions, parse_references};
use super::prompts;

/// Every call the app makes to the generative model goes through here.
///
/// The API key is fixed at construction; a gateway without one fails each
/// operation with [`AppError::CredentialMissing`] before touching the network.
#[derive(Clone)]
pub struct AiGateway {
    backend: Arc<dyn GenerativeBackend>,
    api_key: Option<String>,
}

impl AiGateway {
    pub fn new(backend: Arc<dyn GenerativeBackend>, api_key: Option<String>) -> Self {
        Self {
            backend,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    /// Same backend, different key
    pub fn with_api_key(&self, api_key: Option<String>) -> Self {
        Self::new(Arc::clone(&self.backend), api_key)
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model_version(&self) -> &str {
        self.backend.model()
    }

    async fn complete(&self, prompt: String, params: GenerationParams) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or(AppError::CredentialMissing)?;
        let request = GenerateRequest::new(prompt, params);
        self.backend.generate(api_key, &request).await
    }

    pub async fn summarize(&self, request: &SummaryRequest) -> Result<String> {
        let text = self
            .complete(prompts::summary(request), prompts::SUMMARY_PARAMS)
            .await?;
        non_empty(text)
    }

    pub async fn answer_question(&self, context: &str, question: &str) -> Result<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::InvalidInput("question must not be empty".to_string()));
        }
        let text = self
            .complete(prompts::answer(context, question), prompts::ANSWER_PARAMS)
            .await?;
        non_empty(text)
    }

    pub async fn analyze_authenticity(&self, text: &str) -> Result<AuthenticityAssessment> {
        let raw = self
            .complete(prompts::authenticity(text), prompts::AUTHENTICITY_PARAMS)
            .await?;
        Ok(parse_authenticity(&raw))
    }

    pub async fn translate(&self, text: &str, language_code: &str) -> Result<String> {
        let code = language_code.trim();
        if code.is_empty() {
            return Err(AppError::InvalidInput("language code must not be empty".to_string()));
        }
        let language = prompts::language_name(code).unwrap_or(code);
        let text = self
            .complete(prompts::translate(text, language), prompts::TRANSLATE_PARAMS)
            .await?;
        non_empty(text)
    }

    /// Parse failures get one recovery prompt; if that does not help either,
    /// the result is an empty list carrying the parse error.
    pub async fn generate_references(&self, topic: &str) -> Result<ReferenceList> {
        let raw = self
            .complete(prompts::references(topic), prompts::REFERENCE_PARAMS)
            .await?;

        let first_error = match parse_references(&raw) {
            Ok(references) => return Ok(ReferenceList::parsed(references)),
            Err(e) => e,
        };
        tracing::warn!("Reference list was not valid JSON ({}), asking for a fix", first_error);

        let recovered = self
            .complete(prompts::json_recovery(&raw), prompts::JSON_RECOVERY_PARAMS)
            .await;

        let list = match recovered {
            Ok(fixed) => match parse_references(&fixed) {
                Ok(references) => ReferenceList::parsed(references),
                Err(e) => ReferenceList::failed(e),
            },
            Err(e) => ReferenceList::failed(format!("{first_error}; recovery failed: {e}")),
        };
        if let Some(error) = &list.parse_error {
            tracing::warn!("Giving up on reference list: {}", error);
        }
        Ok(list)
    }

    pub async fn generate_quiz_questions(&self, summary: &str) -> Result<Vec<QuizQuestion>> {
        let raw = self
            .complete(prompts::quiz(summary), prompts::QUIZ_PARAMS)
            .await?;
        parse_quiz_questions(&raw)
    }

    /// Never fails: without a model reply the feedback is one of two
    /// fixed sentences picked by score.
    pub async fn generate_quiz_feedback(
        &self,
        summary: &str,
        questions: &[QuizQuestion],
        selected: &[i8],
    ) -> QuizFeedback {
        let score = score_percent(questions, selected);
        let transcript = prompts::quiz_transcript(questions, selected);

        let feedback = match self
            .complete(
                prompts::quiz_feedback(summary, &transcript, score),
                prompts::FEEDBACK_PARAMS,
            )
            .await
            .and_then(non_empty)
        {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Quiz feedback unavailable, using fallback: {}", e);
                fallback_feedback(score).to_string()
            }
        };

        QuizFeedback {
            score_percent: score,
            feedback,
        }
    }
}

fn non_empty(text: String) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(AppError::MalformedResponse)
    } else {
        Ok(trimmed.to_string())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{gateway, ScriptedBackend};
    use super::*;
    use crate::models::{
        sample_questions, ReferenceKind, FAILED_FEEDBACK, NO_EXPLANATION, PASSED_FEEDBACK,
    };

    fn article() -> String {
        "Coral reefs are bleaching as oceans warm. ".repeat(10)
    }

    #[tokio::test]
    async fn summarize_returns_trimmed_text() {
        let backend = ScriptedBackend::new(vec![Ok("  A short summary.\n".to_string())]);
        let request = SummaryRequest::new(article(), 25).unwrap();
        assert!(request.source_text.len() >= 200);

        let summary = gateway(&backend).summarize(&request).await.unwrap();
        assert_eq!(summary, "A short summary.");
        assert!(backend.prompt(0).contains("approximately 50 words"));
    }

    #[tokio::test]
    async fn missing_credential_fails_before_any_call() {
        let backend = ScriptedBackend::new(vec![Ok("unused".to_string())]);
        let gateway = AiGateway::new(backend.clone(), None);
        let request = SummaryRequest::new(article(), 25).unwrap();

        assert!(!gateway.has_credential());
        assert!(matches!(
            gateway.summarize(&request).await,
            Err(AppError::CredentialMissing)
        ));
        assert!(matches!(
            gateway.generate_references("reefs").await,
            Err(AppError::CredentialMissing)
        ));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn blank_key_counts_as_missing() {
        let backend = ScriptedBackend::new(vec![]);
        let gateway = AiGateway::new(backend.clone(), Some("   ".to_string()));
        assert!(!gateway.has_credential());
        assert!(gateway
            .with_api_key(Some("abcdefghij".to_string()))
            .has_credential());
    }

    #[tokio::test]
    async fn remote_errors_propagate_from_summarize() {
        let backend = ScriptedBackend::new(vec![Err(AppError::RemoteError(
            "API key not valid".to_string(),
        ))]);
        let request = SummaryRequest::new(article(), 25).unwrap();
        let err = gateway(&backend).summarize(&request).await.unwrap_err();
        assert!(matches!(err, AppError::RemoteError(m) if m == "API key not valid"));
    }

    #[tokio::test]
    async fn answer_question_embeds_context() {
        let backend = ScriptedBackend::new(vec![Ok("They are bleaching.".to_string())]);
        let answer = gateway(&backend)
            .answer_question("Reefs are bleaching.", "What happens to reefs?")
            .await
            .unwrap();
        assert_eq!(answer, "They are bleaching.");
        assert!(backend.prompt(0).contains("Reefs are bleaching."));
        assert!(backend.prompt(0).contains("What happens to reefs?"));
    }

    #[tokio::test]
    async fn authenticity_is_lenient() {
        let backend = ScriptedBackend::new(vec![
            Ok("Score: 73\n\nExplanation: balanced reporting".to_string()),
            Ok("I cannot rate this.".to_string()),
        ]);
        let gateway = gateway(&backend);

        let first = gateway.analyze_authenticity("text").await.unwrap();
        assert_eq!((first.score, first.explanation.as_str()), (73, "balanced reporting"));

        let second = gateway.analyze_authenticity("text").await.unwrap();
        assert_eq!((second.score, second.explanation.as_str()), (0, NO_EXPLANATION));
    }

    #[tokio::test]
    async fn translate_names_known_languages() {
        let backend = ScriptedBackend::new(vec![Ok("Hola".to_string()), Ok("Salut".to_string())]);
        let gateway = gateway(&backend);

        assert_eq!(gateway.translate("Hello", "es").await.unwrap(), "Hola");
        assert!(backend.prompt(0).contains("into Spanish"));

        gateway.translate("Hello", "fr-CA").await.unwrap();
        assert!(backend.prompt(1).contains("into fr-CA"));

        assert!(matches!(
            gateway.translate("Hello", " ").await,
            Err(AppError::InvalidInput(_))
        ));
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn references_parse_on_first_try() {
        let backend = ScriptedBackend::new(vec![Ok(
            "Here are some:\n[{\"title\": \"Reef talk\", \"url\": \"https://youtube.com/watch?v=1\"}]"
                .to_string(),
        )]);
        let list = gateway(&backend).generate_references("reefs").await.unwrap();

        assert_eq!(backend.calls(), 1);
        assert_eq!(list.parse_error, None);
        assert_eq!(list.references[0].kind, ReferenceKind::Youtube);
    }

    #[tokio::test]
    async fn references_recover_with_one_extra_call() {
        let backend = ScriptedBackend::new(vec![
            Ok("title: Reef atlas, url: https://reefs.test".to_string()),
            Ok("[{\"title\": \"Reef atlas\", \"url\": \"https://reefs.test\"}]".to_string()),
        ]);
        let list = gateway(&backend).generate_references("reefs").await.unwrap();

        assert_eq!(backend.calls(), 2);
        assert!(backend.prompt(1).contains("Convert the following text into valid JSON"));
        assert!(backend.prompt(1).contains("Reef atlas"));
        assert_eq!(list.references.len(), 1);
        assert_eq!(list.references[0].kind, ReferenceKind::Web);
    }

    #[tokio::test]
    async fn references_give_up_after_recovery() {
        let backend = ScriptedBackend::new(vec![
            Ok("no json".to_string()),
            Ok("still no json".to_string()),
            Ok("[]".to_string()),
        ]);
        let list = gateway(&backend).generate_references("reefs").await.unwrap();

        assert_eq!(backend.calls(), 2);
        assert!(list.references.is_empty());
        assert!(list.parse_error.is_some());
    }

    #[tokio::test]
    async fn references_recovery_remote_failure_is_tagged() {
        let backend = ScriptedBackend::new(vec![
            Ok("no json".to_string()),
            Err(AppError::RemoteError("quota".to_string())),
        ]);
        let list = gateway(&backend).generate_references("reefs").await.unwrap();
        assert!(list.references.is_empty());
        assert!(list.parse_error.unwrap().contains("quota"));
    }

    #[tokio::test]
    async fn quiz_questions_are_parsed() {
        let reply = r#"```json
[{"question": "What is bleaching?", "options": ["a", "b", "c", "d"], "answer": 2}]
```"#;
        let backend = ScriptedBackend::new(vec![Ok(reply.to_string())]);
        let questions = gateway(&backend)
            .generate_quiz_questions("summary")
            .await
            .unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].correct_option(), "c");
    }

    #[tokio::test]
    async fn feedback_uses_model_reply() {
        let backend = ScriptedBackend::new(vec![Ok("Well done on the key ideas.".to_string())]);
        let questions = sample_questions(5);
        let selected: Vec<i8> = questions.iter().map(|q| q.answer as i8).collect();

        let result = gateway(&backend)
            .generate_quiz_feedback("summary", &questions, &selected)
            .await;
        assert_eq!(result.score_percent, 100);
        assert_eq!(result.feedback, "Well done on the key ideas.");
        assert!(backend.prompt(0).contains("scored 100/100"));
    }

    #[tokio::test]
    async fn feedback_falls_back_on_failure() {
        let questions = sample_questions(5);
        let selected: Vec<i8> = questions
            .iter()
            .enumerate()
            .map(|(i, q)| {
                if i % 2 == 0 {
                    q.answer as i8
                } else {
                    ((q.answer + 1) % 4) as i8
                }
            })
            .collect();

        let backend = ScriptedBackend::new(vec![Err(AppError::RemoteError("down".to_string()))]);
        let result = gateway(&backend)
            .generate_quiz_feedback("summary", &questions, &selected)
            .await;
        assert_eq!(result.score_percent, 60);
        assert_eq!(result.feedback, FAILED_FEEDBACK);

        let all_right: Vec<i8> = questions.iter().map(|q| q.answer as i8).collect();
        let offline = AiGateway::new(ScriptedBackend::new(vec![]), None);
        let result = offline
            .generate_quiz_feedback("summary", &questions, &all_right)
            .await;
        assert_eq!(result.score_percent, 100);
        assert_eq!(result.feedback, PASSED_FEEDBACK);
    }

    #[test]
    fn gateway_is_usable_from_sync_code() {
        let backend = ScriptedBackend::new(vec![Ok("Ciao".to_string())]);
        let gateway = gateway(&backend);
        let text = tokio_test::block_on(gateway.translate("Hello", "it")).unwrap();
        assert_eq!(text, "Ciao");
    }
}
