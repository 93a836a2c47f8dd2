use crate::models::{QuizQuestion, SummaryRequest, MAX_QUIZ_QUESTIONS};

use super::client::GenerationParams;

pub const SUMMARY_PARAMS: GenerationParams = GenerationParams {
    temperature: 0.2,
    top_k: 40,
    top_p: 0.95,
    max_output_tokens: 1024,
};

pub const ANSWER_PARAMS: GenerationParams = SUMMARY_PARAMS;

pub const AUTHENTICITY_PARAMS: GenerationParams = GenerationParams {
    temperature: 0.1,
    top_k: 40,
    top_p: 0.95,
    max_output_tokens: 512,
};

pub const TRANSLATE_PARAMS: GenerationParams = GenerationParams {
    temperature: 0.2,
    top_k: 40,
    top_p: 0.95,
    max_output_tokens: 2048,
};

pub const REFERENCE_PARAMS: GenerationParams = GenerationParams {
    temperature: 0.7,
    top_k: 40,
    top_p: 0.95,
    max_output_tokens: 1024,
};

pub const JSON_RECOVERY_PARAMS: GenerationParams = GenerationParams {
    temperature: 0.0,
    top_k: 1,
    top_p: 1.0,
    max_output_tokens: 1024,
};

pub const QUIZ_PARAMS: GenerationParams = GenerationParams {
    temperature: 0.4,
    top_k: 40,
    top_p: 0.95,
    max_output_tokens: 1024,
};

pub const FEEDBACK_PARAMS: GenerationParams = GenerationParams {
    temperature: 0.7,
    top_k: 40,
    top_p: 0.95,
    max_output_tokens: 256,
};

pub fn summary(request: &SummaryRequest) -> String {
    format!(
        "Summarize the following text in approximately {} words while maintaining the key points and main ideas.\n\
         Keep the summary coherent and well-structured.\n\n\
         Text to summarize:\n{}",
        request.target_words(),
        request.source_text
    )
}

pub fn answer(context: &str, question: &str) -> String {
    format!(
        "Context information is below.\n\
         ---------------------\n\
         {context}\n\
         ---------------------\n\
         Given the context information and not prior knowledge, answer the question: {question}\n\
         Provide a comprehensive answer based solely on the information in the text. \
         If the information to answer the question is not present in the text, \
         state that you cannot answer based on the provided information."
    )
}

pub fn authenticity(text: &str) -> String {
    format!(
        "Assess how authentic and trustworthy the following article appears. Consider factual \
         consistency, balance, sourcing, sensational language and signs of misinformation.\n\
         Reply in exactly this format:\n\
         Score: <an integer from 0 to 100, where 100 is fully authentic>\n\n\
         Explanation: <two or three sentences explaining the score>\n\n\
         Article:\n{text}"
    )
}

pub fn translate(text: &str, language: &str) -> String {
    format!(
        "Translate the following text into {language}. Preserve the meaning, tone and paragraph \
         structure. Respond with the translation only.\n\n\
         Text:\n{text}"
    )
}

pub fn references(topic: &str) -> String {
    format!(
        "Suggest 5 useful references for learning more about the topic below: a mix of web \
         articles and YouTube videos.\n\
         Respond only with a JSON array of objects with the keys \"title\", \"url\" and \"type\", \
         where \"type\" is either \"youtube\" or \"web\".\n\n\
         Topic:\n{topic}"
    )
}

pub fn json_recovery(raw: &str) -> String {
    format!(
        "Convert the following text into valid JSON. Output only a JSON array of objects with \
         the keys \"title\", \"url\" and \"type\", with no commentary or code fences.\n\n\
         Text:\n{raw}"
    )
}

pub fn quiz(summary: &str) -> String {
    format!(
        "Create {MAX_QUIZ_QUESTIONS} multiple-choice questions that test understanding of the \
         summary below. Each question must have exactly 4 options and one correct answer.\n\
         Respond only with a JSON array in this shape:\n\
         [{{\"question\": \"...\", \"options\": [\"...\", \"...\", \"...\", \"...\"], \"answer\": 0}}]\n\
         where \"answer\" is the zero-based index of the correct option.\n\n\
         Summary:\n{summary}"
    )
}

/// One block per question: what was asked, what was chosen, what was right.
pub fn quiz_transcript(questions: &[QuizQuestion], selected: &[i8]) -> String {
    questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let choice = selected.get(i).copied().unwrap_or(-1);
            let chosen = q.option(choice).unwrap_or("No answer");
            let verdict = if q.is_correct(choice) {
                "Correct"
            } else {
                "Incorrect"
            };
            format!(
                "Question {}: {}\nUser's answer: {}\nCorrect answer: {}\nResult: {}",
                i + 1,
                q.question,
                chosen,
                q.correct_option(),
                verdict
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn quiz_feedback(summary: &str, transcript: &str, score: u8) -> String {
    format!(
        "A reader took a quiz about the article summarized below and scored {score}/100.\n\n\
         Summary:\n{summary}\n\n\
         Quiz results:\n{transcript}\n\n\
         Write 3-4 sentences of encouraging, specific feedback: mention what they understood \
         well and which ideas from the article they should review."
    )
}

pub fn language_name(code: &str) -> Option<&'static str> {
    let name = match code.trim().to_ascii_lowercase().as_str() {
        "en" => "English",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "it" => "Italian",
        "pt" => "Portuguese",
        "hi" => "Hindi",
        "zh" => "Chinese",
        "ja" => "Japanese",
        "ko" => "Korean",
        "ar" => "Arabic",
        "ru" => "Russian",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample_questions;

    #[test]
    fn summary_prompt_carries_target_words() {
        let text = "word ".repeat(1000);
        let request = SummaryRequest::new(text, 25).unwrap();
        assert!(summary(&request).contains("approximately 250 words"));
    }

    #[test]
    fn answer_prompt_restricts_to_context() {
        let prompt = answer("The sky is green.", "What colour is the sky?");
        assert!(prompt.contains("The sky is green."));
        assert!(prompt.contains("not prior knowledge"));
        assert!(prompt.contains("cannot answer"));
    }

    #[test]
    fn transcript_marks_unanswered_and_wrong_choices() {
        let questions = sample_questions(2);
        let transcript = quiz_transcript(&questions, &[0, -1]);
        assert!(transcript.contains("Question 1: Question 1?\nUser's answer: A"));
        assert!(transcript.contains("Result: Correct"));
        assert!(transcript.contains("User's answer: No answer\nCorrect answer: B\nResult: Incorrect"));
    }

    #[test]
    fn known_language_codes_have_names() {
        assert_eq!(language_name("ES"), Some("Spanish"));
        assert_eq!(language_name("xx"), None);
    }
}
