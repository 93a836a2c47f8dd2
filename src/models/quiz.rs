use serde::{Deserialize, Serialize};

pub const OPTIONS_PER_QUESTION: usize = 4;
pub const MAX_QUIZ_QUESTIONS: usize = 5;
pub const UNANSWERED: i8 = -1;

/// Score at or above which a quiz counts as passed
pub const PASSING_SCORE: u8 = 80;
pub const PASSED_FEEDBACK: &str = "Great job! You understood the article well.";
pub const FAILED_FEEDBACK: &str = "Review the article and try again for a better score!";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: [String; OPTIONS_PER_QUESTION],
    pub answer: u8,
}

impl QuizQuestion {
    /// Returns `None` unless there are exactly four options and the answer
    /// indexes one of them.
    pub fn new(question: impl Into<String>, options: Vec<String>, answer: i64) -> Option<Self> {
        let question = question.into();
        if question.trim().is_empty() {
            return None;
        }
        let options: [String; OPTIONS_PER_QUESTION] = options.try_into().ok()?;
        let answer = u8::try_from(answer).ok()?;
        if usize::from(answer) >= OPTIONS_PER_QUESTION {
            return None;
        }
        Some(Self {
            question,
            options,
            answer,
        })
    }

    pub fn correct_option(&self) -> &str {
        &self.options[usize::from(self.answer)]
    }

    pub fn option(&self, index: i8) -> Option<&str> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.options.get(i))
            .map(String::as_str)
    }

    pub fn is_correct(&self, selected: i8) -> bool {
        selected >= 0 && selected as u8 == self.answer
    }
}

/// A user's selections for one quiz, aligned with the question list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub selected: Vec<i8>,
}

impl QuizAttempt {
    pub fn new(question_count: usize) -> Self {
        Self {
            selected: vec![UNANSWERED; question_count],
        }
    }

    pub fn select(&mut self, question: usize, option: i8) {
        if let Some(slot) = self.selected.get_mut(question) {
            if (UNANSWERED..OPTIONS_PER_QUESTION as i8).contains(&option) {
                *slot = option;
            }
        }
    }

    pub fn selection(&self, question: usize) -> i8 {
        self.selected.get(question).copied().unwrap_or(UNANSWERED)
    }

    pub fn is_complete(&self) -> bool {
        self.selected.iter().all(|&s| s != UNANSWERED)
    }

    pub fn correct_count(&self, questions: &[QuizQuestion]) -> usize {
        questions
            .iter()
            .enumerate()
            .filter(|(i, q)| q.is_correct(self.selection(*i)))
            .count()
    }
}

pub fn score_percent(questions: &[QuizQuestion], selected: &[i8]) -> u8 {
    if questions.is_empty() {
        return 0;
    }
    let correct = questions
        .iter()
        .enumerate()
        .filter(|(i, q)| q.is_correct(selected.get(*i).copied().unwrap_or(UNANSWERED)))
        .count();
    (correct as f64 / questions.len() as f64 * 100.0).round() as u8
}

pub fn fallback_feedback(score: u8) -> &'static str {
    if score >= PASSING_SCORE {
        PASSED_FEEDBACK
    } else {
        FAILED_FEEDBACK
    }
}

/// Score and model-written (or fallback) feedback for a submitted quiz
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizFeedback {
    pub score_percent: u8,
    pub feedback: String,
}

#[cfg(test)]
pub(crate) fn sample_questions(count: usize) -> Vec<QuizQuestion> {
    (0..count)
        .map(|i| {
            QuizQuestion::new(
                format!("Question {}?", i + 1),
                vec!["A".into(), "B".into(), "C".into(), "D".into()],
                (i % 4) as i64,
            )
            .unwrap()
        })
        .collect()
}
