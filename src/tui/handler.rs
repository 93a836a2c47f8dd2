use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::models::OPTIONS_PER_QUESTION;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    Quit,
    ShowHelp,
    HideHelp,
    ShowHistory,
    ShowProfile,
    ShowWizard,
    OpenCredentialModal,
    // Text entry (whichever editor is active)
    InputChar(char),
    InputNewline,
    InputBackspace,
    Paste(String),
    ConfirmInput,
    CancelInput,
    // Composing
    ToggleInputMode,
    LengthUp,
    LengthDown,
    Submit,
    LoadSample,
    // Summary actions
    NextTab,
    PrevTab,
    AskQuestion,
    AnalyzeAuthenticity,
    Translate,
    FindReferences,
    OpenReference,
    StartQuiz,
    NewArticle,
    // Lists and quiz
    MoveUp,
    MoveDown,
    SelectOption(u8),
    SubmitQuiz,
    OpenHistoryEntry,
    DeleteHistoryEntry,
}

/// What the keyboard is currently driving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyContext {
    Help,
    CredentialModal,
    LinePrompt,
    ComposingText,
    ComposingUrl,
    Summarizing,
    Summarized,
    TakingQuiz,
    QuizScored,
    History,
    Profile,
}

pub fn handle_key_event(key: KeyEvent, context: KeyContext) -> Option<AppAction> {
    // If help is showing, any key closes it
    if context == KeyContext::Help {
        return Some(AppAction::HideHelp);
    }

    if let (KeyCode::Char('c'), KeyModifiers::CONTROL) = (key.code, key.modifiers) {
        return Some(AppAction::Quit);
    }

    // Function keys work everywhere, even while typing
    match key.code {
        KeyCode::F(1) => return Some(AppAction::ShowHelp),
        KeyCode::F(2) => return Some(AppAction::ShowHistory),
        KeyCode::F(3) => return Some(AppAction::ShowProfile),
        KeyCode::F(4) => return Some(AppAction::OpenCredentialModal),
        _ => {}
    }

    match context {
        KeyContext::Help => None,
        KeyContext::CredentialModal | KeyContext::LinePrompt => line_input(key),
        KeyContext::ComposingText | KeyContext::ComposingUrl => {
            composing(key, context == KeyContext::ComposingText)
        }
        KeyContext::Summarizing => common(key),
        KeyContext::Summarized => match key.code {
            KeyCode::Tab | KeyCode::Right => Some(AppAction::NextTab),
            KeyCode::BackTab | KeyCode::Left => Some(AppAction::PrevTab),
            KeyCode::Char('a') => Some(AppAction::AskQuestion),
            KeyCode::Char('v') => Some(AppAction::AnalyzeAuthenticity),
            KeyCode::Char('t') => Some(AppAction::Translate),
            KeyCode::Char('r') => Some(AppAction::FindReferences),
            KeyCode::Char('o') | KeyCode::Enter => Some(AppAction::OpenReference),
            KeyCode::Char('z') => Some(AppAction::StartQuiz),
            KeyCode::Char('n') => Some(AppAction::NewArticle),
            KeyCode::Char('j') | KeyCode::Down => Some(AppAction::MoveDown),
            KeyCode::Char('k') | KeyCode::Up => Some(AppAction::MoveUp),
            _ => common(key),
        },
        KeyContext::TakingQuiz => match key.code {
            KeyCode::Char('j') | KeyCode::Down => Some(AppAction::MoveDown),
            KeyCode::Char('k') | KeyCode::Up => Some(AppAction::MoveUp),
            KeyCode::Char(c @ '1'..='9') => {
                let option = c as u8 - b'1';
                (usize::from(option) < OPTIONS_PER_QUESTION)
                    .then_some(AppAction::SelectOption(option))
            }
            KeyCode::Enter => Some(AppAction::SubmitQuiz),
            KeyCode::Esc => Some(AppAction::CancelInput),
            _ => common(key),
        },
        KeyContext::QuizScored => match key.code {
            KeyCode::Enter | KeyCode::Esc => Some(AppAction::CancelInput),
            KeyCode::Char('n') => Some(AppAction::NewArticle),
            _ => common(key),
        },
        KeyContext::History => match key.code {
            KeyCode::Char('j') | KeyCode::Down => Some(AppAction::MoveDown),
            KeyCode::Char('k') | KeyCode::Up => Some(AppAction::MoveUp),
            KeyCode::Enter => Some(AppAction::OpenHistoryEntry),
            KeyCode::Char('d') => Some(AppAction::DeleteHistoryEntry),
            KeyCode::Esc | KeyCode::Char('b') => Some(AppAction::ShowWizard),
            _ => common(key),
        },
        KeyContext::Profile => match key.code {
            KeyCode::Esc | KeyCode::Char('b') => Some(AppAction::ShowWizard),
            _ => common(key),
        },
    }
}

fn common(key: KeyEvent) -> Option<AppAction> {
    match key.code {
        KeyCode::Char('q') => Some(AppAction::Quit),
        KeyCode::Char('?') => Some(AppAction::ShowHelp),
        _ => None,
    }
}

fn line_input(key: KeyEvent) -> Option<AppAction> {
    match key.code {
        KeyCode::Enter => Some(AppAction::ConfirmInput),
        KeyCode::Esc => Some(AppAction::CancelInput),
        KeyCode::Backspace => Some(AppAction::InputBackspace),
        KeyCode::Char(c) => Some(AppAction::InputChar(c)),
        _ => None,
    }
}

fn composing(key: KeyEvent, multiline: bool) -> Option<AppAction> {
    match (key.code, key.modifiers) {
        (KeyCode::Char('s'), KeyModifiers::CONTROL) => Some(AppAction::Submit),
        (KeyCode::Char('l'), KeyModifiers::CONTROL) => Some(AppAction::LoadSample),
        (KeyCode::Tab, _) => Some(AppAction::ToggleInputMode),
        (KeyCode::Right, _) | (KeyCode::Up, _) => Some(AppAction::LengthUp),
        (KeyCode::Left, _) | (KeyCode::Down, _) => Some(AppAction::LengthDown),
        (KeyCode::Enter, _) if multiline => Some(AppAction::InputNewline),
        (KeyCode::Enter, _) => Some(AppAction::Submit),
        (KeyCode::Backspace, _) => Some(AppAction::InputBackspace),
        (KeyCode::Char(c), m) if !m.contains(KeyModifiers::CONTROL) => {
            Some(AppAction::InputChar(c))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    #[test]
    fn letters_are_typed_while_composing() {
        assert_eq!(
            handle_key_event(press(KeyCode::Char('q')), KeyContext::ComposingText),
            Some(AppAction::InputChar('q'))
        );
        assert_eq!(
            handle_key_event(press(KeyCode::Enter), KeyContext::ComposingText),
            Some(AppAction::InputNewline)
        );
        assert_eq!(
            handle_key_event(press(KeyCode::Enter), KeyContext::ComposingUrl),
            Some(AppAction::Submit)
        );
        assert_eq!(
            handle_key_event(ctrl('s'), KeyContext::ComposingText),
            Some(AppAction::Submit)
        );
    }

    #[test]
    fn ctrl_c_always_quits() {
        for context in [
            KeyContext::CredentialModal,
            KeyContext::ComposingText,
            KeyContext::TakingQuiz,
        ] {
            assert_eq!(handle_key_event(ctrl('c'), context), Some(AppAction::Quit));
        }
    }

    #[test]
    fn quiz_accepts_only_four_options() {
        assert_eq!(
            handle_key_event(press(KeyCode::Char('4')), KeyContext::TakingQuiz),
            Some(AppAction::SelectOption(3))
        );
        assert_eq!(
            handle_key_event(press(KeyCode::Char('5')), KeyContext::TakingQuiz),
            None
        );
    }

    #[test]
    fn any_key_closes_help() {
        assert_eq!(
            handle_key_event(press(KeyCode::Char('x')), KeyContext::Help),
            Some(AppAction::HideHelp)
        );
    }

    #[test]
    fn function_keys_switch_views_while_typing() {
        assert_eq!(
            handle_key_event(press(KeyCode::F(2)), KeyContext::LinePrompt),
            Some(AppAction::ShowHistory)
        );
    }
}
