use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap},
    Frame,
};

use crate::app::{
    App, InputMode, NotificationLevel, OpKind, PromptKind, ResultTab, Stage, View,
};
use crate::models::{
    word_count, ProfileStats, MAX_LENGTH_PERCENT, MIN_LENGTH_PERCENT, PASSING_SCORE, UNANSWERED,
};

pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar with progress
            Constraint::Min(0),    // Body
            Constraint::Length(1), // Key hints / notifications
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);

    match app.view {
        View::History => render_history(frame, app, chunks[1]),
        View::Profile => render_profile(frame, app, chunks[1]),
        View::Wizard => match app.stage {
            // The key modal is drawn over the input screen
            Stage::AwaitingCredential | Stage::Composing => render_composing(frame, app, chunks[1]),
            Stage::Summarizing => render_summarizing(frame, app, chunks[1]),
            Stage::Summarized => render_results(frame, app, chunks[1]),
            Stage::TakingQuiz => render_quiz(frame, app, chunks[1]),
            Stage::QuizScored => render_quiz_result(frame, app, chunks[1]),
        },
    }

    render_status(frame, app, chunks[2]);

    if app.view == View::Wizard && app.stage == Stage::AwaitingCredential {
        render_credential_modal(frame, app);
    }

    if let Some(prompt) = &app.prompt {
        let title = match prompt.kind {
            PromptKind::Question => " Ask a question about the article ",
            PromptKind::Language => " Translate summary to (language code, e.g. es, fr, ja) ",
        };
        render_line_popup(frame, title, &prompt.buffer, false);
    }

    if app.show_help {
        render_help(frame);
    }
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let steps = [
        ("1 Input", matches!(app.stage, Stage::AwaitingCredential | Stage::Composing)),
        ("2 Summarize", app.stage == Stage::Summarizing),
        ("3 Explore", app.stage == Stage::Summarized),
        ("4 Quiz", matches!(app.stage, Stage::TakingQuiz | Stage::QuizScored)),
    ];

    let mut spans = Vec::new();
    for (i, (label, active)) in steps.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" → ", Style::default().fg(Color::DarkGray)));
        }
        let style = if *active && app.view == View::Wizard {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(*label, style));
    }

    let name = app.profile.full_name.as_deref().unwrap_or("Reader");
    let title = match app.view {
        View::Wizard => " Article Whisperer ".to_string(),
        View::History => " Article Whisperer · History ".to_string(),
        View::Profile => " Article Whisperer · Profile ".to_string(),
    };

    let block = Block::default()
        .title(title)
        .title(Line::from(format!(" {name} ")).right_aligned())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    frame.render_widget(paragraph, area);
}

fn render_composing(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(area);

    let (title, content) = match app.input_mode {
        InputMode::Text => (
            format!(
                " Paste article text ({} words) · Tab: switch to URL ",
                word_count(&app.article_input)
            ),
            format!("{}_", app.article_input),
        ),
        InputMode::Url => (
            " Article URL · Tab: switch to text ".to_string(),
            format!("{}_", app.url_input),
        ),
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    // Keep the cursor line in view once the text outgrows the box
    let inner = block.inner(chunks[0]);
    let wrapped = textwrap::wrap(&content, usize::from(inner.width.max(1))).len();
    let scroll = wrapped.saturating_sub(usize::from(inner.height)) as u16;

    let paragraph = Paragraph::new(content)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(paragraph, chunks[0]);

    render_length_slider(frame, app.length_percent, chunks[1]);
}

fn render_length_slider(frame: &mut Frame, percent: u8, area: Rect) {
    let steps = usize::from((MAX_LENGTH_PERCENT - MIN_LENGTH_PERCENT) / 5);
    let clamped = percent.clamp(MIN_LENGTH_PERCENT, MAX_LENGTH_PERCENT);
    let filled = usize::from((clamped - MIN_LENGTH_PERCENT) / 5);
    let bar = format!(
        "{}{}",
        "█".repeat(filled + 1),
        "░".repeat(steps - filled)
    );

    let line = Line::from(vec![
        Span::raw(" Summary length: "),
        Span::styled(bar, Style::default().fg(Color::Yellow)),
        Span::styled(format!(" {percent}% "), Style::default().add_modifier(Modifier::BOLD)),
        Span::styled("(←/→)", Style::default().fg(Color::DarkGray)),
    ]);

    let paragraph = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

fn render_summarizing(frame: &mut Frame, app: &App, area: Rect) {
    let source = match app.input_mode {
        InputMode::Text => "your article",
        InputMode::Url => app.url_input.trim(),
    };
    let text = format!(
        "\n\n{} Summarizing {} at {}% length...",
        app.spinner(),
        source,
        app.length_percent
    );

    let paragraph = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL))
        .style(Style::default().fg(Color::Yellow))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn render_results(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Article title
            Constraint::Length(1), // Tabs
            Constraint::Min(0),    // Tab content
        ])
        .split(area);

    let title = app
        .article
        .as_ref()
        .map(|a| a.title.as_str())
        .unwrap_or("No article");
    let title_block = Block::default()
        .title(" Article ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));
    frame.render_widget(
        Paragraph::new(title).block(title_block).wrap(Wrap { trim: true }),
        chunks[0],
    );

    let labels: Vec<Line> = ResultTab::ALL
        .iter()
        .map(|tab| {
            let busy = tab_op(*tab).is_some_and(|op| app.is_busy(op));
            if busy {
                Line::from(format!("{} {}", tab.label(), app.spinner()))
            } else {
                Line::from(tab.label())
            }
        })
        .collect();
    let selected = ResultTab::ALL
        .iter()
        .position(|t| *t == app.result_tab)
        .unwrap_or(0);
    let tabs = Tabs::new(labels)
        .select(selected)
        .highlight_style(Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, chunks[1]);

    match app.result_tab {
        ResultTab::References => render_references(frame, app, chunks[2]),
        tab => {
            let content = tab_text(app, tab);
            let block = Block::default()
                .title(format!(" {} ", tab.label()))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Magenta));
            let paragraph = Paragraph::new(content)
                .block(block)
                .wrap(Wrap { trim: true });
            frame.render_widget(paragraph, chunks[2]);
        }
    }
}

fn tab_op(tab: ResultTab) -> Option<OpKind> {
    match tab {
        ResultTab::Summary => None,
        ResultTab::Answer => Some(OpKind::Answer),
        ResultTab::Authenticity => Some(OpKind::Authenticity),
        ResultTab::Translation => Some(OpKind::Translation),
        ResultTab::References => Some(OpKind::References),
    }
}

fn tab_text(app: &App, tab: ResultTab) -> String {
    if tab_op(tab).is_some_and(|op| app.is_busy(op)) {
        return format!("{} Working...", app.spinner());
    }

    match tab {
        ResultTab::Summary => app
            .article
            .as_ref()
            .map(|a| a.summary.clone())
            .unwrap_or_default(),
        ResultTab::Answer => match &app.answer {
            Some((question, answer)) => format!("Q: {question}\n\n{answer}"),
            None => "Press 'a' to ask a question about the article.".to_string(),
        },
        ResultTab::Authenticity => match &app.authenticity {
            Some(assessment) => format!(
                "Authenticity score: {}/100\n\n{}",
                assessment.score, assessment.explanation
            ),
            None => "Press 'v' to check how credible the article looks.".to_string(),
        },
        ResultTab::Translation => match &app.translation {
            Some((language, text)) => format!("[{language}]\n\n{text}"),
            None => "Press 't' to translate the summary.".to_string(),
        },
        ResultTab::References => String::new(),
    }
}

fn render_references(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" References · o: open ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta));

    let list = match &app.references {
        Some(list) if !list.references.is_empty() => list,
        other => {
            let text = if app.is_busy(OpKind::References) {
                format!("{} Looking for further reading...", app.spinner())
            } else if let Some(error) = other.as_ref().and_then(|l| l.parse_error.as_deref()) {
                format!("No references could be read from the reply.\n\n{error}")
            } else {
                "Press 'r' to find related articles and videos.".to_string()
            };
            frame.render_widget(
                Paragraph::new(text).block(block).wrap(Wrap { trim: true }),
                area,
            );
            return;
        }
    };

    let items: Vec<ListItem> = list
        .references
        .iter()
        .map(|reference| {
            let line = Line::from(vec![
                Span::styled(
                    format!("[{}] ", reference.kind.label()),
                    Style::default().fg(Color::Blue),
                ),
                Span::styled(reference.title.as_str(), Style::default().fg(Color::White)),
                Span::styled(
                    format!("  {}", reference.url),
                    Style::default().fg(Color::DarkGray),
                ),
            ]);
            ListItem::new(line)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(Some(app.selected_reference));
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_quiz(frame: &mut Frame, app: &App, area: Rect) {
    let Some(quiz) = &app.quiz else {
        return;
    };

    let mut lines = Vec::new();
    for (i, question) in quiz.questions.iter().enumerate() {
        let current = i == quiz.cursor;
        let marker = if current { "> " } else { "  " };
        let style = if current {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };
        lines.push(Line::from(Span::styled(
            format!("{marker}{}. {}", i + 1, question.question),
            style,
        )));

        let selected = quiz.attempt.selection(i);
        for (j, option) in question.options.iter().enumerate() {
            let chosen = selected != UNANSWERED && selected as usize == j;
            let style = if chosen {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            let bullet = if chosen { "●" } else { "○" };
            lines.push(Line::from(Span::styled(
                format!("     {bullet} {}) {option}", j + 1),
                style,
            )));
        }
        lines.push(Line::from(""));
    }

    let answered = quiz
        .attempt
        .selected
        .iter()
        .filter(|s| **s != UNANSWERED)
        .count();
    let title = if app.is_busy(OpKind::Feedback) {
        format!(" Quiz · {} Scoring... ", app.spinner())
    } else {
        format!(" Quiz · {answered}/{} answered ", quiz.questions.len())
    };

    // Roughly keep the current question on screen
    let scroll = (quiz.cursor * 6).saturating_sub(usize::from(area.height / 2)) as u16;

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}

fn render_quiz_result(frame: &mut Frame, app: &App, area: Rect) {
    let Some(quiz) = &app.quiz else {
        return;
    };
    let Some(result) = &quiz.result else {
        return;
    };

    let score_color = if result.score_percent >= PASSING_SCORE {
        Color::Green
    } else {
        Color::Yellow
    };

    let mut lines = vec![
        Line::from(vec![
            Span::styled(
                format!("Score: {}/100", result.score_percent),
                Style::default().fg(score_color).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(
                    "  ({}/{} correct)",
                    quiz.attempt.correct_count(&quiz.questions),
                    quiz.questions.len()
                ),
                Style::default().fg(Color::DarkGray),
            ),
        ]),
        Line::from(""),
        Line::from(result.feedback.as_str()),
        Line::from(""),
    ];

    for (i, question) in quiz.questions.iter().enumerate() {
        let selected = quiz.attempt.selection(i);
        let (mark, color) = if question.is_correct(selected) {
            ("✓", Color::Green)
        } else {
            ("✗", Color::Red)
        };
        lines.push(Line::from(Span::styled(
            format!("{mark} {}. {}", i + 1, question.question),
            Style::default().fg(color),
        )));
        if !question.is_correct(selected) {
            lines.push(Line::from(Span::styled(
                format!("    Correct answer: {}", question.correct_option()),
                Style::default().fg(Color::DarkGray),
            )));
        }
    }

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title(" Quiz results ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(score_color)),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn render_history(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 3), Constraint::Ratio(2, 3)])
        .split(area);

    let items: Vec<ListItem> = app
        .history
        .iter()
        .map(|entry| {
            let score = entry
                .quiz
                .as_ref()
                .map(|q| format!(" [{}%]", q.score))
                .unwrap_or_default();
            let line = Line::from(vec![
                Span::styled(
                    entry.created_at.format("%Y-%m-%d ").to_string(),
                    Style::default().fg(Color::Blue),
                ),
                Span::styled(entry.title.as_str(), Style::default().fg(Color::White)),
                Span::styled(score, Style::default().fg(Color::Yellow)),
            ]);
            ListItem::new(line)
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .title(format!(" {} articles ", app.history.len()))
                .borders(Borders::ALL),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    if !app.history.is_empty() {
        state.select(Some(app.history_index));
    }
    frame.render_stateful_widget(list, chunks[0], &mut state);

    let detail = match app.selected_history() {
        Some(entry) => {
            let mut text = entry.summary.clone();
            if let Some(quiz) = &entry.quiz {
                text.push_str(&format!("\n\nQuiz score: {}/100", quiz.score));
                if let Some(suggestion) = &quiz.suggestion {
                    text.push_str(&format!("\n{suggestion}"));
                }
            }
            text
        }
        None => "No summaries yet.".to_string(),
    };

    let paragraph = Paragraph::new(detail)
        .block(
            Block::default()
                .title(" Summary ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Magenta)),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, chunks[1]);
}

fn render_profile(frame: &mut Frame, app: &App, area: Rect) {
    let stats = ProfileStats::from_history(&app.history);
    let average = stats
        .average_score
        .map(|s| format!("{s:.0}/100"))
        .unwrap_or_else(|| "-".to_string());

    let lines = vec![
        Line::from(vec![
            Span::styled("Name:            ", Style::default().fg(Color::DarkGray)),
            Span::raw(app.profile.full_name.as_deref().unwrap_or("(not set)")),
        ]),
        Line::from(vec![
            Span::styled("Member since:    ", Style::default().fg(Color::DarkGray)),
            Span::raw(app.profile.created_at.format("%Y-%m-%d").to_string()),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("Articles read:   ", Style::default().fg(Color::DarkGray)),
            Span::raw(stats.articles.to_string()),
        ]),
        Line::from(vec![
            Span::styled("Quizzes taken:   ", Style::default().fg(Color::DarkGray)),
            Span::raw(stats.quizzes.to_string()),
        ]),
        Line::from(vec![
            Span::styled("Average score:   ", Style::default().fg(Color::DarkGray)),
            Span::raw(average),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("Model:           ", Style::default().fg(Color::DarkGray)),
            Span::raw(app.model_version().to_string()),
        ]),
    ];

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .title(" Profile ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(paragraph, area);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(notification) = &app.notification {
        let color = match notification.level {
            NotificationLevel::Info => Color::Cyan,
            NotificationLevel::Success => Color::Green,
            NotificationLevel::Error => Color::Red,
        };
        let paragraph =
            Paragraph::new(notification.message.as_str()).style(Style::default().fg(color));
        frame.render_widget(paragraph, area);
        return;
    }

    let hints = match app.view {
        View::History => "j/k:nav  Enter:open  d:delete  Esc:back  F1:help",
        View::Profile => "Esc:back  F2:history  F1:help",
        View::Wizard => match app.stage {
            Stage::AwaitingCredential => "Enter:save key  Esc:cancel",
            Stage::Composing => {
                "Ctrl+S:summarize  Ctrl+L:sample  Tab:text/URL  ←/→:length  F1:help"
            }
            Stage::Summarizing => "Please wait...  q:quit",
            Stage::Summarized => {
                "Tab:switch  a:ask  v:verify  t:translate  r:references  z:quiz  n:new  ?:help"
            }
            Stage::TakingQuiz => "j/k:question  1-4:answer  Enter:submit  Esc:leave quiz",
            Stage::QuizScored => "Enter:back to summary  n:new article  q:quit",
        },
    };

    let paragraph = Paragraph::new(hints).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}

fn render_credential_modal(frame: &mut Frame, app: &App) {
    render_line_popup(
        frame,
        " Enter your Gemini API key ",
        &app.key_input,
        true,
    );
}

fn render_line_popup(frame: &mut Frame, title: &str, buffer: &str, masked: bool) {
    let area = centered_rect(60, 20, frame.area());

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let inner = block.inner(area);

    // Clear the area first
    frame.render_widget(Clear, area);
    frame.render_widget(block, area);

    let shown = if masked {
        "*".repeat(buffer.chars().count())
    } else {
        buffer.to_string()
    };
    let input_text = format!("> {shown}_");
    let paragraph = Paragraph::new(input_text)
        .style(Style::default().fg(Color::White))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, inner);
}

fn render_help(frame: &mut Frame) {
    let area = centered_rect(50, 70, frame.area());

    let help_text = vec![
        "",
        " Input:",
        "   Tab      Switch between text and URL",
        "   ← / →    Summary length",
        "   Ctrl+S   Summarize",
        "   Ctrl+L   Load a sample article",
        "",
        " Summary:",
        "   Tab      Next tab",
        "   a        Ask a question",
        "   v        Verify authenticity",
        "   t        Translate summary",
        "   r        Find references",
        "   o        Open selected reference",
        "   z        Take the quiz",
        "   n        New article",
        "",
        " General:",
        "   F1 / ?   Toggle this help",
        "   F2       History",
        "   F3       Profile",
        "   F4       Change API key",
        "   q        Quit",
        "",
        " Press any key to close",
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(help_text.join("\n"))
        .block(block)
        .style(Style::default().fg(Color::White));

    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
