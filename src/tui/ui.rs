use chrono::Local;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Paragraph, Wrap};
use unicode_width::UnicodeWidthStr;

use crate::core::message::{Message, Sender};
use crate::core::state::ConversationState;
use crate::tui::TuiState;

const TYPING_FRAMES: [&str; 4] = ["Typing", "Typing.", "Typing..", "Typing..."];

pub fn draw_ui(
    frame: &mut Frame,
    state: &ConversationState,
    tui: &mut TuiState,
    quick_questions: &[String],
    spinner_frame: usize,
) {
    use Constraint::{Length, Min};

    let quick_bar = quick_bar(quick_questions);
    let quick_height = (quick_bar.line_count(frame.area().width) as u16).clamp(1, 3);

    let layout = Layout::vertical([Length(1), Min(0), Length(1), Length(quick_height), Length(3)]);
    let [title_area, messages_area, typing_area, quick_area, input_area] = layout.areas(frame.area());

    frame.render_widget(title_bar(state, tui), title_area);
    draw_messages(frame, messages_area, state, tui);

    if state.is_awaiting_reply {
        let typing = Span::styled(
            TYPING_FRAMES[spinner_frame % TYPING_FRAMES.len()],
            Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
        );
        frame.render_widget(Paragraph::new(typing), typing_area);
    }

    frame.render_widget(quick_bar, quick_area);
    draw_input(frame, input_area, state, tui);
}

fn title_bar(state: &ConversationState, tui: &TuiState) -> Paragraph<'static> {
    let mut spans = vec![
        Span::styled(
            " SoftSell Assistant ",
            Style::default().fg(Color::White).bg(Color::Blue).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" How can we help? │ "),
        Span::styled(
            format!("Mode: {}", state.mode.label()),
            Style::default().fg(Color::Yellow),
        ),
        Span::styled(
            "  (Ctrl+T toggle, Esc quit)",
            Style::default().add_modifier(Modifier::DIM),
        ),
    ];
    if let Some(status) = &tui.status_message {
        spans.push(Span::raw(format!(" │ {status}")));
    }
    Paragraph::new(Line::from(spans))
}

fn message_lines(message: &Message) -> Vec<Line<'static>> {
    let (label, style, alignment) = match message.sender() {
        Sender::Bot => (
            "Assistant",
            Style::default().fg(Color::White),
            Alignment::Left,
        ),
        Sender::User => ("You", Style::default().fg(Color::LightBlue), Alignment::Right),
    };
    let time = message.created_at().with_timezone(&Local).format("%H:%M");

    let mut lines = vec![
        Line::from(Span::styled(
            format!("{label} · {time}"),
            style.add_modifier(Modifier::DIM),
        ))
        .alignment(alignment),
    ];
    lines.extend(
        message
            .text()
            .lines()
            .map(|l| Line::from(Span::styled(l.to_string(), style)).alignment(alignment)),
    );
    lines.push(Line::default());
    lines
}

fn draw_messages(frame: &mut Frame, area: Rect, state: &ConversationState, tui: &mut TuiState) {
    let lines: Vec<Line> = state.messages.iter().flat_map(message_lines).collect();
    let paragraph = Paragraph::new(Text::from(lines))
        .block(Block::bordered().border_style(Style::default().add_modifier(Modifier::DIM)))
        .wrap(Wrap { trim: false });

    // Pin to the bottom, minus however far the user scrolled back.
    let total = paragraph.line_count(area.width) as u16;
    let max_offset = total.saturating_sub(area.height);
    tui.scroll_from_bottom = tui.scroll_from_bottom.min(max_offset);
    let offset = max_offset - tui.scroll_from_bottom;

    frame.render_widget(paragraph.scroll((offset, 0)), area);
}

fn quick_bar(quick_questions: &[String]) -> Paragraph<'static> {
    let mut spans = Vec::new();
    for (i, question) in quick_questions.iter().take(9).enumerate() {
        spans.push(Span::styled(
            format!("[F{}]", i + 1),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(
            format!(" {question}  "),
            Style::default().fg(Color::Gray),
        ));
    }
    Paragraph::new(Line::from(spans)).wrap(Wrap { trim: true })
}

fn draw_input(frame: &mut Frame, area: Rect, state: &ConversationState, tui: &TuiState) {
    let accepting = state.accepts_input();
    let border_style = if accepting {
        Style::default().fg(Color::Blue)
    } else {
        Style::default().add_modifier(Modifier::DIM)
    };

    let content = if tui.input.is_empty() {
        Span::styled("Type your message...", Style::default().fg(Color::DarkGray))
    } else if accepting {
        Span::raw(tui.input.clone())
    } else {
        Span::styled(tui.input.clone(), Style::default().add_modifier(Modifier::DIM))
    };

    let input = Paragraph::new(content).block(
        Block::bordered()
            .title("Message")
            .border_style(border_style)
            .title_style(border_style),
    );
    frame.render_widget(input, area);

    if accepting {
        let inner_width = area.width.saturating_sub(2);
        let typed = u16::try_from(tui.input.width()).unwrap_or(u16::MAX);
        let x = area.x + 1 + typed.min(inner_width.saturating_sub(1));
        frame.set_cursor_position(Position::new(x, area.y + 1));
    }
}
