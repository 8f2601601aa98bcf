use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use vibe_assist::{Entry, Role, SubmitMode};
use crate::app::App;

/// Collect text up to the closing `marker`. If it never closes, the
/// consumed text comes back as the error so it can be kept literally.
fn take_until(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, marker: &str) -> Result<String, String> {
    let mut inner = String::new();
    let double = marker.len() == 2;

    while let Some(c) = chars.next() {
        if c == '*' {
            if !double {
                return Ok(inner);
            }
            if chars.peek() == Some(&'*') {
                chars.next(); // consume second *
                return Ok(inner);
            }
        }
        inner.push(c);
    }
    Err(inner)
}

/// Parse a line of text and convert **bold** and *italic* markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c != '*' {
            current_text.push(c);
            continue;
        }

        let (marker, modifier) = if chars.peek() == Some(&'*') {
            chars.next();
            ("**", Modifier::BOLD)
        } else {
            ("*", Modifier::ITALIC)
        };

        match take_until(&mut chars, marker) {
            Ok(inner) if !inner.is_empty() => {
                // Push any accumulated plain text
                if !current_text.is_empty() {
                    spans.push(Span::raw(std::mem::take(&mut current_text)));
                }
                spans.push(Span::styled(inner, Style::default().add_modifier(modifier)));
            }
            Ok(_) => {
                current_text.push_str(marker);
                current_text.push_str(marker);
            }
            Err(consumed) => {
                // No closing marker, treat as literal
                current_text.push_str(marker);
                current_text.push_str(&consumed);
            }
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

fn role_label(role: Role) -> Span<'static> {
    match role {
        Role::User => Span::styled(
            "You:",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Role::Assistant => Span::styled(
            "Assistant:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
        Role::Error => Span::styled(
            "Error:",
            Style::default().fg(Color::LightRed).add_modifier(Modifier::BOLD),
        ),
    }
}

fn transcript_text(app: &App) -> Text<'static> {
    if app.transcript.is_empty() {
        return Text::from(Span::styled(
            "Ask about products, orders, shipping or returns...",
            Style::default().fg(Color::DarkGray),
        ));
    }

    let mut lines: Vec<Line> = Vec::new();

    for entry in app.transcript.entries() {
        match entry {
            Entry::Message(msg) => {
                lines.push(Line::from(role_label(msg.role)));
                match msg.role {
                    Role::User => {
                        for line in msg.text.lines() {
                            lines.push(Line::from(line.to_string()));
                        }
                    }
                    Role::Assistant => {
                        // Split response into lines and parse markdown
                        for line in msg.text.lines() {
                            lines.push(parse_markdown_line(line));
                        }
                    }
                    Role::Error => {
                        lines.push(Line::from(Span::styled(
                            msg.text.clone(),
                            Style::default().fg(Color::LightRed),
                        )));
                    }
                }
            }
            Entry::Pending(_) => {
                lines.push(Line::from(role_label(Role::Assistant)));
                // Animated ellipsis: cycles through ".", "..", "..."
                let dots = ".".repeat((app.animation_frame as usize) + 1);
                lines.push(Line::from(Span::styled(
                    format!("Thinking{}", dots),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                )));
            }
        }
        lines.push(Line::default());
    }

    Text::from(lines)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    if app.chat_open {
        render_chat(app, frame, body_area);
    } else {
        render_closed(frame, body_area);
    }

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Vibe Assist ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(app.endpoint.clone(), Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_closed(frame: &mut Frame, area: Rect) {
    let placeholder = Paragraph::new("Chat is closed. Press Enter or Ctrl+O to open it.")
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray)));
    frame.render_widget(placeholder, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(3),
        Constraint::Length(3),
    ])
    .areas(area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    // Measure with the same wrapping the pane uses, before picking the offset
    let text = transcript_text(app);
    let wrapped = Paragraph::new(text.clone())
        .wrap(Wrap { trim: true })
        .line_count(app.chat_width);
    app.set_rendered_lines(wrapped);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Support Chat ");

    let chat = Paragraph::new(text)
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, chat_area);

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Message (Enter to send) ");

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = input_area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input.cursor;

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app.input.text
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, input_area);

    let cursor_x = (cursor_pos - scroll_offset) as u16;
    frame.set_cursor_position((
        input_area.x + cursor_x + 1,
        input_area.y + 1,
    ));
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_text = match app.controller.mode() {
        SubmitMode::Concurrent => " CHAT ",
        SubmitMode::Serialized => " CHAT (queued) ",
    };

    let status = match app.controller.outstanding() {
        0 => String::new(),
        n => format!(" {} waiting ", n),
    };

    let footer = Line::from(vec![
        Span::styled(mode_text, Style::default().bg(Color::Blue).fg(Color::White)),
        Span::styled(status, Style::default().fg(Color::Yellow)),
        Span::styled(
            " Enter send | Ctrl+O open/close | PgUp/PgDn scroll | Esc quit ",
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    frame.render_widget(Paragraph::new(footer), area);
}
