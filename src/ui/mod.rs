use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::app::state::{AppState, ComposeFocus, DeletionScope, OverlayState};
use crate::config::ThemeName;
use crate::render::{BoardNotice, CardView};

#[derive(Debug, Clone, Copy)]
struct Palette {
    background: Color,
    text: Color,
    muted: Color,
    accent: Color,
    heart: Color,
    highlight: Color,
}

fn palette(theme: ThemeName) -> Palette {
    match theme {
        ThemeName::Dark => Palette {
            background: Color::Reset,
            text: Color::White,
            muted: Color::Gray,
            accent: Color::Cyan,
            heart: Color::LightRed,
            highlight: Color::Blue,
        },
        ThemeName::Light => Palette {
            background: Color::White,
            text: Color::Black,
            muted: Color::DarkGray,
            accent: Color::Magenta,
            heart: Color::Red,
            highlight: Color::LightBlue,
        },
    }
}

pub fn draw_app(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let colors = palette(state.gallery.theme());
    frame.render_widget(
        Block::default().style(Style::default().bg(colors.background).fg(colors.text)),
        frame.size(),
    );

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(frame.size());

    draw_filter_bar(frame, state, vertical[0], colors);
    draw_cards(frame, state, vertical[1], list_state, colors);

    let status = Paragraph::new(build_status_line(state, colors))
        .style(Style::default().fg(colors.muted))
        .wrap(Wrap { trim: true });
    frame.render_widget(status, vertical[2]);

    render_overlay(frame, state, colors);
}

fn draw_filter_bar(frame: &mut Frame, state: &AppState, area: Rect, colors: Palette) {
    let filters = state.gallery.filters();
    let mut spans = Vec::new();
    for (index, token) in state.filter_tokens().iter().enumerate() {
        let mut style = Style::default().fg(colors.muted);
        if filters.contains(token) {
            style = Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD);
        }
        if index == state.filter_cursor {
            style = style.add_modifier(Modifier::REVERSED);
        }
        spans.push(Span::styled(format!(" {token} "), style));
        spans.push(Span::raw(" "));
    }
    let bar = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .title("Filters (h/l move • Enter toggle • a all)")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(colors.accent)),
    );
    frame.render_widget(bar, area);
}

fn draw_cards(
    frame: &mut Frame,
    state: &AppState,
    area: Rect,
    list_state: &mut ListState,
    colors: Palette,
) {
    let board = state.board();
    let text_width = area.width.saturating_sub(6) as usize;

    let mut items: Vec<ListItem> = board
        .cards()
        .iter()
        .map(|card| card_item(card, text_width, colors))
        .collect();

    match board.notice() {
        Some(BoardNotice::Empty) => items.push(ListItem::new(Span::styled(
            "No messages match the active filters.",
            Style::default().fg(colors.muted),
        ))),
        Some(BoardNotice::Error(message)) => items.push(ListItem::new(Span::styled(
            message.clone(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ))),
        None => {}
    }
    if board.is_loading() {
        items.push(ListItem::new(Span::styled(
            "⟳ Loading more…",
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::ITALIC),
        )));
    } else if board.more_available() {
        items.push(ListItem::new(Span::styled(
            "↓ more below",
            Style::default().fg(colors.muted),
        )));
    }

    let title = format!(
        "Messages ({} shown of {})",
        board.len(),
        state.gallery.filtered().len()
    );
    let list = List::new(items)
        .block(Block::default().title(title).borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .bg(colors.highlight)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    frame.render_stateful_widget(list, area, list_state);
}

fn card_item(card: &CardView, text_width: usize, colors: Palette) -> ListItem<'static> {
    let mut header = Vec::new();
    header.push(Span::styled(
        if card.is_selected { "[x] " } else { "[ ] " },
        Style::default().fg(colors.accent),
    ));
    header.push(Span::styled(
        if card.is_favorite { "♥ " } else { "♡ " },
        Style::default().fg(colors.heart),
    ));
    for category in &card.categories {
        header.push(Span::styled(
            format!("#{category} "),
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::ITALIC),
        ));
    }
    if card.is_custom {
        header.push(Span::styled(
            "(mine)",
            Style::default().fg(colors.muted),
        ));
    }
    let body = Line::from(Span::styled(
        truncate_to_width(&card.text, text_width),
        Style::default().fg(colors.text),
    ));
    ListItem::new(vec![Line::from(header), body, Line::from("")])
}

fn build_status_line(state: &AppState, colors: Palette) -> Text<'static> {
    let selected = state.gallery.tracker().selection().len();
    let mut spans = Vec::new();
    if selected > 0 {
        spans.push(Span::styled(
            format!("{selected} selected"),
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::raw(" • F favorite all • D delete selected • Esc clear"));
    } else {
        spans.push(Span::raw(
            "j/k move • f favorite • Space select • n new • e edit • d delete • t theme • q quit",
        ));
    }
    let mut lines = vec![Line::from(spans)];
    if let Some(message) = &state.status_message {
        lines.push(Line::from(Span::styled(
            message.clone(),
            Style::default().fg(colors.text),
        )));
    }
    Text::from(lines)
}

fn render_overlay(frame: &mut Frame, state: &AppState, colors: Palette) {
    match state.overlay() {
        Some(OverlayState::Compose(compose)) => {
            let area = centered_rect(60, 60, frame.size());
            frame.render_widget(Clear, area);
            let mut text_display = compose.text.clone();
            if compose.focus == ComposeFocus::Text {
                text_display.push('▌');
            }
            let mut lines = vec![
                Line::from(Span::styled(
                    "Message",
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(text_display),
                Line::from(""),
                Line::from(Span::styled(
                    "Categories",
                    Style::default().add_modifier(Modifier::BOLD),
                )),
            ];
            for (index, choice) in compose.choices.iter().enumerate() {
                let mark = if choice.selected { "[x]" } else { "[ ]" };
                let mut style = Style::default();
                if compose.focus == ComposeFocus::Categories && index == compose.highlighted {
                    style = style.add_modifier(Modifier::REVERSED);
                }
                lines.push(Line::from(Span::styled(
                    format!("{mark} {}", choice.name),
                    style,
                )));
            }
            if let Some(error) = &compose.error {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    error.clone(),
                    Style::default().fg(Color::Red),
                )));
            }
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "Tab switch field • Space pick category • Enter save • Esc cancel",
                Style::default().fg(colors.muted),
            )));
            let paragraph = Paragraph::new(lines)
                .block(
                    Block::default()
                        .title("New Message")
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(colors.accent)),
                )
                .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        }
        Some(OverlayState::Edit(edit)) => {
            let area = centered_rect(60, 30, frame.size());
            frame.render_widget(Clear, area);
            let mut text_display = edit.text.clone();
            text_display.push('▌');
            let mut lines = vec![
                Line::from(Span::styled(
                    format!("Message #{}", edit.id),
                    Style::default().fg(colors.muted),
                )),
                Line::from(""),
                Line::from(text_display),
            ];
            if let Some(error) = &edit.error {
                lines.push(Line::from(Span::styled(
                    error.clone(),
                    Style::default().fg(Color::Red),
                )));
            }
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "Enter to save • Esc to cancel",
                Style::default().fg(colors.muted),
            )));
            let paragraph = Paragraph::new(lines)
                .block(
                    Block::default()
                        .title("Edit Message")
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(colors.accent)),
                )
                .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        }
        Some(OverlayState::Delete(delete)) => {
            let area = centered_rect(60, 30, frame.size());
            frame.render_widget(Clear, area);
            let (title, question) = match delete.pending.scope {
                DeletionScope::Single => ("Delete Message", "Delete this message?".to_string()),
                DeletionScope::Bulk => (
                    "Delete Selected",
                    format!("Delete {} custom message(s)?", delete.pending.ids.len()),
                ),
            };
            let paragraph = Paragraph::new(vec![
                Line::from(Span::styled(
                    question,
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(delete.preview.clone()),
                Line::from(""),
                Line::from(Span::styled(
                    "Enter/y to confirm • Esc/n to cancel",
                    Style::default().fg(colors.muted),
                )),
            ])
            .block(
                Block::default()
                    .title(title)
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Red)),
            )
            .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        }
        None => {}
    }
}

/// Cuts `text` to at most `max` display columns, ending in `…` when shortened.
fn truncate_to_width(text: &str, max: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.width() <= max {
        return flat;
    }
    let mut out = String::new();
    let mut used = 0;
    for grapheme in flat.graphemes(true) {
        let width = grapheme.width();
        if used + width + 1 > max {
            break;
        }
        out.push_str(grapheme);
        used += width;
    }
    out.push('…');
    out
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_flattened_not_cut() {
        assert_eq!(truncate_to_width("hola\n  mundo", 40), "hola mundo");
    }

    #[test]
    fn wide_graphemes_count_double() {
        let cut = truncate_to_width("日本語のメッセージ", 7);
        assert_eq!(cut, "日本語…");
        assert!(cut.width() <= 7);
    }

    #[test]
    fn zero_width_budget_yields_ellipsis_only() {
        assert_eq!(truncate_to_width("abc", 0), "…");
    }
}
