//! Centered form box used by the sign-in and add-device views.

use ratatui::style::Modifier;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::forms::Form;
use crate::ui::theme::{DANGER, HEADER_FG, MUTED};

const FORM_WIDTH: u16 = 60;

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect {
        x: area.x + (area.width - w) / 2,
        y: area.y + (area.height - h) / 2,
        width: w,
        height: h,
    }
}

pub fn draw_form(f: &mut ratatui::Frame<'_>, area: Rect, title: &str, form: &Form) {
    // two lines per field, plus status line and borders
    let height = form.fields.len() as u16 * 2 + 4;
    let rect = centered(area, FORM_WIDTH, height);
    f.render_widget(Clear, rect);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title.to_string())
        .border_style(Style::default().fg(HEADER_FG));
    let inner = block.inner(rect);
    f.render_widget(block, rect);

    let mut constraints: Vec<Constraint> = form.fields.iter().map(|_| Constraint::Length(2)).collect();
    constraints.push(Constraint::Min(1));
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(inner);

    for (i, (field, row)) in form.fields.iter().zip(rows.iter()).enumerate() {
        let focused = i == form.focus;
        let label_style = if focused {
            Style::default().fg(HEADER_FG).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(MUTED)
        };
        let cursor = if focused && !form.submitting { "▏" } else { "" };
        let lines = vec![
            Line::from(Span::styled(field.label, label_style)),
            Line::from(vec![
                Span::raw(format!("> {}", field.display())),
                Span::styled(cursor, Style::default().fg(Color::White)),
            ]),
        ];
        f.render_widget(Paragraph::new(lines), *row);
    }

    let status = if form.submitting {
        Span::styled("Submitting...", Style::default().fg(Color::Yellow))
    } else if let Some(err) = form.error.as_deref() {
        Span::styled(err.to_string(), Style::default().fg(DANGER))
    } else {
        Span::raw("")
    };
    if let Some(last) = rows.last() {
        f.render_widget(Paragraph::new(Line::from(status)), *last);
    }
}
