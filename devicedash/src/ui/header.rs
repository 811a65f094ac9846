//! Top header (endpoint, user, live indicator) and bottom key-hint/notice line.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::types::User;
use crate::ui::theme::MUTED;

pub struct HeaderInfo<'a> {
    pub api_url: &'a str,
    pub user: Option<&'a User>,
    pub live: bool,
    pub signed_in: bool,
}

pub fn draw_header(f: &mut ratatui::Frame<'_>, area: Rect, info: &HeaderInfo<'_>) {
    let who = match (info.signed_in, info.user) {
        (true, Some(u)) => format!("{} ({})", u.email, u.role),
        (true, None) => "signed in".into(),
        (false, _) => "signed out".into(),
    };
    let live = if info.live { "● live" } else { "○ polling" };
    let title = format!("devicedash | {} | {who} | {live}", info.api_url);
    f.render_widget(Block::default().title(title).borders(Borders::BOTTOM), area);
}

pub fn draw_footer(f: &mut ratatui::Frame<'_>, area: Rect, hint: &str, notice: Option<&str>) {
    let mut spans = vec![Span::styled(hint.to_string(), Style::default().fg(MUTED))];
    if let Some(n) = notice {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(n.to_string(), Style::default().fg(Color::Yellow)));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}
