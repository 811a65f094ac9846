//! Fleet activity sparklines (online and error counts over time).

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Borders, Sparkline},
};
use std::collections::VecDeque;

use crate::history::ActivityHistory;

pub fn draw_activity(f: &mut ratatui::Frame<'_>, area: Rect, hist: &ActivityHistory) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);
    let (online, errors) = match hist.latest() {
        Some(s) => (s.online_devices, s.error_devices),
        None => (0, 0),
    };
    draw_spark(
        f,
        cols[0],
        &format!("Online now: {online} | peak: {}", hist.peak_online()),
        &hist.online,
        Color::Green,
    );
    draw_spark(f, cols[1], &format!("Errors now: {errors}"), &hist.errors, Color::Red);
}

fn draw_spark(f: &mut ratatui::Frame<'_>, area: Rect, title: &str, hist: &VecDeque<u64>, color: Color) {
    let max_points = area.width.saturating_sub(2) as usize;
    let start = hist.len().saturating_sub(max_points);
    let data: Vec<u64> = hist.iter().skip(start).cloned().collect();

    let spark = Sparkline::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title.to_string()),
        )
        .data(&data)
        .style(Style::default().fg(color));
    f.render_widget(spark, area);
}
