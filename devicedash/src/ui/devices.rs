//! Devices view: stat cards and the paged device table with zebra striping and a scrollbar.

use ratatui::style::Modifier;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
};

use crate::metrics::parse_metadata;
use crate::query::QueryState;
use crate::timefmt::format_relative_now;
use crate::types::{Device, DeviceConnection, DeviceFilter, Stats};
use crate::ui::theme::{status_color, DANGER, HEADER_FG, MUTED, SELECTED_BG, ZEBRA_BG};
use crate::ui::util::{draw_scrollbar, follow_selection, truncate_middle};

// Keep header widths here so drawing and hit-testing match.
const COLS: [Constraint; 5] = [
    Constraint::Percentage(30), // Name
    Constraint::Length(14),     // Type
    Constraint::Length(12),     // Status
    Constraint::Length(8),      // CPU %
    Constraint::Length(12),     // Last seen
];

pub fn draw_stats_cards(f: &mut ratatui::Frame<'_>, area: Rect, stats: Option<&Stats>) {
    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 4); 4])
        .split(area);
    let value = |pick: fn(&Stats) -> u32| stats.map(|s| pick(s).to_string()).unwrap_or_else(|| "-".into());
    let items = [
        ("Total Devices", value(|s| s.total_devices), Color::Cyan),
        ("Online", value(|s| s.online_devices), Color::Green),
        ("Offline", value(|s| s.offline_devices), Color::Gray),
        ("Errors", value(|s| s.error_devices), Color::Red),
    ];
    for (rect, (label, v, color)) in cards.iter().zip(items) {
        let p = Paragraph::new(Line::from(Span::styled(
            v,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )))
        .block(Block::default().borders(Borders::ALL).title(label));
        f.render_widget(p, *rect);
    }
}

pub struct TableView<'a> {
    pub state: &'a QueryState<DeviceConnection>,
    pub selected: usize,
    pub filter: &'a DeviceFilter,
    /// Client-side filter over the loaded page.
    pub search: &'a str,
    pub searching: bool,
    pub pending_delete: Option<&'a str>,
}

pub fn draw_device_table(f: &mut ratatui::Frame<'_>, area: Rect, view: &TableView<'_>) {
    let st = view.state;
    let filter = view
        .filter
        .status
        .map(|s| s.label())
        .unwrap_or("All");
    let kind = view.filter.kind.as_deref().unwrap_or("All");
    let mut title = match st.data.as_ref() {
        Some(c) => format!(
            "Devices ({} total) | status: {filter} | type: {kind} | page {}/{}",
            c.total,
            c.page,
            c.page_count()
        ),
        None => format!("Devices | status: {filter} | type: {kind}"),
    };
    if view.searching {
        title.push_str(&format!(" | search: {}_", view.search));
    } else if !view.search.is_empty() {
        title.push_str(&format!(" | search: {}", view.search));
    }
    if st.loading {
        title.push_str(" | loading...");
    }
    let block = Block::default().borders(Borders::ALL).title(title);
    f.render_widget(block, area);

    // Inner area and content area (reserve 2 columns for scrollbar)
    let inner = Rect {
        x: area.x + 1,
        y: area.y + 1,
        width: area.width.saturating_sub(2),
        height: area.height.saturating_sub(2),
    };
    if inner.height < 1 || inner.width < 3 {
        return;
    }
    let content = Rect {
        x: inner.x,
        y: inner.y,
        width: inner.width.saturating_sub(2),
        height: inner.height,
    };

    // Stale rows stay visible under an error line
    if let Some(err) = st.error.as_ref() {
        f.render_widget(
            Paragraph::new(Span::styled(format!("Error: {err}"), Style::default().fg(DANGER))),
            Rect { height: 1, ..content },
        );
    }
    let Some(conn) = st.data.as_ref() else {
        if st.error.is_none() {
            f.render_widget(Paragraph::new("Loading devices..."), content);
        }
        return;
    };
    let visible: Vec<&Device> = conn
        .devices
        .iter()
        .filter(|d| d.matches_search(view.search))
        .collect();
    if visible.is_empty() {
        let msg = if conn.devices.is_empty() {
            "No devices"
        } else {
            "No devices on this page match the search"
        };
        f.render_widget(
            Paragraph::new(Span::styled(msg, Style::default().fg(MUTED))),
            Rect {
                y: content.y + 1,
                height: 1,
                ..content
            },
        );
        return;
    }

    let table_area = if st.error.is_some() {
        Rect {
            y: content.y + 1,
            height: content.height.saturating_sub(1),
            ..content
        }
    } else {
        content
    };

    // Scrolling keeps the selection visible
    let total_rows = visible.len();
    let viewport_rows = table_area.height.saturating_sub(1) as usize;
    let offset = follow_selection(view.selected, viewport_rows);
    let name_width = (table_area.width as usize * 30 / 100).max(4);

    let rows_iter = visible
        .iter()
        .enumerate()
        .skip(offset)
        .take(viewport_rows)
        .map(|(i, d)| {
            let cpu = parse_metadata(&d.metadata)
                .cpu_percent
                .map(|v| format!("{v:>5.1}"))
                .unwrap_or_else(|| "    -".into());
            let marked = view.pending_delete == Some(d.id.as_str());
            let mut style = if i == view.selected {
                Style::default().bg(SELECTED_BG).add_modifier(Modifier::BOLD)
            } else if i % 2 == 1 {
                Style::default().bg(ZEBRA_BG)
            } else {
                Style::default()
            };
            if marked {
                style = style.fg(DANGER);
            }
            Row::new(vec![
                Cell::from(truncate_middle(&d.name, name_width)),
                Cell::from(d.kind.clone()).style(Style::default().fg(MUTED)),
                Cell::from(d.status.label()).style(Style::default().fg(status_color(d.status))),
                Cell::from(cpu),
                Cell::from(format_relative_now(d.last_seen)),
            ])
            .style(style)
        });

    let header = Row::new(vec!["Name", "Type", "Status", "CPU %", "Last seen"]).style(
        Style::default()
            .fg(HEADER_FG)
            .add_modifier(Modifier::BOLD),
    );

    // Render table inside content area (no borders here; outer block already drawn)
    let table = Table::new(rows_iter, COLS.to_vec())
        .header(header)
        .column_spacing(1);
    f.render_widget(table, table_area);

    let scroll_area = Rect {
        x: inner.x + inner.width.saturating_sub(1),
        y: inner.y,
        width: 1,
        height: inner.height,
    };
    draw_scrollbar(f, scroll_area, total_rows, viewport_rows, offset);
}
