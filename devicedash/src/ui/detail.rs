//! Device detail: identity header, metric cards and the raw metadata list.

use chrono::{Local, TimeZone};
use ratatui::style::Modifier;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
};

use crate::metrics::{parse_metadata, DeviceMetrics, MetricField};
use crate::query::QueryState;
use crate::timefmt::format_relative_now;
use crate::types::Device;
use crate::ui::theme::{status_color, DANGER, HEADER_FG, MUTED};

const CARD_HEIGHT: u16 = 3;
const CARDS_PER_ROW: usize = 4;

pub fn draw_device_detail(
    f: &mut ratatui::Frame<'_>,
    area: Rect,
    st: &QueryState<Option<Device>>,
    delete_armed: bool,
) {
    let device = match (&st.data, &st.error) {
        (Some(Some(d)), _) => d,
        (_, Some(err)) => {
            let p = Paragraph::new(Span::styled(format!("Error: {err}"), Style::default().fg(DANGER)))
                .block(Block::default().borders(Borders::ALL).title("Device"));
            f.render_widget(p, area);
            return;
        }
        (Some(None), None) => {
            let p = Paragraph::new("Device not found")
                .block(Block::default().borders(Borders::ALL).title("Device"));
            f.render_widget(p, area);
            return;
        }
        (None, None) => {
            let p = Paragraph::new("Loading device...")
                .block(Block::default().borders(Borders::ALL).title("Device"));
            f.render_widget(p, area);
            return;
        }
    };

    let metrics = parse_metadata(&device.metadata);
    let n_cards = metrics.present().count();
    let card_rows = n_cards.div_ceil(CARDS_PER_ROW).max(1) as u16;

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),                       // identity
            Constraint::Length(card_rows * CARD_HEIGHT + 2), // metrics
            Constraint::Min(3),                          // metadata
        ])
        .split(area);

    draw_identity(f, rows[0], device, st.loading, delete_armed);
    draw_metric_cards(f, rows[1], &metrics);
    draw_metadata(f, rows[2], device);
}

fn draw_identity(f: &mut ratatui::Frame<'_>, area: Rect, d: &Device, loading: bool, delete_armed: bool) {
    let created = Local
        .timestamp_opt(d.created_at, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".into());
    let lines = vec![
        Line::from(vec![
            Span::styled("Status: ", Style::default().fg(MUTED)),
            Span::styled(
                d.status.label(),
                Style::default()
                    .fg(status_color(d.status))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("   Type: ", Style::default().fg(MUTED)),
            Span::raw(d.kind.clone()),
        ]),
        Line::from(vec![
            Span::styled("Last seen: ", Style::default().fg(MUTED)),
            Span::raw(format_relative_now(d.last_seen)),
            Span::styled("   Created: ", Style::default().fg(MUTED)),
            Span::raw(created),
        ]),
        Line::from(Span::styled(
            format!("ID: {}", d.id),
            Style::default().fg(MUTED),
        )),
    ];
    let mut title = d.name.clone();
    if loading {
        title.push_str(" (refreshing)");
    }
    let mut block = Block::default().borders(Borders::ALL).title(title);
    if delete_armed {
        block = block
            .title("press d again to delete")
            .border_style(Style::default().fg(DANGER));
    }
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_metric_cards(f: &mut ratatui::Frame<'_>, area: Rect, m: &DeviceMetrics) {
    let block = Block::default().borders(Borders::ALL).title("Metrics");
    let inner = block.inner(area);
    f.render_widget(block, area);
    if m.is_empty() {
        f.render_widget(
            Paragraph::new(Span::styled("No metrics reported", Style::default().fg(MUTED))),
            inner,
        );
        return;
    }

    let present: Vec<(MetricField, f64)> = m.present().collect();
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            present
                .chunks(CARDS_PER_ROW)
                .map(|_| Constraint::Length(CARD_HEIGHT)),
        )
        .split(inner);
    for (row_area, chunk) in rows.iter().zip(present.chunks(CARDS_PER_ROW)) {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, CARDS_PER_ROW as u32); CARDS_PER_ROW])
            .split(*row_area);
        for (card, (field, v)) in cols.iter().zip(chunk) {
            draw_metric_card(f, *card, *field, *v);
        }
    }
}

fn draw_metric_card(f: &mut ratatui::Frame<'_>, area: Rect, field: MetricField, v: f64) {
    let label = format!("{} {}", field.format_value(v), field.unit());
    let block = Block::default().borders(Borders::ALL).title(field.label());
    // Percentages read better as gauges
    if field.unit() == "%" {
        let pct = v.clamp(0.0, 100.0) as u16;
        let color = match (field, pct) {
            (MetricField::BatteryLevel, p) if p < 20 => Color::Red,
            (MetricField::BatteryLevel, _) => Color::Green,
            (_, p) if p < 60 => Color::Green,
            (_, p) if p < 85 => Color::Yellow,
            _ => Color::Red,
        };
        let g = Gauge::default()
            .block(block)
            .gauge_style(Style::default().fg(color))
            .percent(pct)
            .label(label);
        f.render_widget(g, area);
    } else {
        let p = Paragraph::new(Span::styled(
            label,
            Style::default().fg(HEADER_FG).add_modifier(Modifier::BOLD),
        ))
        .block(block);
        f.render_widget(p, area);
    }
}

fn draw_metadata(f: &mut ratatui::Frame<'_>, area: Rect, d: &Device) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Metadata ({})", d.metadata.len()));
    if d.metadata.is_empty() {
        f.render_widget(
            Paragraph::new(Span::styled("No metadata", Style::default().fg(MUTED))).block(block),
            area,
        );
        return;
    }
    let key_width = d
        .metadata
        .iter()
        .map(|m| m.key.chars().count())
        .max()
        .unwrap_or(0);
    let lines: Vec<Line> = d
        .metadata
        .iter()
        .map(|m| {
            Line::from(vec![
                Span::styled(format!("{:<key_width$}  ", m.key), Style::default().fg(MUTED)),
                Span::raw(m.value.clone()),
            ])
        })
        .collect();
    f.render_widget(Paragraph::new(lines).block(block), area);
}
