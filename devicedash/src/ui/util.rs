//! Small UI helpers: truncation and the shared scrollbar.

use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
};

use crate::ui::theme::{SB_ARROW, SB_THUMB, SB_TRACK};

/// Shorten `s` to `max` characters, eliding the middle.
pub fn truncate_middle(s: &str, max: usize) -> String {
    let n = s.chars().count();
    if n <= max {
        return s.to_string();
    }
    if max <= 3 {
        return "...".into();
    }
    let keep = max - 3;
    let left = keep / 2;
    let right = keep - left;
    let head: String = s.chars().take(left).collect();
    let tail: String = s.chars().skip(n - right).collect();
    format!("{head}...{tail}")
}

/// Clamp a scroll offset so the last page stays full.
pub fn clamp_offset(offset: usize, total_rows: usize, viewport_rows: usize) -> usize {
    offset.min(total_rows.saturating_sub(viewport_rows))
}

/// Offset that keeps `selected` inside a viewport of `viewport_rows`.
pub fn follow_selection(selected: usize, viewport_rows: usize) -> usize {
    if viewport_rows == 0 {
        return 0;
    }
    selected.saturating_sub(viewport_rows - 1)
}

/// Vertical scrollbar: top arrow, track with thumb, bottom arrow.
pub fn draw_scrollbar(
    f: &mut ratatui::Frame<'_>,
    scroll_area: Rect,
    total_rows: usize,
    viewport_rows: usize,
    offset: usize,
) {
    if scroll_area.height < 3 {
        return;
    }
    let track = (scroll_area.height - 2) as usize;
    let total = total_rows.max(1);
    let view = viewport_rows.clamp(1, total);
    let max_off = total.saturating_sub(view);

    let thumb_len = (track * view).div_ceil(total).max(1).min(track);
    let thumb_top = if max_off == 0 {
        0
    } else {
        ((track - thumb_len) * offset.min(max_off) + max_off / 2) / max_off
    };

    let mut lines: Vec<Line> = Vec::with_capacity(scroll_area.height as usize);
    lines.push(Line::from(Span::styled("▲", Style::default().fg(SB_ARROW))));
    for i in 0..track {
        if i >= thumb_top && i < thumb_top + thumb_len {
            lines.push(Line::from(Span::styled("█", Style::default().fg(SB_THUMB))));
        } else {
            lines.push(Line::from(Span::styled("│", Style::default().fg(SB_TRACK))));
        }
    }
    lines.push(Line::from(Span::styled("▼", Style::default().fg(SB_ARROW))));
    f.render_widget(Paragraph::new(lines), scroll_area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_both_ends() {
        assert_eq!(truncate_middle("short", 10), "short");
        assert_eq!(truncate_middle("edge-gateway-basement", 11), "edge...ment");
        assert_eq!(truncate_middle("ünïcödé-name", 8), "ün...ame");
        assert_eq!(truncate_middle("abcdef", 2), "...");
    }

    #[test]
    fn offsets_follow_selection() {
        assert_eq!(follow_selection(3, 10), 0);
        assert_eq!(follow_selection(12, 10), 3);
        assert_eq!(clamp_offset(50, 20, 10), 10);
        assert_eq!(clamp_offset(2, 5, 10), 0);
    }
}
