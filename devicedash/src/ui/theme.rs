//! Shared UI theme constants.

use ratatui::style::Color;

use crate::types::DeviceStatus;

// Scrollbar colors
pub const SB_ARROW: Color = Color::Rgb(170, 170, 180);
pub const SB_TRACK: Color = Color::Rgb(170, 170, 180);
pub const SB_THUMB: Color = Color::Rgb(170, 170, 180);

pub const HEADER_FG: Color = Color::Cyan;
pub const ZEBRA_BG: Color = Color::Rgb(30, 30, 36);
pub const SELECTED_BG: Color = Color::Rgb(60, 60, 90);
pub const DANGER: Color = Color::Red;
pub const MUTED: Color = Color::DarkGray;

pub fn status_color(status: DeviceStatus) -> Color {
    match status {
        DeviceStatus::Online => Color::Green,
        DeviceStatus::Offline => Color::Gray,
        DeviceStatus::Error => Color::Red,
        DeviceStatus::Maintenance => Color::Yellow,
        DeviceStatus::Unknown => Color::DarkGray,
    }
}
