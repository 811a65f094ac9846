//! UI module root: exposes drawing functions for individual views.

pub mod activity;
pub mod detail;
pub mod devices;
pub mod form;
pub mod header;
pub mod theme;
pub mod util;
