//! UI modules for the TUI.

pub mod activity;
pub mod header;
pub mod overlays;
pub mod tables;
pub mod theme;
pub mod widgets;
