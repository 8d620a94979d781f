//! # UI Module
//!
//! UI components for the PitchTap practice application.

pub mod main_display;
