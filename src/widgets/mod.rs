//! UI Widgets
//!
//! The viewport is the only widget; it reports changes via EventBus

pub mod viewport;
