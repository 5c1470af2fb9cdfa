//! Core plumbing shared by widgets and the app shell

pub mod event_bus;
