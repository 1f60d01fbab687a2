pub mod advisor;
pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod identity;
pub mod mailer;
pub mod meals;
pub mod orders;
pub mod reminders;
pub mod state;
