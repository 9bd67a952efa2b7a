//! Travel ticket calendar sync.
//!
//! Watches a folder for ticket PDFs, extracts each journey (by pattern and
//! train schedule for structured tickets, by a generative model for the
//! rest) and creates exactly one Google Calendar event per booking.

pub mod alert;
pub mod cache;
pub mod config;
pub mod domain;
pub mod google;
pub mod model;
pub mod retry;
pub mod schedule;
pub mod sync;
pub mod ticket;
pub mod watch;
