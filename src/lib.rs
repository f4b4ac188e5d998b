#![warn(clippy::pedantic, clippy::nursery, clippy::cargo)]
#![deny(clippy::use_self, rust_2018_idioms)]
#![allow(clippy::multiple_crate_versions, clippy::module_name_repetitions)]

//! Alarm delivery for a habit tracker.
//!
//! Requests flow one way: the UI asks the [`scheduler::Scheduler`] for a wake
//! at some time, the host fires it into the [`trigger::TriggerHandler`], and
//! alarm-kind wakes ring in the [`session::AlarmSession`] until the UI sends
//! a stop. Reminder-kind wakes only post a notification.

pub mod alarm;
pub mod bridge;
pub mod communication;
pub mod config;
pub mod daemon;
pub mod desktop;
pub mod error;
pub mod notification;
pub mod platform;
pub mod scheduler;
pub mod server;
pub mod session;
pub mod store;
pub mod trigger;

pub use error::{Error, Result};
