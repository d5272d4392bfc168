//! Price-drop tracking bot.
//!
//! [`service::PriceWatch`] turns chat commands into tracking-store
//! mutations and keeps [`scheduler::JobScheduler`] in step with them: a
//! subscriber has a repeating price-check job exactly while it tracks at
//! least one product. Each job tick runs [`worker::PriceCheckWorker`].

pub mod commands;
pub mod console;
pub mod error;
pub mod messages;
pub mod notify;
pub mod scheduler;
pub mod service;
pub mod worker;

pub use commands::Command;
pub use error::{CommandError, NotifyError};
pub use notify::{ConsoleNotifier, FanoutNotifier, Notifier, RecordingNotifier, WebhookNotifier};
pub use scheduler::{job_name, JobScheduler, TickHandler, MAX_JOB_DELAY};
pub use service::PriceWatch;
pub use worker::{PriceCheckWorker, TickReport};
