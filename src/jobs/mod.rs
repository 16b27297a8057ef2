//! Background jobs processed by the `jobs work` worker.

mod email_job;

pub use email_job::{email_job_handler, EmailJob, EmailQueue, PgEmailQueue};

#[cfg(any(test, feature = "test-utils"))]
pub use email_job::MockEmailQueue;
