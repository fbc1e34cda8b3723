//! Live price refresh

mod controller;
mod report;

pub use controller::RefreshController;
pub use report::{RefreshReport, SpanPrice, SpanRefreshStatus};
