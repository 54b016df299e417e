//! Core engine: round tracking, bet bookkeeping and the poll-driven
//! reconciliation loop.

pub mod tracker;
pub mod ledger;
pub mod notifications;
pub mod controller;
pub mod poller;

pub use controller::Controller;
pub use poller::PollLoop;
