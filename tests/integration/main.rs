//! Integration test suite.

mod http_client;
mod polling;
mod scenarios;
