//! Tests for individual components through the public API

mod api_test;
mod audit_test;
mod config_test;
