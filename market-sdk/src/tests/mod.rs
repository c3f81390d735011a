//! Crate-level tests for the Market SDK
//!
//! HTTP-level scenarios run against a WireMock server; gate and recorder
//! isolation tests use a mocked `Transport`.

pub mod gate_tests;
pub mod retry_flow_tests;
