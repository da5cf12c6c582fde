//! OHDMON-RS: Fleet monitoring for satellite receiver clients
//!
//! This crate collects heartbeat telemetry from receiver clients over a
//! bit-packed upload format, persists the datapoints, and classifies each
//! client's health per satellite to drive operational alerts.

pub mod codec;
pub mod collector;
pub mod common;
pub mod config;
pub mod emulator;
pub mod reporting;
pub mod satdata;
pub mod storage;
