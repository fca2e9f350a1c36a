//! Testing utilities for plugin and host developers
//!
//! This module provides an instrumented plugin to make lifecycle testing easier.

pub mod mocks;

pub use mocks::{CallLog, MockPlugin};
