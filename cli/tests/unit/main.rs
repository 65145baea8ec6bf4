//! Unit tests for stackcheck CLI
//!
//! These tests use mocked dependencies and run fast without external I/O.

mod suite_run_service;
mod terraform_provisioner;
