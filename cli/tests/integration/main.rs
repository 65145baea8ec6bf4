//! Integration tests for stackcheck CLI
//!
//! These tests spawn the actual binary and test end-to-end behavior.
//! None of them reaches a real engine or cloud provider.
