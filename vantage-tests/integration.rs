//! Integration tests for Vantage
//!
//! These tests verify the integration between different components of the
//! substrate: worker pool lifecycle under load, and the configuration-then-
//! dispatch flow of the packet registry as driven by a connection layer.

#[path = "integration/pool_lifecycle.rs"]
mod pool_lifecycle;

#[path = "integration/packet_dispatch.rs"]
mod packet_dispatch;
