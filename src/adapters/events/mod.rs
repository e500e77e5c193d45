//! Relay worker adapter.

mod relay;

pub use relay::{
    CycleReport, OutboxRelay, OutboxRelayConfig, RelayHandle, RelayHealth, RelayMetricsSnapshot,
};
