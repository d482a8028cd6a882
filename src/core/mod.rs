/// Ultralight 2.0 payload encoding of attribute sets.
pub mod encoder;

/// One-shot delivery of encoded payloads to the MQTT broker.
pub mod publisher;

/// Create-or-update of config groups and devices on the IoT Agent.
pub mod reconciler;

/// Collect, encode and publish, once per tick.
pub mod runner;

/// Cron-driven tick loop with overlap guard and tick limit.
pub mod scheduler;

/// Attribute sources polled by the runner.
pub mod sources;
