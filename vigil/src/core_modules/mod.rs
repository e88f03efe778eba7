pub mod alert_store;
pub mod escalation;
pub mod frame;
pub mod position;
pub mod tracker;
pub mod utils;

/// Wall-clock instant used throughout the engine. Local time, no zone.
pub type Timestamp = chrono::NaiveDateTime;
