/// Stable bot identifier, unique within the registry.
pub type WorkerId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
