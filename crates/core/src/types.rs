/// All entity identifiers are UUIDv4, minted when the entity is created.
pub type EntityId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Mint a fresh entity id.
pub fn new_id() -> EntityId {
    uuid::Uuid::new_v4()
}
