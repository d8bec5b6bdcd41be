//! Common type definitions.
//!
//! Entity identifiers are UUIDs wrapped in type aliases. The one exception is
//! the model identifier: models are addressed by the caller-facing string id
//! that requests route on, so `Model::id` is a plain `String` rather than a
//! UUID.

use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type CredentialId = Uuid;
pub type ApiTokenId = Uuid;
pub type UsageEventId = Uuid;
pub type RequestId = Uuid;
pub type BillingSummaryId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbrev_uuid() {
        let uuid = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(abbrev_uuid(&uuid), "550e8400");
    }
}
