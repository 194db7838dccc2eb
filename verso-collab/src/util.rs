use chrono::Utc;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use uuid::Uuid;

pub fn random_string(length: usize) -> String {
    let mut rng = thread_rng();

    std::iter::repeat(())
        .map(|_| rng.sample(Alphanumeric) as char)
        .take(length)
        .collect()
}

/// Creates a new entity id. Ids are client-generated, random, and stable
/// across edits, so writes can always be upserts keyed by id.
pub fn new_entity_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current time as unix milliseconds, the timestamp unit used by documents.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_random_string_length() {
        assert_eq!(random_string(32).len(), 32);
        assert_ne!(random_string(32), random_string(32));
    }

    #[test]
    fn test_entity_ids_are_unique() {
        assert_ne!(new_entity_id(), new_entity_id());
    }
}
