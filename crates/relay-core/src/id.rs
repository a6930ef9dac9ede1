use uuid::Uuid;

/// Length of every identifier produced by [`new_id`].
pub const ID_LENGTH: usize = 32;

/// Generate a fresh opaque identifier.
#[must_use]
pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}
