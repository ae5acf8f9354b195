// Record id generation.

/// Generate a unique 21-character record id using nanoid.
pub fn generate_id() -> String {
    nanoid::nanoid!()
}
