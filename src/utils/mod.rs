pub mod time;

/// Generates a client-side record id.
pub fn longid() -> String {
    nanoid::nanoid!()
}
