pub mod time;

/// Generate a unique identifier for exchanges and messages.
pub fn longid() -> String {
    nanoid::nanoid!(21)
}

/// Generate a short identifier, used where ids are shown in logs.
pub fn shortid() -> String {
    nanoid::nanoid!(10)
}
