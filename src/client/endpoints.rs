//! Endpoint Templates
//!
//! Logical endpoint keys, relative to the client base URL.

/// Dataset metadata.
pub const METADATA: &str = "metadata.json";

/// Index of all users.
pub const USER_INDEX: &str = "users/index.json";

/// Index of all countries.
pub const COUNTRY_INDEX: &str = "countries/index.json";

/// Endpoints fetched at startup.
pub const STARTUP: &[&str] = &[METADATA, USER_INDEX, COUNTRY_INDEX];

/// Per-country document.
pub fn country(code: &str) -> String {
    format!("countries/{}.json", code.trim().to_ascii_lowercase())
}

/// One page of the paginated user listing (pages start at 1).
pub fn user_page(page: u32) -> String {
    format!("users/pages/{}.json", page)
}

/// Sharded per-user document.
///
/// The low byte of the id, as two hex digits, picks a two-level directory
/// so no directory holds more than 1/256 of all users.
pub fn user_path(id: u64) -> String {
    let shard = format!("{:02x}", id % 256);
    let (outer, inner) = shard.split_at(1);
    format!("users/{}/{}/{}.json", outer, inner, id)
}
