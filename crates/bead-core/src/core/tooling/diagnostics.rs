/// Stable codes carried by [`ResultsCacheError`](crate::ResultsCacheError).
/// The hundreds digit groups them: 1 environment, 2 identifiers, 3 I/O,
/// 4 corruption, 5 access.
pub mod results {
    pub const DIRECTORY_UNAVAILABLE: &str = "BRC101";
    pub const INVALID_ID: &str = "BRC201";
    pub const ID_IN_USE: &str = "BRC202";
    pub const ID_MISMATCH: &str = "BRC203";
    pub const WRITE_FAILED: &str = "BRC301";
    pub const READ_FAILED: &str = "BRC302";
    pub const NOT_FOUND: &str = "BRC303";
    pub const CURSOR_FAILED: &str = "BRC304";
    pub const CORRUPT_CHUNK: &str = "BRC401";
    pub const CORRUPT_METADATA: &str = "BRC402";
    pub const OUT_OF_RANGE: &str = "BRC501";
    pub const READ_ONLY: &str = "BRC502";
    pub const INVALID_CHUNK_SIZE: &str = "BRC503";
}
