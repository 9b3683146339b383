use data_encoding::BASE32_NOPAD;
use rand::RngCore;
use rand::rngs::OsRng;

/// The number of random bytes behind a session ID.
pub const SESSION_ID_ENTROPY: usize = 32;

/// Generates a new random session ID.
///
/// # Returns
///
/// 32 bytes from the OS RNG, base-32 encoded without padding (52 characters,
/// safe for URLs and store keys).
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_ENTROPY];
    OsRng.fill_bytes(&mut bytes);

    BASE32_NOPAD.encode(&bytes)
}
