//! Random byte generation.

use rand::RngCore;

use pipecrypt_common::{Error, Result};

/// Fill a fresh buffer with `count` cryptographically secure random bytes.
///
/// # Errors
/// - `InvalidArgument` if `count` is zero
pub fn random_bytes(count: usize) -> Result<Vec<u8>> {
    if count == 0 {
        return Err(Error::InvalidArgument(
            "random byte count must be greater than zero".to_string(),
        ));
    }
    let mut bytes = vec![0u8; count];
    rand::rng().fill_bytes(&mut bytes);
    Ok(bytes)
}
