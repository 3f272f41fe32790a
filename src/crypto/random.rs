use rand::rngs::OsRng;
use rand::RngCore;

/// 256 bits of OS randomness, URL-safe base64 without padding.
pub fn opaque_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    base64_simd::URL_SAFE_NO_PAD.encode_to_string(&bytes)
}
