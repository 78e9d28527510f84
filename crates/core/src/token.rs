//! Session token generation.
//!
//! Tokens are hex-rendered bytes drawn from `rand`'s OS-backed generator.

const TOKEN_BYTES: usize = 16;

/// Generate a fresh lowercase-hex session token.
///
/// Collision avoidance against the live session set is the caller's
/// responsibility (see [`crate::peers::ActivePeerTable`]); this function is
/// the "astronomically unlikely to collide" primitive, not the guarantee.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::Rng::fill(&mut rand::rng(), &mut bytes);
    to_hex(&bytes)
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_lowercase_hex_of_expected_length() {
        let token = generate_token();
        assert_eq!(token.len(), TOKEN_BYTES * 2);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn successive_tokens_differ() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
    }
}
