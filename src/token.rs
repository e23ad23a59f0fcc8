use rand::RngCore;

/// Number of random bytes behind each session token. 32 bytes keeps tokens
/// well outside guessing range; the hex form is 64 characters.
const TOKEN_BYTES: usize = 32;

/// Generate a fresh opaque session token. Tokens carry no structure at all;
/// validity is decided purely by matching the value stored for a user.
pub fn generate() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn tokens_are_64_hex_chars() {
        let token = generate();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tokens_do_not_repeat() {
        let tokens: HashSet<String> = (0..1000).map(|_| generate()).collect();
        assert_eq!(tokens.len(), 1000);
    }
}
