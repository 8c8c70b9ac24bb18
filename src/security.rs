use subtle::ConstantTimeEq;

/// Compare an API key in constant time to avoid leaking the match length
/// through timing.
pub fn api_key_matches(presented: &str, expected: &str) -> bool {
    if presented.len() != expected.len() {
        return false;
    }
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}
