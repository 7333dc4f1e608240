use chrono::Utc;
use rand::Rng;

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Random suffix length; 10 base-36 characters is ~51 bits.
const SUFFIX_LEN: usize = 10;

/// New analysis id: base-36 millisecond timestamp, a dash, and a random
/// base-36 suffix. Not checked against the store.
pub fn new_analysis_id() -> String {
    let millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{}-{}", to_base36(millis), suffix)
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

/// Whether a path segment could be an id minted by [`new_analysis_id`].
pub fn is_well_formed(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1_700_000_000_000), "loyw3v28");
    }

    #[test]
    fn test_id_shape() {
        let id = new_analysis_id();
        let (prefix, suffix) = id.split_once('-').unwrap();
        assert!(!prefix.is_empty());
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(is_well_formed(&id));
    }

    #[test]
    fn test_ids_do_not_collide() {
        let ids: HashSet<String> = (0..10_000).map(|_| new_analysis_id()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_rejects_odd_segments() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("../etc"));
        assert!(!is_well_formed("ABC"));
    }
}
