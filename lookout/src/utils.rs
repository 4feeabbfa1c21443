use serde::Serialize;
use std::num::Wrapping;

/// djb2 over the query text. Used as the seed for [progressive_hash](./fn.progressive_hash.html).
pub fn query_hash(query: &str) -> u32 {
    let mut h = Wrapping(5381u32);
    for byte in query.bytes() {
        h = (h << 5) + h + Wrapping(byte as u32);
    }
    h.0
}

/// When we have separate values it's useful to run a progressive
/// version of djb2 where we pretend that we're still looping over
/// the same value
pub fn progressive_hash<V: Serialize>(h: u32, x: &V) -> u64 {
    let x = bincode::serialize(x).unwrap_or_default();

    let mut h = Wrapping(h as u64);

    for byte in x {
        h = (h << 5) + h + Wrapping(byte as u64)
    }

    h.0
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_hash_is_stable() {
        assert_eq!(query_hash(""), 5381);
        assert_eq!(query_hash("a"), 5381 * 33 + 97);
    }

    #[test]
    fn progressive_hash_depends_on_value() {
        let seed = query_hash("subscription { system { cpu } }");
        let a = progressive_hash(seed, &json!({ "interval": 1 }));
        let b = progressive_hash(seed, &json!({ "interval": 2 }));
        assert_ne!(a, b);
        assert_eq!(a, progressive_hash(seed, &json!({ "interval": 1 })));
    }
}
