//! Static API key set for boolean bearer validation.

use crate::ports::BearerStore;

/// Bearers accepted by the proxy, compared in constant time.
#[derive(Clone, Default)]
pub struct ApiKeySet {
    keys: Vec<String>,
}

impl ApiKeySet {
    pub fn new(keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            keys: keys
                .into_iter()
                .map(Into::into)
                .filter(|k: &String| !k.is_empty())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl std::fmt::Debug for ApiKeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeySet")
            .field("keys", &self.keys.len())
            .finish()
    }
}

impl BearerStore for ApiKeySet {
    fn validate_bearer(&self, bearer: &str) -> bool {
        // Every key is compared so the time taken does not reveal which one matched.
        self.keys
            .iter()
            .fold(false, |found, key| constant_time_compare(bearer, key) | found)
    }
}

/// Constant-time string comparison.
///
/// Runs in time independent of how many leading bytes match.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq;

    let max_len = std::cmp::max(a.len(), b.len());

    // Different pad bytes so unequal lengths never compare equal.
    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];

    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());

    let lengths_equal = a.len().ct_eq(&b.len());
    let contents_equal = a_padded.ct_eq(&b_padded);

    (lengths_equal & contents_equal).into()
}
