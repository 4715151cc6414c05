//! Query-string parameters of a `MapFish` request.

use bytes::Bytes;

/// Ordered query-string multimap. Lookups return the last value of a key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    /// Decode an `application/x-www-form-urlencoded` query string.
    ///
    /// # Errors
    /// Returns the decoder's error for malformed percent-encoding.
    pub fn parse(query: &str) -> Result<Self, serde_urlencoded::de::Error> {
        serde_urlencoded::from_str::<Vec<(String, String)>>(query).map(Self)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    /// Distinct keys in first-seen order, each with its last value.
    pub fn latest(&self) -> impl Iterator<Item = (&str, &str)> {
        let mut seen = Vec::<&str>::new();
        self.0.iter().filter_map(move |(k, _)| {
            if seen.contains(&k.as_str()) {
                return None;
            }
            seen.push(k.as_str());
            self.get(k).map(|v| (k.as_str(), v))
        })
    }

    /// Comma-separated list value, e.g. `attrs=a,b`.
    #[must_use]
    pub fn list(&self, key: &str) -> Option<Vec<&str>> {
        self.get(key).map(|v| v.split(',').collect())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Query-string truthiness: everything but `false` and `0` (any case).
#[must_use]
pub fn asbool(value: &str) -> bool {
    !(value.eq_ignore_ascii_case("false") || value == "0")
}

/// A request as seen by the protocol: decoded parameters and the raw body.
#[derive(Clone, Debug, Default)]
pub struct MapfishRequest {
    pub params: Params,
    pub body: Bytes,
}

impl MapfishRequest {
    #[must_use]
    pub fn new(params: Params, body: Bytes) -> Self {
        Self { params, body }
    }

    #[must_use]
    pub fn with_params(params: Params) -> Self {
        Self {
            params,
            body: Bytes::new(),
        }
    }
}
