//! Ordered URL parameter bindings produced by the router.

/// A single URL parameter, consisting of a key and a value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Param {
    pub key: String,
    pub value: String,
}

/// The parameters matched for one request, in the order they occur in the
/// route pattern.
///
/// Lookups are linear scans since parameter lists are short.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params {
    inner: Vec<Param>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { inner: Vec::with_capacity(capacity) }
    }

    /// Returns the value of the first parameter named `key`.
    #[inline]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.iter().find(|param| param.key == key).map(|param| param.value.as_str())
    }

    /// Like [`Params::get`] but returns an empty string when the key is absent.
    #[inline]
    pub fn by_name(&self, key: &str) -> &str {
        self.get(key).unwrap_or_default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Param> {
        self.inner.iter()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.push(Param { key: key.into(), value: value.into() });
    }

    /// Overwrites the value of an existing key, or appends a new parameter.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        match self.inner.iter_mut().find(|param| param.key == key) {
            Some(param) => param.value = value.into(),
            None => self.push(key, value),
        }
    }

    /// Drops parameters past `len`, keeping the allocation.
    #[inline]
    pub(crate) fn truncate(&mut self, len: usize) {
        self.inner.truncate(len);
    }

    #[inline]
    pub(crate) fn clear(&mut self) {
        self.inner.clear();
    }

    pub(crate) fn reserve(&mut self, additional: usize) {
        self.inner.reserve(additional);
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = &'a Param;
    type IntoIter = std::slice::Iter<'a, Param>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { inner: iter.into_iter().map(|(key, value)| Param { key: key.into(), value: value.into() }).collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_in_order() {
        let params: Params = [("user", "gopher"), ("repo", "gin"), ("user", "shadowed")].into_iter().collect();

        assert_eq!(params.len(), 3);
        assert_eq!(params.get("user"), Some("gopher"));
        assert_eq!(params.by_name("repo"), "gin");
        assert_eq!(params.get("missing"), None);
        assert_eq!(params.by_name("missing"), "");

        let keys: Vec<&str> = params.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, ["user", "repo", "user"]);
    }

    #[test]
    fn test_set_and_truncate() {
        let mut params = Params::with_capacity(4);
        params.push("a", "1");
        params.set("a", "2");
        params.set("b", "3");
        assert_eq!(params.get("a"), Some("2"));
        assert_eq!(params.len(), 2);

        params.truncate(1);
        assert_eq!(params.get("b"), None);
        params.clear();
        assert!(params.is_empty());
    }
}
