//! Deterministic cache keys for named, parameterised queries.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// A named query and its parameters.
///
/// Parameters are kept sorted by name, so two descriptors built from the
/// same pairs in any order produce the same [`cache_key`](Self::cache_key).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryKey {
    pub name: String,
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

impl QueryKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Add a parameter only when present.
    pub fn param_opt(self, name: impl Into<String>, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(v) => self.param(name, v),
            None => self,
        }
    }

    /// `name:k1:<json v1>|k2:<json v2>` with keys in lexicographic order.
    pub fn cache_key(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|(k, v)| format!("{k}:{v}"))
            .collect::<Vec<_>>()
            .join("|");
        format!("{}:{}", self.name, params)
    }

    /// Parameters rendered as query-string pairs. Strings are sent bare,
    /// everything else as JSON; nulls are skipped.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .filter_map(|(k, v)| match v {
                Value::Null => None,
                Value::String(s) => Some((k.clone(), s.clone())),
                other => Some((k.clone(), other.to_string())),
            })
            .collect()
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_cache_key_format() {
        let key = QueryKey::new("overview").param("month", "current");
        assert_eq!(key.cache_key(), "overview:month:\"current\"");

        let key = QueryKey::new("budget-config");
        assert_eq!(key.cache_key(), "budget-config:");
    }

    #[test]
    fn test_cache_key_sorted() {
        let a = QueryKey::new("user-attribution")
            .param("startDate", "2024-01-01")
            .param("endDate", "2024-01-31")
            .param("limit", 50);
        let b = QueryKey::new("user-attribution")
            .param("limit", 50)
            .param("endDate", "2024-01-31")
            .param("startDate", "2024-01-01");
        assert_eq!(a.cache_key(), b.cache_key());
        assert_eq!(
            a.cache_key(),
            "user-attribution:endDate:\"2024-01-31\"|limit:50|startDate:\"2024-01-01\""
        );
    }

    #[test]
    fn test_query_pairs() {
        let key = QueryKey::new("x")
            .param("month", "2024-01")
            .param("limit", 10)
            .param_opt("sort", None::<&str>)
            .param("skip", Value::Null);
        assert_eq!(
            key.query_pairs(),
            vec![
                ("limit".to_string(), "10".to_string()),
                ("month".to_string(), "2024-01".to_string()),
            ]
        );
    }

    proptest! {
        #[test]
        fn prop_key_independent_of_insertion_order(
            pairs in prop::collection::btree_map("[a-z]{1,6}", any::<i32>(), 0..6)
        ) {
            let forward = pairs
                .iter()
                .fold(QueryKey::new("q"), |k, (n, v)| k.param(n.clone(), *v));
            let backward = pairs
                .iter()
                .rev()
                .fold(QueryKey::new("q"), |k, (n, v)| k.param(n.clone(), *v));
            prop_assert_eq!(forward.cache_key(), backward.cache_key());
        }
    }
}
