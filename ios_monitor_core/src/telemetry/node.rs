use serde_json::Value;

use super::ParseFailure;

/// A position in a decoded payload that remembers how it was reached, so
/// failures can name the offending field.
#[derive(Debug, Clone)]
pub(crate) struct Node<'a> {
    value: Option<&'a Value>,
    path: String,
}

impl<'a> Node<'a> {
    pub(crate) fn root(value: &'a Value) -> Self {
        Self {
            value: Some(value),
            path: String::new(),
        }
    }

    pub(crate) fn path(&self) -> &str {
        if self.path.is_empty() {
            "<root>"
        } else {
            &self.path
        }
    }

    pub(crate) fn get(&self, key: &str) -> Self {
        let path = if self.path.is_empty() {
            key.to_owned()
        } else {
            format!("{}.{key}", self.path)
        };
        Self {
            value: self.value.and_then(|v| v.get(key)),
            path,
        }
    }

    /// Follows a dotted path such as `matchData.matchInfo`.
    pub(crate) fn lookup(&self, dotted: &str) -> Self {
        dotted.split('.').fold(self.clone(), |node, key| node.get(key))
    }

    pub(crate) fn index(&self, idx: usize) -> Self {
        Self {
            value: self.value.and_then(|v| v.get(idx)),
            path: format!("{}[{idx}]", self.path),
        }
    }

    /// Present and not null.
    pub(crate) fn exists(&self) -> bool {
        self.value.is_some_and(|v| !v.is_null())
    }

    fn present(&self) -> Option<&'a Value> {
        self.value.filter(|v| !v.is_null())
    }

    fn missing(&self) -> ParseFailure {
        ParseFailure::FieldMissing {
            path: self.path().to_owned(),
        }
    }

    fn mismatch(&self, expected: &'static str) -> ParseFailure {
        ParseFailure::TypeMismatch {
            path: self.path().to_owned(),
            expected,
        }
    }

    pub(crate) fn object(&self) -> Result<Self, ParseFailure> {
        match self.present() {
            None => Err(self.missing()),
            Some(v) if v.is_object() => Ok(self.clone()),
            Some(_) => Err(self.mismatch("object")),
        }
    }

    pub(crate) fn str(&self) -> Result<&'a str, ParseFailure> {
        self.opt_str()?.ok_or_else(|| self.missing())
    }

    pub(crate) fn opt_str(&self) -> Result<Option<&'a str>, ParseFailure> {
        match self.present() {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(self.mismatch("string")),
        }
    }

    /// Identifiers arrive as strings or bare numbers depending on the server.
    pub(crate) fn opt_id(&self) -> Result<Option<String>, ParseFailure> {
        match self.present() {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(_) => Err(self.mismatch("string or number")),
        }
    }

    pub(crate) fn opt_u64(&self) -> Result<Option<u64>, ParseFailure> {
        match self.present() {
            None => Ok(None),
            Some(v) => v
                .as_u64()
                .map(Some)
                .ok_or_else(|| self.mismatch("non-negative integer")),
        }
    }

    pub(crate) fn opt_count(&self) -> Result<Option<u32>, ParseFailure> {
        self.opt_u64()?
            .map(|n| u32::try_from(n).map_err(|_| self.mismatch("32-bit count")))
            .transpose()
    }

    pub(crate) fn count(&self) -> Result<u32, ParseFailure> {
        self.opt_count()?.ok_or_else(|| self.missing())
    }

    /// Elements of an array; a missing array is empty.
    pub(crate) fn items(&self) -> Result<Vec<Self>, ParseFailure> {
        match self.present() {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok((0..items.len()).map(|i| self.index(i)).collect()),
            Some(_) => Err(self.mismatch("array")),
        }
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        self.present()
            .and_then(Value::as_object)
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn paths_are_tracked() {
        let value = json!({"a": {"b": [1, {"c": "x"}]}});
        let root = Node::root(&value);
        let c = root.lookup("a.b").index(1).get("c");
        assert_eq!(c.path(), "a.b[1].c");
        assert_eq!(c.str().ok(), Some("x"));
    }

    #[test]
    fn missing_and_mismatched_fields() {
        let value = json!({"goals": "three", "nothing": null});
        let root = Node::root(&value);

        assert!(matches!(
            root.get("goals").count(),
            Err(ParseFailure::TypeMismatch { ref path, .. }) if path == "goals"
        ));
        assert!(matches!(
            root.get("nothing").str(),
            Err(ParseFailure::FieldMissing { ref path }) if path == "nothing"
        ));
        assert_eq!(root.get("absent").opt_count().ok(), Some(None));
        assert!(root.get("absent").items().is_ok_and(|i| i.is_empty()));
    }

    #[test]
    fn negative_counts_are_rejected() {
        let value = json!({"goals": -1});
        assert!(Node::root(&value).get("goals").count().is_err());
    }
}
