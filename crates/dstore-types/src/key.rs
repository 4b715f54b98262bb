use std::fmt;

use serde::{Deserialize, Serialize};

/// Key into the ordered binding namespace.
///
/// Names compare by byte order. [`BindingKey::End`] sorts after every name
/// and stands for "past the last bound name", so a lookup that runs off the
/// end of the namespace still has an entry to take access on.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BindingKey {
    Name(String),
    End,
}

impl BindingKey {
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Key for the result of a "next bound name" lookup.
    pub fn next(next_name: Option<String>) -> Self {
        next_name.map_or(Self::End, Self::Name)
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::End => None,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name:?}"),
            Self::End => f.write_str("<end>"),
        }
    }
}

/// Any key the directory arbitrates access to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallbackKey {
    Object(i64),
    Binding(BindingKey),
}

impl fmt::Display for CallbackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object(oid) => write!(f, "oid:{oid}"),
            Self::Binding(key) => write!(f, "name:{key}"),
        }
    }
}

impl From<BindingKey> for CallbackKey {
    fn from(key: BindingKey) -> Self {
        Self::Binding(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn end_sorts_after_names() {
        let mut keys = vec![
            BindingKey::End,
            BindingKey::name("b"),
            BindingKey::name("a"),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![BindingKey::name("a"), BindingKey::name("b"), BindingKey::End]
        );
    }

    #[test]
    fn next_maps_none_to_end() {
        assert_eq!(BindingKey::next(None), BindingKey::End);
        assert_eq!(BindingKey::next(Some("d".into())), BindingKey::name("d"));
        assert_eq!(BindingKey::End.as_name(), None);
        assert!(BindingKey::End.is_end());
    }

    #[test]
    fn display_forms() {
        assert_eq!(CallbackKey::Object(5).to_string(), "oid:5");
        assert_eq!(
            CallbackKey::from(BindingKey::name("x")).to_string(),
            "name:\"x\""
        );
        assert_eq!(CallbackKey::from(BindingKey::End).to_string(), "name:<end>");
    }

    proptest! {
        #[test]
        fn name_order_matches_byte_order(a in ".*", b in ".*") {
            let ka = BindingKey::name(a.clone());
            let kb = BindingKey::name(b.clone());
            prop_assert_eq!(ka.cmp(&kb), a.as_bytes().cmp(b.as_bytes()));
            prop_assert!(ka < BindingKey::End);
        }
    }
}
