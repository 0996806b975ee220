use std::{hash::Hash, marker::PhantomData, ops::Deref};

use indexmap::IndexMap;
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{SeqAccess, Visitor},
    ser::SerializeSeq,
};

/// A new-type around an `IndexMap` that keeps insertion order and serializes as a sequence.
///
/// Each entry is written as a `(key, value)` tuple, so keys do not need to be strings, and
/// deserialization rebuilds the map in the order the tuples appear. It is built with
/// `collect` and read through `Deref`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerdeVecMap<K: Eq + Hash, V>(IndexMap<K, V>);

impl<K: Eq + Hash, V> FromIterator<(K, V)> for SerdeVecMap<K, V> {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<K: Eq + Hash, V> Deref for SerdeVecMap<K, V> {
    type Target = IndexMap<K, V>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<K, V> Serialize for SerdeVecMap<K, V>
where
    K: Eq + Hash + Serialize,
    V: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for ele in self.iter() {
            seq.serialize_element(&ele)?;
        }
        seq.end()
    }
}

impl<'de, K, V> Deserialize<'de> for SerdeVecMap<K, V>
where
    K: Eq + Hash + Deserialize<'de>,
    V: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = deserializer.deserialize_seq(PairVisitor::new())?;
        Ok(v.into_iter().collect())
    }
}

type Output<K, V> = fn() -> Vec<(K, V)>;

struct PairVisitor<K, V> {
    marker: PhantomData<Output<K, V>>,
}

impl<K, V> PairVisitor<K, V> {
    fn new() -> Self {
        Self {
            marker: PhantomData,
        }
    }
}

impl<'de, K, V> Visitor<'de> for PairVisitor<K, V>
where
    K: Deserialize<'de>,
    V: Deserialize<'de>,
{
    type Value = Vec<(K, V)>;

    fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("a sequence of key value pairs")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut v = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(ele) = seq.next_element()? {
            v.push(ele);
        }
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::SerdeVecMap;

    #[test]
    fn serde_vec_map_keeps_insertion_order() {
        let map: SerdeVecMap<u32, &str> = [(2, "baz"), (0, "foo"), (1, "bar")]
            .into_iter()
            .collect();
        let s = serde_json::to_string(&map).unwrap();
        assert_eq!(r#"[[2,"baz"],[0,"foo"],[1,"bar"]]"#, s);
        let d: SerdeVecMap<u32, &str> = serde_json::from_str(&s).unwrap();
        assert_eq!(d, map);
        assert_eq!(vec![2, 0, 1], d.keys().copied().collect::<Vec<_>>());
    }
}
