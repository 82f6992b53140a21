// Copyright 2024 Wladimir Palant
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Deserialization helpers shared by the matcher configuration schema.

use serde::de::value::{MapAccessDeserializer, StrDeserializer, StringDeserializer};
use serde::de::{Deserialize, DeserializeSeed, Deserializer, Error, SeqAccess, Visitor};
use std::fmt::Debug;
use std::ops::{Deref, DerefMut};

/// A wrapper around the `Vec` type allowing more comfortable deserialization.
///
/// If a list is encountered in the configuration file, it is deserialized into `Vec` directly.
/// String or map values are deserialized as a `Vec` instance with one element instead. This is
/// how `MatchHost`/`MatchPath` patterns and similar single-or-many configuration fields are meant
/// to be written: either `host: example.com` or `host: [example.com, example.net]`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct OneOrMany<T> {
    inner: Vec<T>,
}

impl<T> OneOrMany<T> {
    /// Unwraps the inner `Vec` type
    pub fn into_inner(self) -> Vec<T> {
        self.inner
    }
}

impl<T> Debug for OneOrMany<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}

// Deriving `Default` would unnecessarily require `T` to implement `Default`
impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self {
            inner: Default::default(),
        }
    }
}

impl<T> Deref for OneOrMany<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> DerefMut for OneOrMany<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(value: Vec<T>) -> Self {
        Self { inner: value }
    }
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        value.inner
    }
}

impl<'a, T> IntoIterator for &'a OneOrMany<T> {
    type Item = <&'a Vec<T> as IntoIterator>::Item;
    type IntoIter = <&'a Vec<T> as IntoIterator>::IntoIter;
    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

impl<T> IntoIterator for OneOrMany<T> {
    type Item = <Vec<T> as IntoIterator>::Item;
    type IntoIter = <Vec<T> as IntoIterator>::IntoIter;
    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

impl<'de, T: Deserialize<'de>> DeserializeSeed<'de> for OneOrMany<T> {
    type Value = Self;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ListVisitor<T> {
            seed: OneOrMany<T>,
        }
        impl<'de, T: Deserialize<'de>> Visitor<'de> for ListVisitor<T> {
            type Value = OneOrMany<T>;

            fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                formatter.write_str("T or Vec<T>")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut list = self.seed;
                while let Some(entry) = seq.next_element()? {
                    list.push(entry);
                }
                Ok(list)
            }

            fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
            where
                E: Error,
            {
                let mut list = self.seed;
                list.push(T::deserialize(StringDeserializer::new(v))?);
                Ok(list)
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: Error,
            {
                let mut list = self.seed;
                list.push(T::deserialize(StrDeserializer::new(v))?);
                Ok(list)
            }

            fn visit_borrowed_str<E>(self, v: &'de str) -> Result<Self::Value, E>
            where
                E: Error,
            {
                let mut list = self.seed;
                list.push(T::deserialize(StrDeserializer::new(v))?);
                Ok(list)
            }

            fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let mut list = self.seed;
                list.push(T::deserialize(MapAccessDeserializer::new(map))?);
                Ok(list)
            }
        }

        deserializer.deserialize_any(ListVisitor { seed: self })
    }
}

impl<'de, T> Deserialize<'de> for OneOrMany<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seed = OneOrMany::default();
        seed.deserialize(deserializer)
    }
}

#[cfg(test)]
mod tests {
    use super::OneOrMany;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize)]
    struct Conf {
        value: OneOrMany<String>,
    }

    #[test]
    fn one_or_many_single_string() {
        let conf: Conf = serde_yaml::from_str("value: hi\n").unwrap();
        assert_eq!(&*conf.value, &["hi".to_owned()]);
    }

    #[test]
    fn one_or_many_list() {
        let conf: Conf = serde_yaml::from_str("value: [hi, there]\n").unwrap();
        assert_eq!(&*conf.value, &["hi".to_owned(), "there".to_owned()]);
    }

    #[derive(Debug, Default, Deserialize, PartialEq, Eq)]
    struct InnerConf {
        value: usize,
    }

    #[derive(Debug, Default, Deserialize)]
    struct MapConf {
        value: OneOrMany<InnerConf>,
    }

    #[test]
    fn one_or_many_single_map() {
        let conf: MapConf = serde_yaml::from_str("value:\n  value: 1\n").unwrap();
        assert_eq!(&*conf.value, &[InnerConf { value: 1 }]);
    }
}
