use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt::{self, Write};

/// A bracketed form field name, such as `message_batch[0][specific_to_list][1]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Field(String);

impl Field {
    pub(crate) fn new(root: &str) -> Field {
        Field(root.to_owned())
    }

    #[must_use]
    pub(crate) fn key(mut self, key: &str) -> Field {
        let _ = write!(self.0, "[{key}]");
        self
    }

    #[must_use]
    pub(crate) fn index(mut self, index: usize) -> Field {
        let _ = write!(self.0, "[{index}]");
        self
    }

    /// Returns true if `self` is `other` or names something nested below it.
    pub(crate) fn is_within(&self, other: &Field) -> bool {
        self.0 == other.0
            || (self.0.starts_with(&other.0) && self.0[other.0.len()..].starts_with('['))
    }
}

impl From<&str> for Field {
    fn from(root: &str) -> Field {
        Field::new(root)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Field `key` of the first (and only) entry of the message batch.
pub(crate) fn batch(key: &str) -> Field {
    Field::new("message_batch").index(0).key(key)
}

/// An ordered set of form field assignments. Setting a field that is already present replaces
/// its value in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct FormFields {
    fields: Vec<(String, String)>,
}

impl FormFields {
    pub(crate) fn new() -> FormFields {
        FormFields::default()
    }

    pub(crate) fn set(&mut self, field: impl Into<Field>, value: impl ToString) -> &mut FormFields {
        let name = field.into().0;
        let value = value.to_string();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = value,
            None => self.fields.push((name, value)),
        }
        self
    }

    /// Sets `field[0]`, `field[1]`, ... to each of `values`.
    pub(crate) fn set_list<I>(&mut self, field: &Field, values: I) -> &mut FormFields
    where
        I: IntoIterator,
        I::Item: ToString,
    {
        for (i, value) in values.into_iter().enumerate() {
            self.set(field.clone().index(i), value);
        }
        self
    }

    /// Flattens a JSON value into bracketed fields below `field`. Objects nest by key, arrays by
    /// index, and `null` becomes an empty value.
    pub(crate) fn set_json(&mut self, field: Field, value: &Value) -> &mut FormFields {
        match value {
            Value::Object(map) => {
                for (key, value) in map {
                    self.set_json(field.clone().key(key), value);
                }
            }
            Value::Array(values) => {
                for (i, value) in values.iter().enumerate() {
                    self.set_json(field.clone().index(i), value);
                }
            }
            Value::String(s) => {
                self.set(field, s);
            }
            Value::Null => {
                self.set(field, "");
            }
            Value::Bool(_) | Value::Number(_) => {
                self.set(field, value);
            }
        }
        self
    }

    /// Copies every field of `other` into `self`, replacing duplicates.
    pub(crate) fn merge(&mut self, other: FormFields) -> &mut FormFields {
        for (name, value) in other.fields {
            self.set(name.as_str(), value);
        }
        self
    }

    pub(crate) fn get(&self, field: impl Into<Field>) -> Option<&str> {
        let name = field.into().0;
        self.fields
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if any field is `field` or nested below it.
    pub(crate) fn contains(&self, field: impl Into<Field>) -> bool {
        let field = field.into();
        self.fields
            .iter()
            .any(|(n, _)| Field(n.clone()).is_within(&field))
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl Serialize for FormFields {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.fields.serialize(serializer)
    }
}
