use crate::entity::EntityDescriptor;
use crate::error::DataError;
use crate::query::{Dialect, QueryBuilder};
use crate::value::Value;

/// Ordered field name -> value equality constraints.
///
/// Inserting a field that is already present replaces its value in place.
///
/// ```ignore
/// let filter = PredicateMap::new().with("status", "active").with("age", 30);
/// let users: Vec<User> = factory.find_list_by_predicates(&filter).await?;
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredicateMap {
    entries: Vec<(String, Value)>,
}

impl PredicateMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// Returns the previous value of `field`, if any.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let field = field.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(f, _)| *f == field) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((field, value));
                None
            }
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.entries.iter().find(|(f, _)| f == field).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(f, v)| (f.as_str(), v))
    }

    /// Build a map from a JSON object.
    pub fn from_json(json: serde_json::Value) -> Result<Self, DataError> {
        match json {
            serde_json::Value::Object(object) => Ok(object.into_iter().collect()),
            other => Err(DataError::configuration(format!(
                "predicates must be a JSON object, got `{other}`"
            ))),
        }
    }

    /// Resolve every field against `descriptor` and build the conjunction.
    pub fn to_query(
        &self,
        descriptor: &EntityDescriptor,
        dialect: Dialect,
    ) -> Result<QueryBuilder, DataError> {
        let mut builder = QueryBuilder::new(descriptor.table(), dialect);
        for (field, value) in self.iter() {
            let column = descriptor
                .resolve(field)
                .ok_or_else(|| DataError::UnknownField {
                    entity: descriptor.name().to_string(),
                    field: field.to_string(),
                })?;
            builder = builder.where_eq(column.column, value.clone());
        }
        Ok(builder)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for PredicateMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = PredicateMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// Build a [`PredicateMap`] from `field => value` pairs.
///
/// ```ignore
/// let filter = predicates! { "name" => "alice", "age" => 30 };
/// ```
#[macro_export]
macro_rules! predicates {
    () => { $crate::PredicateMap::new() };
    ($($field:expr => $value:expr),+ $(,)?) => {
        $crate::PredicateMap::new()$(.with($field, $value))+
    };
}
