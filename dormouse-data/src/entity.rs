use crate::value::{ColumnType, Value, ValueError};

/// Marker carried by a mapped type.
///
/// Only `Persistable` types get a table of their own. The two secondary
/// markers describe mapping fragments that still take part in discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    Persistable,
    Embeddable,
    MappedBase,
}

/// Mapping of one struct field onto one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub field: &'static str,
    pub column: &'static str,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub id: bool,
    pub generated: bool,
}

/// Mapping metadata of a type, generated by `#[derive(Entity)]` or
/// `#[derive(Mapped)]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    rust_path: &'static str,
    name: String,
    table: &'static str,
    marker: Marker,
    columns: Vec<ColumnDescriptor>,
}

impl EntityDescriptor {
    /// `rust_path` is `module_path!()` joined with the type name; the
    /// qualified name is derived from it by replacing `::` with `.`.
    pub fn new(rust_path: &'static str, table: &'static str, marker: Marker) -> Self {
        Self {
            rust_path,
            name: rust_path.replace("::", "."),
            table,
            marker,
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    /// Fully qualified dotted name, e.g. `app.entity.User`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rust_path(&self) -> &'static str {
        self.rust_path
    }

    /// Last segment of the qualified name.
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn marker(&self) -> Marker {
        self.marker
    }

    pub fn is_persistable(&self) -> bool {
        self.marker == Marker::Persistable
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.column).collect()
    }

    pub fn id_column(&self) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.id)
    }

    /// Look a column up by field name, falling back to the column name.
    pub fn resolve(&self, field: &str) -> Option<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| c.field == field)
            .or_else(|| self.columns.iter().find(|c| c.column == field))
    }
}

/// Implemented by every type carrying mapping metadata.
///
/// This is the persistable marker discovery looks for.
pub trait Mapped: 'static {
    fn descriptor() -> &'static EntityDescriptor;
}

/// A persistable type with an identity column.
///
/// Normally implemented via `#[derive(Entity)]`:
///
/// ```ignore
/// #[derive(Debug, Clone, Entity)]
/// #[entity(table = "users")]
/// pub struct User {
///     #[entity(id)]
///     pub id: i64,
///     pub name: String,
///     pub email: Option<String>,
/// }
/// ```
pub trait Entity: Mapped + Send + Sync + Unpin + Sized {
    /// Current identity value.
    fn id(&self) -> Value;

    fn set_id(&mut self, id: Value) -> Result<(), ValueError>;

    /// One value per mapped column, in descriptor order.
    fn to_values(&self) -> Vec<Value>;

    fn from_record(record: &mut Record) -> Result<Self, ValueError>;
}

/// A decoded row: column name / value pairs in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.values.push((column.into(), value));
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, v)| v)
    }

    /// Move a value out of the record, leaving `Null` behind.
    pub fn take(&mut self, column: &str) -> Result<Value, ValueError> {
        self.values
            .iter_mut()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, v)| std::mem::take(v))
            .ok_or_else(|| ValueError::MissingColumn {
                column: column.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}
