use std::collections::HashMap;

use crate::entity::{EntityDescriptor, Mapped, Marker};

/// What a loading context knows about one named type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    name: String,
    mapping: Option<&'static EntityDescriptor>,
}

impl TypeDescriptor {
    pub fn of<T: Mapped>() -> Self {
        let descriptor = T::descriptor();
        Self {
            name: descriptor.name().to_string(),
            mapping: Some(descriptor),
        }
    }

    /// A type that exists but carries no mapping metadata.
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mapping: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mapping(&self) -> Option<&'static EntityDescriptor> {
        self.mapping
    }

    pub fn marker(&self) -> Option<Marker> {
        self.mapping.map(|m| m.marker())
    }

    /// Carries the persistable marker or one of the secondary markers.
    pub fn is_marked(&self) -> bool {
        self.mapping.is_some()
    }

    pub fn is_persistable(&self) -> bool {
        self.marker() == Some(Marker::Persistable)
    }
}

/// Name-keyed table of the types a [`ClassPath`](crate::ClassPath) can
/// materialize.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, TypeDescriptor>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Mapped>(&mut self) -> &mut Self {
        self.insert(TypeDescriptor::of::<T>())
    }

    pub fn register_plain(&mut self, name: impl Into<String>) -> &mut Self {
        self.insert(TypeDescriptor::plain(name))
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with<T: Mapped>(mut self) -> Self {
        self.register::<T>();
        self
    }

    pub fn with_plain(mut self, name: impl Into<String>) -> Self {
        self.register_plain(name);
        self
    }

    pub fn insert(&mut self, descriptor: TypeDescriptor) -> &mut Self {
        self.types.insert(descriptor.name.clone(), descriptor);
        self
    }

    pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.values()
    }
}
