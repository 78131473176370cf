//! Schema registry
//!
//! Purely descriptive storage of setting schemas and categories. Registration
//! order is kept for listings; re-registering a key or category id replaces
//! the previous entry in place. Pattern rules are compiled once, when their
//! schema is registered.

use std::collections::HashMap;

use crate::models::{Category, SettingSchema};
use crate::validation::PatternCache;

/// Catalog of setting schemas and their categories
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: Vec<SettingSchema>,
    schema_index: HashMap<String, usize>,
    categories: Vec<Category>,
    category_index: HashMap<String, usize>,
    patterns: PatternCache,
}

impl SchemaRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single schema (last write wins)
    pub fn register_schema(&mut self, schema: SettingSchema) {
        self.patterns.compile_rules(&schema.rules);
        match self.schema_index.get(&schema.key) {
            Some(&idx) => self.schemas[idx] = schema,
            None => {
                self.schema_index.insert(schema.key.clone(), self.schemas.len());
                self.schemas.push(schema);
            }
        }
    }

    /// Register several schemas in order
    pub fn register_schemas(&mut self, schemas: impl IntoIterator<Item = SettingSchema>) {
        for schema in schemas {
            self.register_schema(schema);
        }
    }

    /// Register a category and all of its schemas
    ///
    /// Each contained schema gets its `category` set to the category id, both
    /// in the stored category and in the individual schema entries.
    pub fn register_category(&mut self, mut category: Category) {
        for schema in &mut category.settings {
            schema.category = Some(category.id.clone());
        }
        self.register_schemas(category.settings.iter().cloned());

        match self.category_index.get(&category.id) {
            Some(&idx) => self.categories[idx] = category,
            None => {
                self.category_index
                    .insert(category.id.clone(), self.categories.len());
                self.categories.push(category);
            }
        }
    }

    /// Get a schema by key
    pub fn schema(&self, key: &str) -> Option<&SettingSchema> {
        self.schema_index.get(key).map(|&idx| &self.schemas[idx])
    }

    /// All schemas in registration order
    pub fn schemas(&self) -> &[SettingSchema] {
        &self.schemas
    }

    /// All schema keys in registration order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.schemas.iter().map(|s| s.key.as_str())
    }

    /// Schemas whose category is `category_id`
    pub fn schemas_by_category(&self, category_id: &str) -> Vec<&SettingSchema> {
        self.schemas
            .iter()
            .filter(|s| s.category.as_deref() == Some(category_id))
            .collect()
    }

    /// Schemas belonging to any of the given categories, without duplicates
    pub fn schemas_for_categories(&self, category_ids: &[&str]) -> Vec<&SettingSchema> {
        self.schemas
            .iter()
            .filter(|s| {
                s.category
                    .as_deref()
                    .is_some_and(|c| category_ids.contains(&c))
            })
            .collect()
    }

    /// Get a category by id
    pub fn category(&self, id: &str) -> Option<&Category> {
        self.category_index.get(id).map(|&idx| &self.categories[idx])
    }

    /// All categories in registration order
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Compiled pattern rules of every registered schema
    pub fn patterns(&self) -> &PatternCache {
        &self.patterns
    }

    pub fn has_schema(&self, key: &str) -> bool {
        self.schema_index.contains_key(key)
    }

    pub fn has_category(&self, id: &str) -> bool {
        self.category_index.contains_key(id)
    }

    /// Number of registered schemas
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
