//! Schema-qualified keys for correlating foreign keys with extracted tables.
//!
//! Relationship queries return bare table names, and each dialect implies a
//! different schema for them. Both endpoints of an edge are qualified with
//! the datasource's implied schema and then looked up in the table mapping
//! built during reconciliation. Edges with an unknown endpoint are dropped.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::DataSourceDescriptor;
use crate::core::{DialectKind, RelationshipEdge};

/// `schema.table` key → persisted table id.
pub type TableMapping = HashMap<String, i64>;

/// A relationship whose endpoints both map to persisted tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRelationship {
    pub constraint_name: String,
    pub source_table_key: String,
    pub table_id: i64,
    pub column_name: String,
    pub target_table_key: String,
    pub referenced_table_id: i64,
    pub referenced_column_name: String,
    pub constraint_type: String,
}

/// Builds `schema.table` keys using a dialect's implied schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaKeyResolver {
    schema: String,
}

impl SchemaKeyResolver {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
        }
    }

    /// Resolver for the schema the datasource's relationship query reads.
    pub fn for_datasource(ds: &DataSourceDescriptor) -> Self {
        let schema = match ds.kind {
            DialectKind::Mysql | DialectKind::Starrocks => ds.database.clone(),
            DialectKind::Postgresql => "public".to_string(),
            DialectKind::Sqlserver => "dbo".to_string(),
            DialectKind::Oracle => ds.username.to_uppercase(),
        };
        Self::new(schema)
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn key(&self, table: &str) -> String {
        format!("{}.{}", self.schema, table)
    }

    /// Map both endpoints of `edge` to table ids, or `None` if either is missing.
    pub fn resolve(
        &self,
        edge: &RelationshipEdge,
        mapping: &TableMapping,
    ) -> Option<ResolvedRelationship> {
        let source_key = self.key(&edge.table_name);
        let target_key = self.key(&edge.referenced_table_name);
        let table_id = *mapping.get(&source_key)?;
        let referenced_table_id = *mapping.get(&target_key)?;

        Some(ResolvedRelationship {
            constraint_name: edge.constraint_name.clone(),
            source_table_key: source_key,
            table_id,
            column_name: edge.column_name.clone(),
            target_table_key: target_key,
            referenced_table_id,
            referenced_column_name: edge.referenced_column_name.clone(),
            constraint_type: edge.constraint_type.clone(),
        })
    }

    /// Resolve every edge, dropping the ones with an unmatched endpoint.
    pub fn resolve_all(
        &self,
        edges: &[RelationshipEdge],
        mapping: &TableMapping,
    ) -> Vec<ResolvedRelationship> {
        edges
            .iter()
            .filter_map(|edge| self.resolve(edge, mapping))
            .collect()
    }
}
