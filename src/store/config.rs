use std::time::Duration;

use derive_new::new;

pub const VIEW_EVENTS: &str = "view_events";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

impl SortDirection {
    pub fn to_order(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// A named index over one or more fields of the events table.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct IndexDefinition {
    pub name: &'static str,
    pub fields: Vec<(&'static str, SortDirection)>,
}

impl IndexDefinition {
    /// SurrealDB indexes are direction-agnostic, the direction is applied by the
    /// `ORDER BY` of the queries that walk the index.
    pub fn to_statement(&self, table: &str) -> String {
        let columns = self
            .fields
            .iter()
            .map(|(field, _)| *field)
            .collect::<Vec<_>>()
            .join(", ");

        format!("DEFINE INDEX {} ON TABLE {table} COLUMNS {columns};", self.name)
    }

    pub fn direction_of(&self, field: &str) -> Option<SortDirection> {
        self.fields
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, direction)| *direction)
    }
}

/// Layout and query bounds of the view event store, fixed when the store is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub table: &'static str,
    /// `(listing_id, viewed_at DESC)`: one listing's recent views.
    pub listing_recency: IndexDefinition,
    /// `(viewed_at DESC)`: window scans across every listing.
    pub recency: IndexDefinition,
    /// Budget for a single storage round trip.
    pub query_timeout: Duration,
    /// Most timestamps a per-listing lookup may return.
    pub max_recent: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table: VIEW_EVENTS,
            listing_recency: IndexDefinition::new(
                "view_events_listing_recency",
                vec![
                    ("listing_id", SortDirection::Ascending),
                    ("viewed_at", SortDirection::Descending),
                ],
            ),
            recency: IndexDefinition::new(
                "view_events_recency",
                vec![("viewed_at", SortDirection::Descending)],
            ),
            query_timeout: Duration::from_secs(2),
            max_recent: 500,
        }
    }
}

impl StoreConfig {
    /// Statements defining the table, its fields and both indexes. Safe to run on every start.
    pub fn schema(&self) -> String {
        let table = self.table;

        [
            format!("DEFINE TABLE {table} SCHEMAFULL;"),
            format!(
                "DEFINE FIELD listing_id ON TABLE {table} TYPE string ASSERT string::len($value) > 0;"
            ),
            format!("DEFINE FIELD viewed_at ON TABLE {table} TYPE datetime DEFAULT time::now();"),
            self.listing_recency.to_statement(table),
            self.recency.to_statement(table),
        ]
        .join("\n")
    }

    /// Direction in which one listing's views are walked.
    pub fn listing_recency_order(&self) -> &'static str {
        self.listing_recency
            .direction_of("viewed_at")
            .unwrap_or_default()
            .to_order()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_defines_both_indexes() {
        let schema = StoreConfig::default().schema();

        assert!(schema.contains("DEFINE TABLE view_events SCHEMAFULL;"));
        assert!(schema.contains(
            "DEFINE INDEX view_events_listing_recency ON TABLE view_events COLUMNS listing_id, viewed_at;"
        ));
        assert!(schema.contains("DEFINE INDEX view_events_recency ON TABLE view_events COLUMNS viewed_at;"));
    }

    #[test]
    fn recency_walks_newest_first() {
        let config = StoreConfig::default();
        assert_eq!(config.listing_recency_order(), "DESC");
        assert_eq!(
            config.recency.direction_of("viewed_at"),
            Some(SortDirection::Descending)
        );
        assert_eq!(
            config.listing_recency.direction_of("listing_id"),
            Some(SortDirection::Ascending)
        );
    }
}
