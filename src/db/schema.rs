use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub table_name: String,
    pub table_schema: String,
}

impl TableInfo {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.table_schema, self.table_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub table_schema: String,
    pub table_name: String,
    pub column_name: String,
    pub data_type: String,
}

impl ColumnInfo {
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.table_schema, self.table_name)
    }
}

/// Catalog snapshot of one database, fetched fresh for every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub tables: Vec<TableInfo>,
    pub columns: Vec<ColumnInfo>,
}

impl SchemaInfo {
    fn columns_by_table(&self) -> HashMap<String, Vec<&ColumnInfo>> {
        let mut grouped: HashMap<String, Vec<&ColumnInfo>> = HashMap::new();
        for column in &self.columns {
            grouped
                .entry(column.qualified_table())
                .or_default()
                .push(column);
        }
        grouped
    }

    /// Renders the schema as prompt text:
    ///
    /// ```text
    /// Table: sales.orders
    ///   - id (int)
    ///   - total (decimal)
    ///
    /// ```
    ///
    /// Tables keep catalog order; a table without columns keeps its header
    /// and an empty body.
    pub fn format_for_prompt(&self) -> String {
        let grouped = self.columns_by_table();
        let mut text = String::new();

        for table in &self.tables {
            let full_name = table.qualified_name();
            text.push_str(&format!("Table: {}\n", full_name));

            if let Some(columns) = grouped.get(&full_name) {
                for column in columns {
                    text.push_str(&format!(
                        "  - {} ({})\n",
                        column.column_name, column.data_type
                    ));
                }
            }

            text.push('\n');
        }

        text
    }

    /// Fully-qualified table name to its column names, for the schema endpoint.
    pub fn column_names_by_table(&self) -> BTreeMap<String, Vec<String>> {
        let grouped = self.columns_by_table();
        self.tables
            .iter()
            .map(|table| {
                let full_name = table.qualified_name();
                let names = grouped
                    .get(&full_name)
                    .map(|cols| cols.iter().map(|c| c.column_name.clone()).collect())
                    .unwrap_or_default();
                (full_name, names)
            })
            .collect()
    }
}
