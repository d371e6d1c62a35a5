use crate::db::BackendKind;

const SQL_SYSTEM_PROMPT: &str = r#"
You are an expert database engineer specialized in translating natural language into SQL queries.

Given the database schema information and a natural language query, you will:
1. Analyze the schema to understand the database structure.
2. Interpret the user's natural language question.
3. Generate a valid SQL query that accurately answers the question.
4. Return ONLY the SQL query without any explanations.

Important rules:
- Only use tables and columns that exist in the provided schema.
- Reference tables by their fully-qualified name as shown in the schema.
- Never generate statements that modify the database (INSERT, UPDATE, DELETE, DROP, etc.).
- Always use table aliases for clarity in queries that join tables.
- Produce exactly one statement.
"#;

fn dialect_name(dialect: BackendKind) -> &'static str {
    match dialect {
        BackendKind::MySql => "MySQL",
        BackendKind::DuckDb => "DuckDB",
    }
}

pub fn system_prompt(dialect: BackendKind) -> String {
    format!(
        "{}\nThe query you generate will be executed against a {} database.\n",
        SQL_SYSTEM_PROMPT.trim_start(),
        dialect_name(dialect)
    )
}

pub fn user_prompt(question: &str, schema: &str) -> String {
    format!(
        "DATABASE SCHEMA:\n{}\n\nNATURAL LANGUAGE QUERY: {}\n\n\
         Respond with a JSON object that contains the corresponding SQL query \
         in a field called \"sql\". \
         Return the SQL query in a single line without any line breaks. \
         Example: {{ \"sql\": \"SELECT id, name FROM shop.users;\" }}",
        schema, question
    )
}
