//! Display formatting for generated SQL.

use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace};

use crate::db::BackendKind;

// Keywords that open a new line when they appear outside any parentheses.
const CLAUSE_STARTS: &[Keyword] = &[
    Keyword::SELECT,
    Keyword::FROM,
    Keyword::WHERE,
    Keyword::GROUP,
    Keyword::HAVING,
    Keyword::QUALIFY,
    Keyword::WINDOW,
    Keyword::ORDER,
    Keyword::LIMIT,
    Keyword::UNION,
    Keyword::EXCEPT,
    Keyword::INTERSECT,
    Keyword::JOIN,
    Keyword::LEFT,
    Keyword::RIGHT,
    Keyword::INNER,
    Keyword::FULL,
    Keyword::CROSS,
    Keyword::NATURAL,
];

// Words after which a clause keyword continues the current line,
// e.g. `LEFT JOIN` or `UNION ALL SELECT`.
const JOIN_MODIFIERS: &[Keyword] = &[
    Keyword::LEFT,
    Keyword::RIGHT,
    Keyword::INNER,
    Keyword::FULL,
    Keyword::CROSS,
    Keyword::NATURAL,
    Keyword::OUTER,
];

const UPPERCASED: &[Keyword] = &[
    Keyword::AND,
    Keyword::OR,
    Keyword::NOT,
    Keyword::AS,
    Keyword::ON,
    Keyword::BY,
    Keyword::DISTINCT,
    Keyword::IN,
    Keyword::IS,
    Keyword::NULL,
    Keyword::LIKE,
    Keyword::BETWEEN,
    Keyword::CASE,
    Keyword::WHEN,
    Keyword::THEN,
    Keyword::ELSE,
    Keyword::END,
    Keyword::ASC,
    Keyword::DESC,
    Keyword::ALL,
    Keyword::WITH,
    Keyword::OFFSET,
    Keyword::USING,
    Keyword::OUTER,
];

fn shouted(keyword: Keyword) -> bool {
    CLAUSE_STARTS.contains(&keyword) || UPPERCASED.contains(&keyword)
}

/// Lays generated SQL out one top-level clause per line with upper-case
/// keywords. Only whitespace and keyword case change; text the tokenizer
/// cannot read comes back untouched.
pub fn format_sql(sql: &str, kind: BackendKind) -> String {
    let dialect = kind.dialect();
    let tokens = match Tokenizer::new(dialect.as_ref(), sql).tokenize() {
        Ok(tokens) => tokens,
        Err(_) => return sql.trim().to_string(),
    };

    let mut out = String::new();
    let mut depth = 0usize;
    let mut pending_space = false;
    let mut previous: Option<Keyword> = None;

    for token in tokens {
        match &token {
            Token::Whitespace(Whitespace::Space | Whitespace::Newline | Whitespace::Tab) => {
                pending_space = true;
                continue;
            }
            Token::EOF => break,
            _ => {}
        }

        let keyword = match &token {
            Token::Word(word) if word.quote_style.is_none() => Some(word.keyword),
            _ => None,
        };

        let starts_clause = depth == 0
            && keyword.is_some_and(|k| CLAUSE_STARTS.contains(&k))
            && !previous.is_some_and(|p| {
                JOIN_MODIFIERS.contains(&p) || p == Keyword::ALL || p == Keyword::DISTINCT
            });

        if !out.is_empty() {
            if starts_clause {
                out.push('\n');
            } else if pending_space {
                out.push(' ');
            }
        }
        pending_space = false;

        match (&token, keyword) {
            (Token::Word(word), Some(k)) if shouted(k) => out.push_str(&word.value.to_uppercase()),
            _ => out.push_str(&token.to_string()),
        }

        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            _ => {}
        }
        previous = keyword;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_clauses_start_new_lines() {
        assert_eq!(
            format_sql(
                "select id, name from customers where id > 1 order by id limit 5",
                BackendKind::MySql
            ),
            "SELECT id, name\nFROM customers\nWHERE id > 1\nORDER BY id\nLIMIT 5"
        );
    }

    #[test]
    fn subqueries_and_join_modifiers_stay_inline() {
        let sql = "SELECT c.name FROM customers c LEFT JOIN orders o ON o.customer_id = c.id \
                   WHERE c.id IN (SELECT customer_id FROM orders WHERE total > 10)";
        assert_eq!(
            format_sql(sql, BackendKind::DuckDb),
            "SELECT c.name\n\
             FROM customers c\n\
             LEFT JOIN orders o ON o.customer_id = c.id\n\
             WHERE c.id IN (SELECT customer_id FROM orders WHERE total > 10)"
        );
    }

    #[test]
    fn literals_and_quoted_identifiers_are_kept_verbatim() {
        assert_eq!(
            format_sql("SELECT `from`,   'select x from y' FROM t", BackendKind::MySql),
            "SELECT `from`, 'select x from y'\nFROM t"
        );
    }

    #[test]
    fn unions_break_before_the_set_operator() {
        assert_eq!(
            format_sql("SELECT 1 UNION ALL SELECT 2", BackendKind::MySql),
            "SELECT 1\nUNION ALL SELECT 2"
        );
    }

    #[test]
    fn unreadable_text_is_returned_trimmed() {
        assert_eq!(format_sql("  SELECT 'open  ", BackendKind::MySql), "SELECT 'open");
    }
}
