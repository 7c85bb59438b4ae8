use regex::Regex;
use std::sync::OnceLock;

/// Validates generated SQL before it reaches the database
pub struct SqlValidator;

static PATTERNS: OnceLock<ValidationPatterns> = OnceLock::new();

struct ValidationPatterns {
    /// Statements that only read
    read_statement: Regex,
    /// Any write or DDL keyword as a whole word, wherever it appears
    write_ops: Regex,
    /// Row limit clause
    limit_clause: Regex,
    /// Quoted strings and comments, blanked out before keyword checks
    literals: Regex,
}

impl ValidationPatterns {
    fn get() -> &'static Self {
        PATTERNS.get_or_init(|| Self {
            read_statement: Regex::new(r"(?i)^\s*(SELECT|WITH|EXPLAIN|SHOW|VALUES|TABLE)\b").unwrap(),
            write_ops: Regex::new(
                r"(?i)\b(INSERT|UPDATE|DELETE|MERGE|DROP|ALTER|CREATE|TRUNCATE|GRANT|REVOKE|COPY|VACUUM|CALL|DO)\b",
            )
            .unwrap(),
            limit_clause: Regex::new(r"(?i)\b(LIMIT|FETCH\s+FIRST)\b").unwrap(),
            literals: Regex::new(r#"(?s)'(?:[^']|'')*'|"(?:[^"]|"")*"|--[^\n]*|/\*.*?\*/"#).unwrap(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl SqlValidator {
    /// Checks that `query` is a single read-only statement
    ///
    /// # Arguments
    ///
    /// * `query` - The SQL text as returned by the model
    ///
    /// # Returns
    ///
    /// A `ValidationResult` containing validation status and any errors/warnings
    #[must_use]
    pub fn validate_read_only(query: &str) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let query = query.trim();
        let patterns = ValidationPatterns::get();

        // Check if query is empty
        if query.is_empty() {
            errors.push("Query is empty".to_string());
            return ValidationResult {
                is_valid: false,
                errors,
                warnings,
            };
        }

        // Keywords inside string literals or comments don't count
        let code = patterns.literals.replace_all(query, " ");

        if !patterns.read_statement.is_match(&code) {
            errors.push("Query is not a read-only statement".to_string());
        }

        if let Some(found) = patterns.write_ops.find(&code) {
            errors.push(format!("Query contains a write operation ({})", found.as_str().to_uppercase()));
        }

        if Self::statement_count(&code) > 1 {
            errors.push("Query contains more than one statement".to_string());
        }

        if !patterns.limit_clause.is_match(&code) {
            warnings.push("Query has no LIMIT clause".to_string());
        }

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Counts non-empty `;`-separated statements, ignoring a trailing terminator
    fn statement_count(code: &str) -> usize {
        code.split(';').filter(|part| !part.trim().is_empty()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_select_is_valid() {
        let result = SqlValidator::validate_read_only("SELECT name FROM products WHERE vegan = true LIMIT 10;");
        assert!(result.is_valid, "errors: {:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_cte_and_explain_are_valid() {
        assert!(SqlValidator::validate_read_only("WITH v AS (SELECT * FROM products) SELECT count(*) FROM v").is_valid);
        assert!(SqlValidator::validate_read_only("explain select * from products").is_valid);
    }

    #[test]
    fn test_missing_limit_is_only_a_warning() {
        let result = SqlValidator::validate_read_only("SELECT * FROM products");
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_empty_query() {
        let result = SqlValidator::validate_read_only("   ");
        assert!(!result.is_valid, "Empty query should be invalid");
        assert!(!result.errors.is_empty(), "Should have errors");
    }

    #[test]
    fn test_write_statements_are_rejected() {
        for sql in [
            "DELETE FROM products",
            "UPDATE products SET quantity = 0",
            "INSERT INTO requests (item_name) VALUES ('x')",
            "DROP TABLE products",
            "TRUNCATE requests",
        ] {
            assert!(!SqlValidator::validate_read_only(sql).is_valid, "{sql} should be rejected");
        }
    }

    #[test]
    fn test_write_hidden_in_cte_is_rejected() {
        let result =
            SqlValidator::validate_read_only("WITH gone AS (DELETE FROM products RETURNING *) SELECT * FROM gone");
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("DELETE"));
    }

    #[test]
    fn test_stacked_statements_are_rejected() {
        let result = SqlValidator::validate_read_only("SELECT 1; SELECT 2");
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("more than one statement")));
    }

    #[test]
    fn test_keywords_inside_literals_are_ignored() {
        let result = SqlValidator::validate_read_only(
            "SELECT * FROM requests WHERE item_name = 'drop; delete me' -- update later\nLIMIT 5",
        );
        assert!(result.is_valid, "errors: {:?}", result.errors);
    }

    #[test]
    fn test_column_names_containing_keywords_pass() {
        let result = SqlValidator::validate_read_only("SELECT created_at, updated_by FROM products LIMIT 1");
        assert!(result.is_valid, "errors: {:?}", result.errors);
    }
}
