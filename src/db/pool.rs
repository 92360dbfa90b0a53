//! Database connection pool and schema setup

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Schema files applied in order at startup
const MIGRATIONS: &[(&str, &str)] = &[("001_initial", include_str!("migrations/001_initial.sql"))];

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await
}

/// Split a script into statements; semicolons inside `$$` bodies do not terminate
fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_body = false;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if c == '$' && chars.peek() == Some(&'$') {
            current.push('$');
            chars.next();
            in_body = !in_body;
        } else if c == ';' && !in_body {
            push_statement(&mut statements, &current);
            current.clear();
        }
    }
    push_statement(&mut statements, &current);

    statements
}

fn push_statement(statements: &mut Vec<String>, text: &str) {
    let executable = text.lines().any(|line| {
        let line = line.trim();
        !line.is_empty() && !line.starts_with("--")
    });
    if executable {
        statements.push(text.trim().to_string());
    }
}

/// Apply every migration; the scripts are idempotent so reruns are harmless
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    for (name, script) in MIGRATIONS {
        for statement in split_statements(script) {
            if let Err(e) = sqlx::query(&statement).execute(pool).await {
                tracing::error!("Migration {} failed: {}", name, e);
                return Err(e);
            }
        }
        tracing::debug!("Applied migration {}", name);
    }

    tracing::info!("Database migrations completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_statements_keeps_dollar_bodies() {
        let sql = "CREATE TABLE a (id INT);\n\
                   CREATE FUNCTION f() RETURNS TRIGGER AS $$\nBEGIN\n  RETURN NEW;\nEND;\n$$ LANGUAGE plpgsql;\n\
                   -- trailing comment\n";
        let statements = split_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[1].contains("RETURN NEW;"));
        assert!(statements[1].ends_with("plpgsql;"));
    }

    #[test]
    fn test_split_statements_skips_comment_only_chunks() {
        let statements = split_statements("-- header\n;\nSELECT 1;");
        assert_eq!(statements, vec!["SELECT 1;".to_string()]);
    }

    #[test]
    fn test_initial_migration_splits() {
        let statements = split_statements(MIGRATIONS[0].1);
        assert!(statements.iter().any(|s| s.contains("CREATE TABLE IF NOT EXISTS submissions")));
        assert!(statements
            .iter()
            .any(|s| s.starts_with("CREATE OR REPLACE FUNCTION") && s.contains("RETURN NEW;")));
    }
}
