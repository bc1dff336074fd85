//! Remote execution seam
//!
//! Entity actions never talk to the platform directly, every statement goes through a [SqlExecutor].
use crate::value::Value;
use indexmap::IndexMap;
use std::cell::RefCell;

/// Column name to value
pub type Row = IndexMap<String, Value>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("Failed to execute {query}: {message}")]
pub struct ExecutorError {
    pub query: String,
    pub message: String,
}

pub trait SqlExecutor {
    fn execute_query(&self, query: &str) -> Result<Vec<Row>, ExecutorError>;

    /// Role of the current session
    fn current_role(&self) -> Result<String, ExecutorError> {
        const QUERY: &str = "select current_role()";

        self.execute_query(QUERY)?
            .first()
            .and_then(|row| row.values().next())
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ExecutorError {
                query: QUERY.to_string(),
                message: "no role returned".to_string(),
            })
    }
}

/// Records statements instead of running them
#[derive(Debug, Default, derive_new::new)]
pub struct DryRunExecutor {
    role: String,
    #[new(default)]
    statements: RefCell<Vec<String>>,
}

impl DryRunExecutor {
    /// Every statement seen so far, in execution order
    pub fn statements(&self) -> Vec<String> {
        self.statements.borrow().clone()
    }
}

impl SqlExecutor for DryRunExecutor {
    fn execute_query(&self, query: &str) -> Result<Vec<Row>, ExecutorError> {
        tracing::info!(%query, "dry run");
        self.statements.borrow_mut().push(query.to_string());
        Ok(vec![])
    }

    fn current_role(&self) -> Result<String, ExecutorError> {
        Ok(self.role.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    struct FixedRows(Vec<Row>);

    impl SqlExecutor for FixedRows {
        fn execute_query(&self, _query: &str) -> Result<Vec<Row>, ExecutorError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn dry_run_records_statements() {
        let executor = DryRunExecutor::new("dev_role".to_string());
        executor.execute_query("select 1").unwrap();
        executor.execute_query("select 2").unwrap();

        assert_eq!(executor.statements(), vec!["select 1", "select 2"]);
        assert_eq!(executor.current_role().unwrap(), "dev_role");
    }

    #[test]
    fn current_role_reads_the_first_column() {
        let executor = FixedRows(vec![Row::from([(
            "CURRENT_ROLE()".to_string(),
            Value::from("accountadmin"),
        )])]);
        assert_eq!(executor.current_role().unwrap(), "accountadmin");

        let err = FixedRows(vec![]).current_role().unwrap_err();
        assert_eq!(err.to_string(), "Failed to execute select current_role(): no role returned");
    }
}
