use crate::config::SessionConfig;
use sheetsql_core::error::SheetSqlError;
use sheetsql_core::types::ResultSet;
use sheetsql_grid::Workbook;
use sheetsql_sql::{parse_sql, SqlExecutor};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

/// One workbook plus the SQL engine that runs against it.
///
/// The workbook is loaded lazily by the first statement (or an explicit
/// [`Session::ready`]); every later statement awaits the same gate. Statements
/// hold the workbook lock for their whole run, so concurrent callers are
/// serialized.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    workbook: OnceCell<Mutex<Workbook>>,
    executor: SqlExecutor,
}

impl Session {
    pub fn open(config: SessionConfig) -> Result<Self, SheetSqlError> {
        config.validate()?;
        match (&config.filename, &config.data) {
            (Some(path), _) => info!("opening session on {}", path.display()),
            (None, Some(bytes)) => info!("opening session on {} bytes of workbook data", bytes.len()),
            (None, None) => info!("opening session on a blank workbook"),
        }
        Ok(Self {
            config,
            workbook: OnceCell::new(),
            executor: SqlExecutor::new(),
        })
    }

    /// Resolves once the workbook is loaded. Loading happens at most once;
    /// a failed load is retried by the next caller.
    pub async fn ready(&self) -> Result<&Mutex<Workbook>, SheetSqlError> {
        self.workbook
            .get_or_try_init(|| async { self.load().await.map(Mutex::new) })
            .await
    }

    async fn load(&self) -> Result<Workbook, SheetSqlError> {
        let loaded = match (&self.config.filename, &self.config.data) {
            (Some(path), _) => Workbook::from_file_async(path).await,
            (None, Some(bytes)) => Workbook::from_data_async(bytes).await,
            (None, None) => Workbook::from_blank_async().await,
        };
        loaded.map_err(|err| SheetSqlError::Storage(format!("{err:#}")))
    }

    /// Runs every statement in `sql` in order and returns the last result.
    pub async fn execute(&self, sql: &str) -> Result<ResultSet, SheetSqlError> {
        let workbook = self.ready().await?;
        let statements = parse_sql(sql)?;
        if statements.is_empty() {
            return Err(SheetSqlError::ParseFailure("no statement to execute".to_string()));
        }
        let mut workbook = workbook.lock().await;
        let mut result = ResultSet::default();
        for stmt in &statements {
            result = self.executor.execute(&mut workbook, stmt)?;
        }
        debug!("executed {} statement(s)", statements.len());
        Ok(result)
    }

    pub async fn query(&self, sql: &str) -> Result<ResultSet, SheetSqlError> {
        self.execute(sql).await
    }

    /// Ends the session, writing the workbook back to `filename` when one was
    /// configured. A session that never loaded its workbook writes nothing.
    pub async fn close(self) -> Result<(), SheetSqlError> {
        let Some(path) = self.config.filename else {
            return Ok(());
        };
        let Some(workbook) = self.workbook.into_inner() else {
            debug!("session closed before its workbook was loaded");
            return Ok(());
        };
        workbook
            .into_inner()
            .to_file_async(&path)
            .await
            .map_err(|err| SheetSqlError::Storage(format!("{err:#}")))
    }
}

#[cfg(test)]
mod tests {
    use super::Session;
    use crate::config::SessionConfig;
    use sheetsql_core::error::SheetSqlError;
    use sheetsql_core::types::ScalarValue;
    use sheetsql_grid::{Workbook, Worksheet};
    use tempfile::TempDir;

    fn states_bytes() -> Vec<u8> {
        let mut workbook = Workbook::new();
        workbook
            .add_sheet(Worksheet::from_rows(
                "Sheet1",
                vec![
                    vec![ScalarValue::from("State"), ScalarValue::from("Ranking")],
                    vec![ScalarValue::from("Ohio"), ScalarValue::from(7)],
                    vec![ScalarValue::from("Iowa"), ScalarValue::from(30)],
                ],
            ))
            .expect("add sheet");
        workbook.to_bytes().expect("encode")
    }

    #[tokio::test]
    async fn execute_and_query_share_one_workbook() {
        let session = Session::open(SessionConfig::with_data(states_bytes())).expect("open");
        session
            .execute("INSERT INTO Sheet1 VALUES ('Utah', 31)")
            .await
            .expect("insert");
        let result = session.query("SELECT * FROM Sheet1").await.expect("select");
        assert_eq!(result.len(), 3);
        session.close().await.expect("close");
    }

    #[tokio::test]
    async fn multiple_statements_return_the_last_result() {
        let session = Session::open(SessionConfig::with_data(states_bytes())).expect("open");
        let result = session
            .execute("DELETE FROM Sheet1 WHERE State = 'Ohio'; SELECT COUNT(*) FROM Sheet1")
            .await
            .expect("execute");
        assert_eq!(result[0].get("COUNT(*)"), Some(&ScalarValue::Number(1.0)));
    }

    #[tokio::test]
    async fn blank_session_has_an_empty_sheet() {
        let session = Session::open(SessionConfig::default()).expect("open");
        session.ready().await.expect("ready");
        assert!(matches!(
            session.query("SELECT * FROM Sheet1").await,
            Err(SheetSqlError::AddressNotFound(_))
        ));
        assert!(matches!(
            session.query("   ").await,
            Err(SheetSqlError::ParseFailure(_))
        ));
    }

    #[tokio::test]
    async fn bad_sources_fail_at_ready() {
        let session = Session::open(SessionConfig::with_data(b"not a workbook".to_vec())).expect("open");
        assert!(matches!(session.ready().await, Err(SheetSqlError::Storage(_))));

        let dir = TempDir::new().expect("tempdir");
        let session = Session::open(SessionConfig::with_filename(dir.path().join("missing.sqsh"))).expect("open");
        assert!(matches!(
            session.execute("SELECT * FROM Sheet1").await,
            Err(SheetSqlError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn close_persists_to_filename() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("states.sqsh");
        tokio::fs::write(&path, states_bytes()).await.expect("seed file");

        let session = Session::open(SessionConfig::with_filename(&path)).expect("open");
        session
            .execute("UPDATE Sheet1 SET Ranking = 1 WHERE State = 'Iowa'")
            .await
            .expect("update");
        session.close().await.expect("close");

        let reopened = Session::open(SessionConfig::with_filename(&path)).expect("reopen");
        let result = reopened
            .query("SELECT Ranking FROM Sheet1 WHERE State = 'Iowa'")
            .await
            .expect("select");
        assert_eq!(result[0].get("Ranking"), Some(&ScalarValue::from(1)));
    }
}
