//! Temporary relation lifecycle.
//!
//! A mining run materializes intermediate results as named relations so
//! query plans stay shallow across chunks. Every such name carries the
//! reserved [`TEMP_PREFIX`] followed by a per-run id, so two runs sharing a
//! session never collide and cleanup only touches its own relations.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::relation::{QueryResult, Session, Table};

/// Reserved prefix of every temporary relation
pub const TEMP_PREFIX: &str = "temp_table_";

/// Temporary relations owned by one run. Dropping the guard clears them.
#[derive(Debug)]
pub struct TempTables<'s> {
    session: &'s Session,
    prefix: String,
    created: usize,
}

impl<'s> TempTables<'s> {
    pub fn new(session: &'s Session) -> Self {
        let run_id = Uuid::new_v4().simple().to_string();
        TempTables {
            session,
            prefix: format!("{TEMP_PREFIX}{run_id}_"),
            created: 0,
        }
    }

    /// Name prefix shared by every relation of this run
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn name_for(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.prefix)
    }

    /// Materialize `table` as `<prefix><suffix>`, replacing any previous
    /// relation of that name, and return a scan over it
    pub fn create(&mut self, suffix: &str, table: &Table) -> QueryResult<Table> {
        let stored = self.session.create_table(&self.name_for(suffix), table, true)?;
        self.created += 1;
        Ok(stored)
    }

    /// Live relation names belonging to this run, sorted
    pub fn names(&self) -> Vec<String> {
        self.session
            .list_tables()
            .into_iter()
            .filter(|n| n.starts_with(&self.prefix))
            .collect()
    }

    /// Drop every relation of this run. Calling it again is a no-op.
    pub fn clear(&mut self) -> QueryResult<usize> {
        let names = self.names();
        for name in &names {
            self.session.drop_table(name, true)?;
        }
        if !names.is_empty() {
            debug!(prefix = %self.prefix, dropped = names.len(), "temporary relations cleared");
        }
        self.created = 0;
        Ok(names.len())
    }

    /// Drop every temporary relation in `session`, whichever run created it
    pub fn clear_all(session: &Session) -> QueryResult<usize> {
        let names: Vec<String> = session
            .list_tables()
            .into_iter()
            .filter(|n| n.starts_with(TEMP_PREFIX))
            .collect();
        for name in &names {
            session.drop_table(name, true)?;
        }
        Ok(names.len())
    }
}

impl Drop for TempTables<'_> {
    fn drop(&mut self) {
        if self.created == 0 {
            return;
        }
        if let Err(e) = self.clear() {
            warn!(prefix = %self.prefix, error = %e, "failed to clear temporary relations");
        }
    }
}
