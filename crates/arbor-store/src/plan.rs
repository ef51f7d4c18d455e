//! Two-phase mutation support shared by every strategy.
//!
//! A mutation first builds a [`WritePlan`] from an immutable view of its
//! table, where every lookup and every failure happens. Applying the plan
//! cannot fail, which is what makes a mutation all-or-nothing.

use arbor_types::Timestamp;

/// Position of a row in an append-only table.
pub(crate) type RowId = usize;

/// Append-only table that supports closing rows and appending new ones.
pub(crate) trait RowTable {
    type Row;

    fn close_row(&mut self, id: RowId, at: Timestamp);

    fn insert_row(&mut self, row: Self::Row) -> RowId;
}

/// Rows to close and rows to append for one mutation.
#[derive(Debug)]
pub(crate) struct WritePlan<R> {
    closes: Vec<RowId>,
    inserts: Vec<R>,
}

/// What a committed plan did, for logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct AppliedPlan {
    pub closed: usize,
    pub inserted: usize,
}

impl<R> WritePlan<R> {
    pub fn new() -> Self {
        Self {
            closes: Vec::new(),
            inserts: Vec::new(),
        }
    }

    pub fn close(&mut self, id: RowId) {
        self.closes.push(id);
    }

    pub fn insert(&mut self, row: R) {
        self.inserts.push(row);
    }

    pub fn apply<T>(mut self, table: &mut T, at: Timestamp) -> AppliedPlan
    where
        T: RowTable<Row = R>,
    {
        self.closes.sort_unstable();
        self.closes.dedup();

        let applied = AppliedPlan {
            closed: self.closes.len(),
            inserted: self.inserts.len(),
        };
        for id in self.closes {
            table.close_row(id, at);
        }
        for row in self.inserts {
            table.insert_row(row);
        }
        applied
    }
}
