//! Purpose: Map the narrow row-source contract onto the wide reader surface of database clients.
//! Exports: `ClientReader`, `Rows`, `TableValuedParameter`.
//! Role: Boundary adapter handed to the external client for TVP binding and bulk loads.
//! Invariants: Unsupported members fail fast with `NotSupported`; none are silent no-ops.
//! Invariants: Column names are positional only (`c<ordinal>`).
#![allow(clippy::result_large_err)]

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::core::cell::Cell;
use crate::core::cursor::RowSource;
use crate::core::error::Error;
use crate::core::schema::SchemaDescriptor;

pub type ApiResult<T> = Result<T, Error>;

/// Wide reader contract over any [`RowSource`].
///
/// Supported members are reachable through `Deref`; the members below either
/// have fixed answers for a single forward-only result set or are rejected.
#[derive(Debug)]
pub struct ClientReader<R> {
    inner: R,
}

impl<R: RowSource> ClientReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Nesting depth of the current row; always 0.
    pub fn depth(&self) -> usize {
        0
    }

    /// Row sources never modify data; -1 as for a plain select.
    pub fn records_affected(&self) -> i64 {
        -1
    }

    pub fn has_rows(&self) -> bool {
        !self.inner.is_closed()
    }

    /// Positional lookup by `c<ordinal>`; any other name is `Ok(None)`.
    pub fn value_by_name(&self, name: &str) -> ApiResult<Option<&Cell>> {
        match self.inner.ordinal(name) {
            Some(ordinal) => self.inner.value(ordinal).map(Some),
            None => Ok(None),
        }
    }

    pub fn next_result(&mut self) -> ApiResult<bool> {
        Err(Error::not_supported("advancing to another result set"))
    }

    pub fn rewind(&mut self) -> ApiResult<()> {
        Err(Error::not_supported("rewinding"))
    }

    pub fn set_column_name(&mut self, ordinal: usize, _name: &str) -> ApiResult<()> {
        Err(Error::not_supported("renaming a column").with_ordinal(ordinal))
    }

    /// Single forward traversal yielding owned rows.
    pub fn into_rows(self) -> Rows<R> {
        Rows {
            inner: self.inner,
            done: false,
        }
    }
}

impl<R> Deref for ClientReader<R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.inner
    }
}

impl<R> DerefMut for ClientReader<R> {
    fn deref_mut(&mut self) -> &mut R {
        &mut self.inner
    }
}

/// Forward iterator over a reader's remaining rows; stops after the first error.
#[derive(Debug)]
pub struct Rows<R> {
    inner: R,
    done: bool,
}

impl<R: RowSource> Iterator for Rows<R> {
    type Item = ApiResult<Vec<Cell>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.inner.read() {
            Ok(true) => Some(self.inner.row().map(<[Cell]>::to_vec)),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// A reader bound as a table-valued parameter of a named table type.
#[derive(Debug)]
pub struct TableValuedParameter<R> {
    name: String,
    type_name: String,
    reader: ClientReader<R>,
}

impl<R: RowSource> TableValuedParameter<R> {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, reader: R) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            reader: ClientReader::new(reader),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn columns(&self) -> ApiResult<Arc<SchemaDescriptor>> {
        self.reader.schema()
    }

    pub fn reader_mut(&mut self) -> &mut ClientReader<R> {
        &mut self.reader
    }

    pub fn into_reader(self) -> ClientReader<R> {
        self.reader
    }
}
