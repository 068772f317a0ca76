//! Purpose: Model row-buffer cells as a tagged value with typed, checked recovery.
//! Exports: `Cell`, `CellKind`, `ColumnType`, `IntoCell`, `FromCell`, window copy helpers.
//! Role: Value normalization for projection output and type recovery for getters.
//! Invariants: Recovery never coerces; a getter sees exactly the variant it asks for.
//! Invariants: `Option<T>` maps `None` to `Cell::Null` and reports `T`'s kind.

use bytes::Bytes;
use rust_decimal::Decimal;
use serde::ser::{Error as _, Serializer};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::core::error::{Error, ErrorKind};

/// Declared or stored type of a column value.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum CellKind {
    Bool,
    U8,
    Char,
    I16,
    I32,
    I64,
    F32,
    F64,
    Decimal,
    DateTime,
    Guid,
    Text,
    Bytes,
    Json,
}

impl CellKind {
    /// Name reported to database clients as the column's data type name.
    pub fn type_name(self) -> &'static str {
        match self {
            CellKind::Bool => "Boolean",
            CellKind::U8 => "Byte",
            CellKind::Char => "Char",
            CellKind::I16 => "Int16",
            CellKind::I32 => "Int32",
            CellKind::I64 => "Int64",
            CellKind::F32 => "Single",
            CellKind::F64 => "Double",
            CellKind::Decimal => "Decimal",
            CellKind::DateTime => "DateTime",
            CellKind::Guid => "Guid",
            CellKind::Text => "String",
            CellKind::Bytes => "Byte[]",
            CellKind::Json => "Json",
        }
    }

    /// Variable-length kinds may always hold null.
    pub fn is_reference(self) -> bool {
        matches!(self, CellKind::Text | CellKind::Bytes | CellKind::Json)
    }
}

/// One value in a row buffer.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Cell {
    #[default]
    Null,
    Bool(bool),
    U8(u8),
    Char(char),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    DateTime(OffsetDateTime),
    Guid(Uuid),
    Text(String),
    Bytes(Bytes),
    Json(serde_json::Value),
}

impl Cell {
    /// Stored kind, `None` for null.
    pub fn kind(&self) -> Option<CellKind> {
        Some(match self {
            Cell::Null => return None,
            Cell::Bool(_) => CellKind::Bool,
            Cell::U8(_) => CellKind::U8,
            Cell::Char(_) => CellKind::Char,
            Cell::I16(_) => CellKind::I16,
            Cell::I32(_) => CellKind::I32,
            Cell::I64(_) => CellKind::I64,
            Cell::F32(_) => CellKind::F32,
            Cell::F64(_) => CellKind::F64,
            Cell::Decimal(_) => CellKind::Decimal,
            Cell::DateTime(_) => CellKind::DateTime,
            Cell::Guid(_) => CellKind::Guid,
            Cell::Text(_) => CellKind::Text,
            Cell::Bytes(_) => CellKind::Bytes,
            Cell::Json(_) => CellKind::Json,
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Recover a typed value, failing with `TypeMismatch` on any other variant.
    pub fn get<'a, T: FromCell<'a>>(&'a self) -> Result<T, Error> {
        T::from_cell(self).ok_or_else(|| mismatch(T::KIND, self.kind()))
    }
}

fn mismatch(requested: CellKind, stored: Option<CellKind>) -> Error {
    let stored = stored.map_or("Null", CellKind::type_name);
    Error::new(ErrorKind::TypeMismatch).with_message(format!(
        "requested {}, stored {stored}",
        requested.type_name()
    ))
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Null => serializer.serialize_unit(),
            Cell::Bool(value) => serializer.serialize_bool(*value),
            Cell::U8(value) => serializer.serialize_u8(*value),
            Cell::Char(value) => serializer.serialize_char(*value),
            Cell::I16(value) => serializer.serialize_i16(*value),
            Cell::I32(value) => serializer.serialize_i32(*value),
            Cell::I64(value) => serializer.serialize_i64(*value),
            Cell::F32(value) => serializer.serialize_f32(*value),
            Cell::F64(value) => serializer.serialize_f64(*value),
            Cell::Decimal(value) => serializer.collect_str(value),
            Cell::DateTime(value) => {
                let text = value.format(&Rfc3339).map_err(S::Error::custom)?;
                serializer.serialize_str(&text)
            }
            Cell::Guid(value) => serializer.collect_str(value),
            Cell::Text(value) => serializer.serialize_str(value),
            Cell::Bytes(value) => serializer.serialize_bytes(value),
            Cell::Json(value) => value.serialize(serializer),
        }
    }
}

/// Statically known column type of a selector's result.
pub trait ColumnType {
    const KIND: CellKind;
    const NULLABLE: bool;
}

/// Normalize a selector result into a cell.
pub trait IntoCell {
    fn into_cell(self) -> Cell;
}

/// Checked recovery of a typed value from a cell.
pub trait FromCell<'a>: Sized {
    const KIND: CellKind;

    fn from_cell(cell: &'a Cell) -> Option<Self>;
}

macro_rules! scalar_cell {
    ($ty:ty, $variant:ident) => {
        impl ColumnType for $ty {
            const KIND: CellKind = CellKind::$variant;
            const NULLABLE: bool = false;
        }

        impl IntoCell for $ty {
            fn into_cell(self) -> Cell {
                Cell::$variant(self)
            }
        }

        impl<'a> FromCell<'a> for $ty {
            const KIND: CellKind = CellKind::$variant;

            fn from_cell(cell: &'a Cell) -> Option<Self> {
                match cell {
                    Cell::$variant(value) => Some(*value),
                    _ => None,
                }
            }
        }
    };
}

scalar_cell!(bool, Bool);
scalar_cell!(u8, U8);
scalar_cell!(char, Char);
scalar_cell!(i16, I16);
scalar_cell!(i32, I32);
scalar_cell!(i64, I64);
scalar_cell!(f32, F32);
scalar_cell!(f64, F64);
scalar_cell!(Decimal, Decimal);
scalar_cell!(OffsetDateTime, DateTime);
scalar_cell!(Uuid, Guid);

macro_rules! reference_cell {
    ($ty:ty, $variant:ident, $convert:expr) => {
        impl ColumnType for $ty {
            const KIND: CellKind = CellKind::$variant;
            const NULLABLE: bool = true;
        }

        impl IntoCell for $ty {
            fn into_cell(self) -> Cell {
                Cell::$variant($convert(self))
            }
        }
    };
}

reference_cell!(String, Text, |value| value);
reference_cell!(&str, Text, str::to_owned);
reference_cell!(Bytes, Bytes, |value| value);
reference_cell!(Vec<u8>, Bytes, Bytes::from);
reference_cell!(&[u8], Bytes, Bytes::copy_from_slice);
reference_cell!(serde_json::Value, Json, |value| value);

impl<'a> FromCell<'a> for &'a str {
    const KIND: CellKind = CellKind::Text;

    fn from_cell(cell: &'a Cell) -> Option<Self> {
        match cell {
            Cell::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

impl<'a> FromCell<'a> for &'a [u8] {
    const KIND: CellKind = CellKind::Bytes;

    fn from_cell(cell: &'a Cell) -> Option<Self> {
        match cell {
            Cell::Bytes(value) => Some(value.as_ref()),
            _ => None,
        }
    }
}

impl<'a> FromCell<'a> for &'a serde_json::Value {
    const KIND: CellKind = CellKind::Json;

    fn from_cell(cell: &'a Cell) -> Option<Self> {
        match cell {
            Cell::Json(value) => Some(value),
            _ => None,
        }
    }
}

impl<T: ColumnType> ColumnType for Option<T> {
    const KIND: CellKind = T::KIND;
    const NULLABLE: bool = true;
}

impl<T: IntoCell> IntoCell for Option<T> {
    fn into_cell(self) -> Cell {
        self.map_or(Cell::Null, IntoCell::into_cell)
    }
}

impl<'a, T: FromCell<'a>> FromCell<'a> for Option<T> {
    const KIND: CellKind = T::KIND;

    fn from_cell(cell: &'a Cell) -> Option<Self> {
        match cell {
            Cell::Null => Some(None),
            other => T::from_cell(other).map(Some),
        }
    }
}

/// Copy `min(len, src.len() - offset)` elements into `buf[buf_offset..]`.
///
/// Returns 0 once `offset` reaches the end of `src`.
pub(crate) fn copy_window<T: Copy>(
    src: &[T],
    offset: usize,
    buf: &mut [T],
    buf_offset: usize,
    len: usize,
) -> Result<usize, Error> {
    let available = src.len().saturating_sub(offset);
    if available == 0 {
        return Ok(0);
    }
    let count = len.min(available);
    let target = buf
        .get_mut(buf_offset..buf_offset.saturating_add(count))
        .ok_or_else(|| {
            Error::new(ErrorKind::InvalidArgument).with_message(format!(
                "buffer too small for {count} elements at offset {buf_offset}"
            ))
        })?;
    target.copy_from_slice(&src[offset..offset + count]);
    Ok(count)
}

/// Windowed copy over the characters of a text value.
pub(crate) fn copy_char_window(
    text: &str,
    offset: usize,
    buf: &mut [char],
    buf_offset: usize,
    len: usize,
) -> Result<usize, Error> {
    let available = text.chars().count().saturating_sub(offset);
    if available == 0 {
        return Ok(0);
    }
    let count = len.min(available);
    let target = buf
        .get_mut(buf_offset..buf_offset.saturating_add(count))
        .ok_or_else(|| {
            Error::new(ErrorKind::InvalidArgument)
                .with_message(format!("buffer too small for {count} chars at offset {buf_offset}"))
        })?;
    for (slot, ch) in target.iter_mut().zip(text.chars().skip(offset)) {
        *slot = ch;
    }
    Ok(count)
}
