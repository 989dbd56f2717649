//! What a SELECT reads, and how rows map back onto Rust values.
//!
//! A [`Selection`] is one item of the select list: a whole table, one column, or an
//! aggregate. A [`SelectList`] is one selection or a tuple of them; it fixes the row type the
//! query yields. The [`Layout`] records where each selection starts in the result row and
//! whether it may be absent because of an outer join.

use std::marker::PhantomData;

use litemodel_core::{ColumnRef, Field, FieldType, Result, Row, Table, TableInfo, quote_ident};

/// Rendered select-list item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectItem {
    pub sql: String,
    /// Number of result columns the item produces
    pub width: usize,
    /// Table the item reads from, if any
    pub table: Option<&'static TableInfo>,
}

/// One item of a select list.
pub trait Selection {
    type Output;

    fn item(&self) -> SelectItem;

    /// Build the output from `row`, starting at column `offset`.
    fn read(&self, row: &Row, offset: usize) -> Result<Self::Output>;

    /// Whether the columns at `offset` describe a missing outer-join side.
    fn is_missing(&self, row: &Row, offset: usize) -> bool;
}

/// Every column of `T`, read back as a `T`.
pub struct All<T>(PhantomData<fn() -> T>);

/// Select a whole table: `` `t`.* ``.
pub fn all<T: Table>() -> All<T> {
    All(PhantomData)
}

impl<T> Clone for All<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for All<T> {}

impl<T: Table> std::fmt::Debug for All<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "All({})", T::TABLE_NAME)
    }
}

impl<T: Table> Selection for All<T> {
    type Output = T;

    fn item(&self) -> SelectItem {
        let info = T::info();
        SelectItem {
            sql: format!("{}.*", quote_ident(info.name)),
            width: info.width(),
            table: Some(info),
        }
    }

    fn read(&self, row: &Row, offset: usize) -> Result<T> {
        T::from_row(row, offset)
    }

    fn is_missing(&self, row: &Row, offset: usize) -> bool {
        let info = T::info();
        match info.primary_key() {
            Some((index, _)) => row.is_null(offset + index),
            None => row.all_null(offset, info.width()),
        }
    }
}

impl<T: Table, V: FieldType> Selection for Field<T, V> {
    type Output = V;

    fn item(&self) -> SelectItem {
        SelectItem {
            sql: self.column().qualified(),
            width: 1,
            table: Some(T::info()),
        }
    }

    fn read(&self, row: &Row, offset: usize) -> Result<V> {
        row.get_as::<V>(offset)
    }

    fn is_missing(&self, row: &Row, offset: usize) -> bool {
        row.is_null(offset)
    }
}

/// `COUNT(...)` over a column, distinct values of a column, or every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Count {
    column: Option<ColumnRef>,
    table: Option<&'static TableInfo>,
    distinct: bool,
}

/// `COUNT(col)`: rows where `field` is not NULL.
pub fn count<T: Table, V>(field: Field<T, V>) -> Count {
    Count {
        column: Some(field.column()),
        table: Some(T::info()),
        distinct: false,
    }
}

/// `COUNT(DISTINCT col)`.
pub fn count_distinct<T: Table, V>(field: Field<T, V>) -> Count {
    Count {
        column: Some(field.column()),
        table: Some(T::info()),
        distinct: true,
    }
}

/// `COUNT(*)`. Names no table, so the query needs `from::<T>()` or another selection.
pub fn count_all() -> Count {
    Count {
        column: None,
        table: None,
        distinct: false,
    }
}

impl Selection for Count {
    type Output = i64;

    fn item(&self) -> SelectItem {
        let sql = match (self.column, self.distinct) {
            (Some(column), true) => format!("COUNT(DISTINCT {})", column.qualified()),
            (Some(column), false) => format!("COUNT({})", column.qualified()),
            (None, _) => "COUNT(*)".to_string(),
        };
        SelectItem {
            sql,
            width: 1,
            table: self.table,
        }
    }

    fn read(&self, row: &Row, offset: usize) -> Result<i64> {
        row.get_as::<i64>(offset)
    }

    fn is_missing(&self, row: &Row, offset: usize) -> bool {
        row.is_null(offset)
    }
}

/// Column offsets and optionality of each selection in a result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub offsets: Vec<usize>,
    pub optional: Vec<bool>,
    /// Total number of result columns
    pub width: usize,
}

impl Layout {
    /// Lay out `items` left to right. An item is optional when its table is one of
    /// `nullable`.
    pub fn new(items: &[SelectItem], nullable: &[&str]) -> Self {
        let mut offsets = Vec::with_capacity(items.len());
        let mut optional = Vec::with_capacity(items.len());
        let mut width = 0;
        for item in items {
            offsets.push(width);
            optional.push(item.table.is_some_and(|t| nullable.contains(&t.name)));
            width += item.width;
        }
        Self {
            offsets,
            optional,
            width,
        }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// The full select list of a query.
pub trait SelectList {
    /// What each result row materializes into.
    type Row;

    fn items(&self) -> Vec<SelectItem>;

    fn read_row(&self, row: &Row, layout: &Layout) -> Result<Self::Row>;
}

macro_rules! impl_single_select_list {
    ($([$($generics:tt)*] $ty:ty;)+) => {
        $(
            impl<$($generics)*> SelectList for $ty {
                type Row = <$ty as Selection>::Output;

                fn items(&self) -> Vec<SelectItem> {
                    vec![self.item()]
                }

                fn read_row(&self, row: &Row, _layout: &Layout) -> Result<Self::Row> {
                    self.read(row, 0)
                }
            }
        )+
    };
}

impl_single_select_list! {
    [T: Table] All<T>;
    [T: Table, V: FieldType] Field<T, V>;
    [] Count;
}

fn read_optional<S: Selection>(
    selection: &S,
    row: &Row,
    layout: &Layout,
    k: usize,
) -> Result<Option<S::Output>> {
    let offset = layout.offsets[k];
    if layout.optional[k] && selection.is_missing(row, offset) {
        return Ok(None);
    }
    selection.read(row, offset).map(Some)
}

macro_rules! impl_tuple_select_list {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: Selection),+> SelectList for ($($name,)+) {
            type Row = ($(Option<$name::Output>,)+);

            fn items(&self) -> Vec<SelectItem> {
                vec![$(self.$idx.item()),+]
            }

            fn read_row(&self, row: &Row, layout: &Layout) -> Result<Self::Row> {
                Ok(($(read_optional(&self.$idx, row, layout, $idx)?,)+))
            }
        }
    };
}

impl_tuple_select_list!(A: 0, B: 1);
impl_tuple_select_list!(A: 0, B: 1, C: 2);
impl_tuple_select_list!(A: 0, B: 1, C: 2, D: 3);
impl_tuple_select_list!(A: 0, B: 1, C: 2, D: 3, E: 4);
impl_tuple_select_list!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
impl_tuple_select_list!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
impl_tuple_select_list!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);
