//! SQL column conversions for the crawler's enums

use crate::state::{Category, RenderMode, UrlStatus};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

macro_rules! text_column {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.to_db_string()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                <$ty>::from_db_string(text).ok_or_else(|| {
                    FromSqlError::Other(format!("unknown {} value '{}'", stringify!($ty), text).into())
                })
            }
        }
    };
}

text_column!(UrlStatus);
text_column!(Category);
text_column!(RenderMode);
