//! Identifier newtypes.
//!
//! Apple beacon ids and Google canonic ids live in disjoint key spaces.
//! Each gets its own type so one can never be passed where the other is
//! expected. No conversion exists between them.

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.0.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                String::column_result(value).map(Self)
            }
        }
    };
}

string_id!(
    /// Identifier of an Apple offline-finding beacon.
    BeaconId
);

string_id!(
    /// Identifier assigned to a tracker by the Google Find My Device service.
    CanonicId
);

string_id!(
    /// Identifier of a raw import operation.
    ImportId
);

string_id!(
    /// Identifier of a beacon naming record.
    NamingRecordId
);

impl ImportId {
    /// Generate a fresh random import id.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("imp_{}", uuid::Uuid::new_v4().simple()))
    }
}
