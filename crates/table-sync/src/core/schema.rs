//! Column metadata observed on a live source result set.

use serde::{Deserialize, Serialize};
use std::fmt;

/// SQL data type of a result column, keyed by its ODBC type code.
///
/// The code is what the source reported when the result set was opened; it
/// drives both the text-to-value conversion on read and the parameter type
/// chosen when binding into the target insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    Bit,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Float,
    Double,
    Decimal,
    Numeric,
    Char,
    VarChar,
    LongVarChar,
    WChar,
    WVarChar,
    WLongVarChar,
    Binary,
    VarBinary,
    LongVarBinary,
    Date,
    Time,
    Timestamp,
    Guid,
    /// Any type code without a dedicated variant (bound as text).
    Other(i16),
}

impl SqlType {
    /// The ODBC `SQL_*` type code.
    pub fn code(self) -> i16 {
        match self {
            SqlType::Bit => -7,
            SqlType::TinyInt => -6,
            SqlType::SmallInt => 5,
            SqlType::Integer => 4,
            SqlType::BigInt => -5,
            SqlType::Real => 7,
            SqlType::Float => 6,
            SqlType::Double => 8,
            SqlType::Decimal => 3,
            SqlType::Numeric => 2,
            SqlType::Char => 1,
            SqlType::VarChar => 12,
            SqlType::LongVarChar => -1,
            SqlType::WChar => -8,
            SqlType::WVarChar => -9,
            SqlType::WLongVarChar => -10,
            SqlType::Binary => -2,
            SqlType::VarBinary => -3,
            SqlType::LongVarBinary => -4,
            SqlType::Date => 91,
            SqlType::Time => 92,
            SqlType::Timestamp => 93,
            SqlType::Guid => -11,
            SqlType::Other(code) => code,
        }
    }

    /// Map an ODBC `SQL_*` type code back to a type.
    pub fn from_code(code: i16) -> Self {
        match code {
            -7 => SqlType::Bit,
            -6 => SqlType::TinyInt,
            5 => SqlType::SmallInt,
            4 => SqlType::Integer,
            -5 => SqlType::BigInt,
            7 => SqlType::Real,
            6 => SqlType::Float,
            8 => SqlType::Double,
            3 => SqlType::Decimal,
            2 => SqlType::Numeric,
            1 => SqlType::Char,
            12 => SqlType::VarChar,
            -1 => SqlType::LongVarChar,
            -8 => SqlType::WChar,
            -9 => SqlType::WVarChar,
            -10 => SqlType::WLongVarChar,
            -2 => SqlType::Binary,
            -3 => SqlType::VarBinary,
            -4 => SqlType::LongVarBinary,
            91 => SqlType::Date,
            92 => SqlType::Time,
            93 => SqlType::Timestamp,
            -11 => SqlType::Guid,
            other => SqlType::Other(other),
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            SqlType::TinyInt | SqlType::SmallInt | SqlType::Integer | SqlType::BigInt
        )
    }

    pub fn is_floating(self) -> bool {
        matches!(self, SqlType::Real | SqlType::Float | SqlType::Double)
    }

    pub fn is_binary(self) -> bool {
        matches!(
            self,
            SqlType::Binary | SqlType::VarBinary | SqlType::LongVarBinary
        )
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Other(code) => write!(f, "OTHER({})", code),
            other => write!(f, "{:?}", other),
        }
    }
}

/// One result column: its reported name and type.
///
/// A sequence of descriptors is ordered exactly as the source reported it;
/// that order is the positional binding order of the target insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name as reported by the source, used verbatim in SQL.
    pub name: String,

    /// Type observed on the source result set.
    pub sql_type: SqlType,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes_match_odbc() {
        assert_eq!(SqlType::Integer.code(), 4);
        assert_eq!(SqlType::VarChar.code(), 12);
        assert_eq!(SqlType::Timestamp.code(), 93);
        assert_eq!(SqlType::Bit.code(), -7);
    }

    #[test]
    fn test_from_code_inverts_code() {
        for ty in [
            SqlType::Bit,
            SqlType::BigInt,
            SqlType::Double,
            SqlType::Numeric,
            SqlType::WVarChar,
            SqlType::VarBinary,
            SqlType::Date,
            SqlType::Guid,
        ] {
            assert_eq!(SqlType::from_code(ty.code()), ty);
        }
        assert_eq!(SqlType::from_code(-154), SqlType::Other(-154));
    }
}
