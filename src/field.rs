//! Standard fields every source column is mapped onto.
//!
//! A [`Field`] is one of seven fixed semantic columns. Its key (`phone`,
//! `name`, ...) is the identity used in configuration files and reports; its
//! label (`Телефон`, `ФИО`, ...) is what users see in previews and exported
//! sheets.
//!
//! [`classify_by_keyword()`] is the baseline mapping heuristic applied to every
//! column before any learning happens.

use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Phone,
    Name,
    Operator,
    Region,
    Time,
    Birth,
    Personal,
}

impl Field {
    /// All fields in display and export order.
    pub const ALL: [Field; 7] = [
        Field::Phone,
        Field::Name,
        Field::Operator,
        Field::Region,
        Field::Time,
        Field::Birth,
        Field::Personal,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Field::Phone => "phone",
            Field::Name => "name",
            Field::Operator => "operator",
            Field::Region => "region",
            Field::Time => "time",
            Field::Birth => "birth",
            Field::Personal => "personal",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Field::Phone => "Телефон",
            Field::Name => "ФИО",
            Field::Operator => "Оператор",
            Field::Region => "Регион",
            Field::Time => "Время",
            Field::Birth => "Дата рождения/Возраст",
            Field::Personal => "Личные данные",
        }
    }

    /// Lower-case substrings that identify a column as this field.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Field::Phone => &["телефон", "phone"],
            Field::Name => &["фио", "имя", "name"],
            Field::Operator => &["оператор", "operator"],
            Field::Region => &["регион", "region"],
            Field::Time => &["время", "time"],
            Field::Birth => &["возраст", "рожден", "birth"],
            Field::Personal => &["паспорт", "личн", "personal"],
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Field {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().to_lowercase();
        Field::ALL
            .into_iter()
            .find(|field| field.key() == normalized || field.label().to_lowercase() == normalized)
            .ok_or_else(|| anyhow!("Unknown field '{value}'"))
    }
}

/// Maps a raw column name to a field by keyword containment.
///
/// Fields are tested in [`Field::ALL`] order and the first hit wins, so a
/// column called "Phone name" is a phone column.
pub fn classify_by_keyword(column: &str) -> Option<Field> {
    let lowered = column.to_lowercase();
    Field::ALL.into_iter().find(|field| {
        field
            .keywords()
            .iter()
            .any(|keyword| lowered.contains(keyword))
    })
}

/// A cell counts as populated when it is neither empty nor the `-` placeholder.
pub fn is_populated(value: &str) -> bool {
    !value.is_empty() && value != "-"
}
