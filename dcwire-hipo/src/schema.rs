//! Bank schemas and the file dictionary.
//!
//! A schema describes one bank: its name, the (group, item) pair used to
//! find its node inside an event, and the ordered list of typed columns.
//! Schemas are stored as JSON strings in the dictionary record:
//!
//! ```json
//! {"name":"TimeBasedTrkg::TBHits","group":20600,"item":21,"info":"",
//!  "entries":[{"name":"sector","type":"B","info":""}, ...]}
//! ```
//!
//! Older files use the compact text form
//! `{TimeBasedTrkg::TBHits/20600/21}{sector/B,layer/B,wire/S}`.

use crate::event::Event;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Dictionary node holding a JSON schema.
pub const DICTIONARY_JSON_NODE: (u16, u8) = (120, 2);
/// Dictionary node holding a legacy text schema.
pub const DICTIONARY_TEXT_NODE: (u16, u8) = (120, 1);

/// Column value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Byte,
    Short,
    Int,
    Float,
    Double,
    Long,
}

impl ColumnType {
    /// Parses a one-letter type code.
    ///
    /// # Errors
    /// Returns an error for unknown codes.
    pub fn from_code(code: &str) -> Result<Self> {
        match code.trim() {
            "B" => Ok(ColumnType::Byte),
            "S" => Ok(ColumnType::Short),
            "I" => Ok(ColumnType::Int),
            "F" => Ok(ColumnType::Float),
            "D" => Ok(ColumnType::Double),
            "L" => Ok(ColumnType::Long),
            other => Err(Error::Schema(format!("unknown column type '{other}'"))),
        }
    }

    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            ColumnType::Byte => "B",
            ColumnType::Short => "S",
            ColumnType::Int => "I",
            ColumnType::Float => "F",
            ColumnType::Double => "D",
            ColumnType::Long => "L",
        }
    }

    /// Size of one value in bytes.
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            ColumnType::Byte => 1,
            ColumnType::Short => 2,
            ColumnType::Int | ColumnType::Float => 4,
            ColumnType::Double | ColumnType::Long => 8,
        }
    }
}

/// One column of a bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
    /// Byte offset of this column within one row.
    pub offset: usize,
}

/// Layout of one bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    name: String,
    group: u16,
    item: u8,
    columns: Vec<Column>,
    row_length: usize,
}

#[derive(Serialize, Deserialize)]
struct SchemaJson {
    name: String,
    group: u16,
    item: u8,
    #[serde(default)]
    info: String,
    entries: Vec<EntryJson>,
}

#[derive(Serialize, Deserialize)]
struct EntryJson {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    info: String,
}

impl Schema {
    #[must_use]
    pub fn new(name: impl Into<String>, group: u16, item: u8) -> Self {
        Self {
            name: name.into(),
            group,
            item,
            columns: Vec::new(),
            row_length: 0,
        }
    }

    /// Appends a column.
    #[must_use]
    pub fn with_column(mut self, name: impl Into<String>, ty: ColumnType) -> Self {
        self.columns.push(Column {
            name: name.into(),
            ty,
            offset: self.row_length,
        });
        self.row_length += ty.size();
        self
    }

    /// Parses either the JSON or the legacy text form.
    ///
    /// # Errors
    /// Returns an error if the text is neither valid form.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
        if text.starts_with("{\"") || text.starts_with("{ \"") {
            Self::from_json(text)
        } else {
            Self::from_text(text)
        }
    }

    /// Parses a JSON schema string.
    ///
    /// # Errors
    /// Returns an error on malformed JSON or unknown column types.
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: SchemaJson = serde_json::from_str(text)?;
        raw.entries.iter().try_fold(
            Self::new(raw.name, raw.group, raw.item),
            |schema, entry| Ok(schema.with_column(&entry.name, ColumnType::from_code(&entry.ty)?)),
        )
    }

    /// Parses the legacy `{name/group/item}{col/T,...}` form.
    ///
    /// # Errors
    /// Returns an error if the text does not follow that form.
    pub fn from_text(text: &str) -> Result<Self> {
        let malformed = || Error::Schema(format!("malformed schema '{text}'"));

        let rest = text.strip_prefix('{').ok_or_else(malformed)?;
        let (head, rest) = rest.split_once('}').ok_or_else(malformed)?;
        let body = rest
            .trim()
            .strip_prefix('{')
            .and_then(|b| b.strip_suffix('}'))
            .ok_or_else(malformed)?;

        let mut parts = head.split('/');
        let (Some(name), Some(group), Some(item), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };
        let group = group.trim().parse().map_err(|_| malformed())?;
        let item = item.trim().parse().map_err(|_| malformed())?;

        body.split(',')
            .filter(|entry| !entry.trim().is_empty())
            .try_fold(Self::new(name.trim(), group, item), |schema, entry| {
                let (col, ty) = entry.split_once('/').ok_or_else(malformed)?;
                Ok(schema.with_column(col.trim(), ColumnType::from_code(ty)?))
            })
    }

    /// Serializes to the JSON form written into dictionaries.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        let raw = SchemaJson {
            name: self.name.clone(),
            group: self.group,
            item: self.item,
            info: String::new(),
            entries: self
                .columns
                .iter()
                .map(|c| EntryJson {
                    name: c.name.clone(),
                    ty: c.ty.code().to_string(),
                    info: String::new(),
                })
                .collect(),
        };
        Ok(serde_json::to_string(&raw)?)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn group(&self) -> u16 {
        self.group
    }

    #[must_use]
    pub fn item(&self) -> u8 {
        self.item
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Bytes per row, the sum of all column sizes.
    #[must_use]
    pub fn row_length(&self) -> usize {
        self.row_length
    }

    /// Index of a column by name.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Like [`Schema::column_index`], but missing columns are an error.
    ///
    /// # Errors
    /// Returns [`Error::MissingColumn`] if the column does not exist.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| Error::MissingColumn {
            bank: self.name.clone(),
            column: name.to_string(),
        })
    }

    /// Number of rows held in `data_len` bytes of bank data.
    #[must_use]
    pub fn rows_for(&self, data_len: usize) -> usize {
        if self.row_length == 0 {
            0
        } else {
            data_len / self.row_length
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}/{}/{}}}{{", self.name, self.group, self.item)?;
        for (i, c) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}/{}", c.name, c.ty.code())?;
        }
        write!(f, "}}")
    }
}

/// All bank schemas known to a file, keyed by bank name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictionary {
    schemas: HashMap<String, Schema>,
}

impl Dictionary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a schema, replacing any previous one with the same name.
    pub fn add(&mut self, schema: Schema) {
        self.schemas.insert(schema.name.clone(), schema);
    }

    /// Reads the schema string carried by one dictionary event.
    ///
    /// Returns `Ok(false)` if the event holds no schema node.
    ///
    /// # Errors
    /// Returns an error if the schema string cannot be parsed.
    pub fn add_from_event(&mut self, event: &Event) -> Result<bool> {
        let (group, item) = DICTIONARY_JSON_NODE;
        let text = event
            .string(group, item)
            .or_else(|| event.string(DICTIONARY_TEXT_NODE.0, DICTIONARY_TEXT_NODE.1));
        match text {
            Some(text) => {
                self.add(Schema::parse(text)?);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    /// Like [`Dictionary::get`], but missing banks are an error.
    ///
    /// # Errors
    /// Returns [`Error::MissingBank`] if the bank is not in the dictionary.
    pub fn require(&self, name: &str) -> Result<&Schema> {
        self.get(name)
            .ok_or_else(|| Error::MissingBank(name.to_string()))
    }

    /// Schemas sorted by bank name.
    #[must_use]
    pub fn schemas(&self) -> Vec<&Schema> {
        let mut all: Vec<&Schema> = self.schemas.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl FromIterator<Schema> for Dictionary {
    fn from_iter<I: IntoIterator<Item = Schema>>(iter: I) -> Self {
        let mut dict = Self::new();
        for schema in iter {
            dict.add(schema);
        }
        dict
    }
}
