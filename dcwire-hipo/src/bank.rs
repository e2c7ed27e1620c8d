//! Typed column access to bank nodes.
//!
//! Bank data is column-major: all values of the first column, then all
//! values of the second, and so on. The value of column `c` in row `r`
//! starts at `offset(c) * rows + r * size(c)`.

use crate::schema::{ColumnType, Schema};

/// Read-only view of one bank inside an event.
#[derive(Debug, Clone, Copy)]
pub struct Bank<'a> {
    schema: &'a Schema,
    data: &'a [u8],
    rows: usize,
}

impl<'a> Bank<'a> {
    #[must_use]
    pub fn new(schema: &'a Schema, data: &'a [u8]) -> Self {
        Self {
            schema,
            data,
            rows: schema.rows_for(data.len()),
        }
    }

    #[must_use]
    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    fn slot(&self, column: usize, row: usize) -> (ColumnType, &'a [u8]) {
        let col = &self.schema.columns()[column];
        assert!(row < self.rows, "row {row} out of {} rows", self.rows);
        let start = col.offset * self.rows + row * col.ty.size();
        (col.ty, &self.data[start..start + col.ty.size()])
    }

    /// Integer value of a cell. Float columns are truncated toward zero.
    ///
    /// # Panics
    /// Panics if `column` or `row` is out of range.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn get_int(&self, column: usize, row: usize) -> i32 {
        let (ty, b) = self.slot(column, row);
        match ty {
            ColumnType::Byte => i32::from(i8::from_le_bytes([b[0]])),
            ColumnType::Short => i32::from(i16::from_le_bytes([b[0], b[1]])),
            ColumnType::Int => i32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            ColumnType::Long => read_i64(b) as i32,
            ColumnType::Float => f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as i32,
            ColumnType::Double => read_f64(b) as i32,
        }
    }

    /// Floating-point value of a cell. Integer columns are converted.
    ///
    /// # Panics
    /// Panics if `column` or `row` is out of range.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn get_float(&self, column: usize, row: usize) -> f32 {
        let (ty, b) = self.slot(column, row);
        match ty {
            ColumnType::Float => f32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            ColumnType::Double => read_f64(b) as f32,
            ColumnType::Long => read_i64(b) as f32,
            _ => self.get_int(column, row) as f32,
        }
    }

    /// Column index lookup, see [`Schema::column_index`].
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.schema.column_index(name)
    }
}

fn read_i64(b: &[u8]) -> i64 {
    i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
}

fn read_f64(b: &[u8]) -> f64 {
    f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
}

/// Builds bank data for writing, column-major like [`Bank`] reads it.
#[derive(Debug, Clone)]
pub struct BankBuilder<'a> {
    schema: &'a Schema,
    rows: usize,
    data: Vec<u8>,
}

impl<'a> BankBuilder<'a> {
    /// Creates a zero-filled bank with `rows` rows.
    #[must_use]
    pub fn new(schema: &'a Schema, rows: usize) -> Self {
        Self {
            schema,
            rows,
            data: vec![0; schema.row_length() * rows],
        }
    }

    #[must_use]
    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn slot_mut(&mut self, column: usize, row: usize) -> (ColumnType, &mut [u8]) {
        let col = &self.schema.columns()[column];
        assert!(row < self.rows, "row {row} out of {} rows", self.rows);
        let start = col.offset * self.rows + row * col.ty.size();
        (col.ty, &mut self.data[start..start + col.ty.size()])
    }

    /// Stores an integer, narrowing to the column type.
    ///
    /// # Panics
    /// Panics if `column` or `row` is out of range.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn put_int(&mut self, column: usize, row: usize, value: i32) -> &mut Self {
        let (ty, slot) = self.slot_mut(column, row);
        match ty {
            ColumnType::Byte => slot.copy_from_slice(&(value as i8).to_le_bytes()),
            ColumnType::Short => slot.copy_from_slice(&(value as i16).to_le_bytes()),
            ColumnType::Int => slot.copy_from_slice(&value.to_le_bytes()),
            ColumnType::Long => slot.copy_from_slice(&i64::from(value).to_le_bytes()),
            ColumnType::Float => slot.copy_from_slice(&(value as f32).to_le_bytes()),
            ColumnType::Double => slot.copy_from_slice(&f64::from(value).to_le_bytes()),
        }
        self
    }

    /// Stores a float. Integer columns receive the truncated value.
    ///
    /// # Panics
    /// Panics if `column` or `row` is out of range.
    #[allow(clippy::cast_possible_truncation)]
    pub fn put_float(&mut self, column: usize, row: usize, value: f32) -> &mut Self {
        let (ty, slot) = self.slot_mut(column, row);
        match ty {
            ColumnType::Float => slot.copy_from_slice(&value.to_le_bytes()),
            ColumnType::Double => slot.copy_from_slice(&f64::from(value).to_le_bytes()),
            _ => return self.put_int(column, row, value as i32),
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hits_schema() -> Schema {
        Schema::new("TimeBasedTrkg::TBHits", 20600, 21)
            .with_column("sector", ColumnType::Byte)
            .with_column("layer", ColumnType::Byte)
            .with_column("superlayer", ColumnType::Byte)
            .with_column("wire", ColumnType::Short)
            .with_column("time", ColumnType::Float)
    }

    #[test]
    fn test_column_major_layout() {
        let schema = hits_schema();
        let mut builder = BankBuilder::new(&schema, 3);
        for row in 0..3 {
            let r = i32::try_from(row).unwrap();
            builder
                .put_int(0, row, r + 1)
                .put_int(3, row, 100 + r)
                .put_float(4, row, 1.5 * r as f32);
        }
        let data = builder.data();
        assert_eq!(data.len(), 3 * 9);
        // sector column first, one byte per row
        assert_eq!(&data[..3], &[1, 2, 3]);
        // wire column starts after three byte columns
        assert_eq!(&data[9..11], &100i16.to_le_bytes());
        assert_eq!(&data[11..13], &101i16.to_le_bytes());

        let bank = Bank::new(&schema, data);
        assert_eq!(bank.rows(), 3);
        assert_eq!(bank.get_int(3, 2), 102);
        assert_eq!(bank.get_int(0, 1), 2);
        assert_relative_eq!(bank.get_float(4, 2), 3.0);
        assert_relative_eq!(bank.get_float(3, 0), 100.0);
    }

    #[test]
    fn test_negative_values_and_conversions() {
        let schema = Schema::new("x", 1, 1)
            .with_column("b", ColumnType::Byte)
            .with_column("l", ColumnType::Long)
            .with_column("d", ColumnType::Double);
        let mut builder = BankBuilder::new(&schema, 1);
        builder
            .put_int(0, 0, -3)
            .put_int(1, 0, -70_000)
            .put_float(2, 0, 2.75);

        let bank = Bank::new(&schema, builder.data());
        assert_eq!(bank.get_int(0, 0), -3);
        assert_eq!(bank.get_int(1, 0), -70_000);
        assert_eq!(bank.get_int(2, 0), 2);
        assert_relative_eq!(bank.get_float(2, 0), 2.75);
    }

    #[test]
    fn test_partial_rows_are_ignored() {
        let schema = hits_schema();
        let bank = Bank::new(&schema, &[0u8; 20]);
        assert_eq!(bank.rows(), 2);
        assert!(Bank::new(&schema, &[]).is_empty());
    }

    #[test]
    #[should_panic(expected = "out of 2 rows")]
    fn test_row_out_of_range_panics() {
        let schema = hits_schema();
        let data = [0u8; 18];
        let bank = Bank::new(&schema, &data);
        let _ = bank.get_int(0, 2);
    }
}
