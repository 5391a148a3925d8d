use arrow_schema::{DataType, Schema};

use crate::error::{Result, TdfError};

/// Element types a [`crate::Vector`] may carry.
pub fn is_supported_type(dt: &DataType) -> bool {
    matches!(
        dt,
        DataType::Int32 | DataType::Int64 | DataType::Float64 | DataType::Utf8 | DataType::Boolean
    )
}

/// Name-based helpers over an arrow [`Schema`].
pub trait SchemaExt {
    /// New schema holding `names` in the requested order.
    fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Schema>;

    fn ordinal_of(&self, name: &str) -> Option<usize>;
}

impl SchemaExt for Schema {
    fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Schema> {
        let mut fields = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let idx = self.ordinal_of(name).ok_or_else(|| {
                TdfError::Planning(format!("column '{name}' not found in schema"))
            })?;
            fields.push(self.field(idx).clone());
        }
        Ok(Schema::new(fields))
    }

    fn ordinal_of(&self, name: &str) -> Option<usize> {
        self.fields().iter().position(|f| f.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_schema::Field;

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("c1", DataType::Int64, false),
            Field::new("c2", DataType::Int64, false),
            Field::new("c3", DataType::Utf8, true),
        ])
    }

    #[test]
    fn select_follows_requested_order() {
        let s = schema().select(&["c3", "c1"]).expect("select");
        let names: Vec<_> = s.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["c3", "c1"]);
        assert_eq!(s.field(0).data_type(), &DataType::Utf8);
    }

    #[test]
    fn select_unknown_column_fails() {
        let err = schema().select(&["nope"]).expect_err("must fail");
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn ordinal_lookup() {
        assert_eq!(schema().ordinal_of("c2"), Some(1));
        assert_eq!(schema().ordinal_of("C2"), None);
    }
}
