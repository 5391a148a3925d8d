use std::fmt;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, BooleanBuilder, Float64Array, Float64Builder, Int32Array,
    Int32Builder, Int64Array, Int64Builder, StringArray, StringBuilder,
};
use arrow::compute::concat;
use arrow_schema::DataType;

use super::scalar::ScalarValue;
use super::schema::is_supported_type;
use crate::error::{Result, TdfError};

/// One typed column of fixed length.
///
/// Cloning is cheap: the backing arrow buffers are reference counted, so a
/// column reference evaluated against a batch is a view, not a copy.
#[derive(Debug, Clone)]
pub struct Vector {
    array: ArrayRef,
}

impl Vector {
    pub fn try_new(array: ArrayRef) -> Result<Self> {
        if !is_supported_type(array.data_type()) {
            return Err(TdfError::Type(format!(
                "unsupported vector element type {:?}",
                array.data_type()
            )));
        }
        Ok(Self { array })
    }

    /// `len` copies of `value`. Nulls have no type and are rejected.
    pub fn constant(value: &ScalarValue, len: usize) -> Result<Self> {
        let array: ArrayRef = match value {
            ScalarValue::Boolean(v) => Arc::new(BooleanArray::from(vec![*v; len])),
            ScalarValue::Int32(v) => Arc::new(Int32Array::from(vec![*v; len])),
            ScalarValue::Int64(v) => Arc::new(Int64Array::from(vec![*v; len])),
            ScalarValue::Float64(v) => Arc::new(Float64Array::from(vec![*v; len])),
            ScalarValue::Utf8(v) => Arc::new(StringArray::from(vec![v.as_str(); len])),
            ScalarValue::Null => {
                return Err(TdfError::Type(
                    "cannot build a constant vector from an untyped null".to_string(),
                ))
            }
        };
        Ok(Self { array })
    }

    /// Builds a column of type `dt`. Nulls become null slots.
    pub fn from_scalars(values: &[ScalarValue], dt: &DataType) -> Result<Self> {
        let mismatch = |v: &ScalarValue| {
            TdfError::Type(format!("cannot place value '{v}' in a {dt:?} vector"))
        };
        let array: ArrayRef = match dt {
            DataType::Int32 => {
                let mut b = Int32Builder::with_capacity(values.len());
                for v in values {
                    match v {
                        ScalarValue::Int32(x) => b.append_value(*x),
                        ScalarValue::Null => b.append_null(),
                        other => return Err(mismatch(other)),
                    }
                }
                Arc::new(b.finish())
            }
            DataType::Int64 => {
                let mut b = Int64Builder::with_capacity(values.len());
                for v in values {
                    match v {
                        ScalarValue::Int64(x) => b.append_value(*x),
                        ScalarValue::Int32(x) => b.append_value(i64::from(*x)),
                        ScalarValue::Null => b.append_null(),
                        other => return Err(mismatch(other)),
                    }
                }
                Arc::new(b.finish())
            }
            DataType::Float64 => {
                let mut b = Float64Builder::with_capacity(values.len());
                for v in values {
                    match v {
                        ScalarValue::Float64(x) => b.append_value(*x),
                        ScalarValue::Null => b.append_null(),
                        other => return Err(mismatch(other)),
                    }
                }
                Arc::new(b.finish())
            }
            DataType::Utf8 => {
                let mut b = StringBuilder::with_capacity(values.len(), values.len() * 8);
                for v in values {
                    match v {
                        ScalarValue::Utf8(x) => b.append_value(x),
                        ScalarValue::Null => b.append_null(),
                        other => return Err(mismatch(other)),
                    }
                }
                Arc::new(b.finish())
            }
            DataType::Boolean => {
                let mut b = BooleanBuilder::with_capacity(values.len());
                for v in values {
                    match v {
                        ScalarValue::Boolean(x) => b.append_value(*x),
                        ScalarValue::Null => b.append_null(),
                        other => return Err(mismatch(other)),
                    }
                }
                Arc::new(b.finish())
            }
            other => {
                return Err(TdfError::Type(format!(
                    "unsupported vector element type {other:?}"
                )))
            }
        };
        Ok(Self { array })
    }

    pub fn array(&self) -> &ArrayRef {
        &self.array
    }

    pub fn into_array(self) -> ArrayRef {
        self.array
    }

    pub fn data_type(&self) -> &DataType {
        self.array.data_type()
    }

    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    pub fn value(&self, row: usize) -> Result<ScalarValue> {
        if row >= self.array.len() {
            return Err(TdfError::Execution(format!(
                "row {row} out of bounds for vector of length {}",
                self.array.len()
            )));
        }
        if self.array.is_null(row) {
            return Ok(ScalarValue::Null);
        }
        let any = self.array.as_any();
        let value = match self.array.data_type() {
            DataType::Int32 => any
                .downcast_ref::<Int32Array>()
                .map(|a| ScalarValue::Int32(a.value(row))),
            DataType::Int64 => any
                .downcast_ref::<Int64Array>()
                .map(|a| ScalarValue::Int64(a.value(row))),
            DataType::Float64 => any
                .downcast_ref::<Float64Array>()
                .map(|a| ScalarValue::Float64(a.value(row))),
            DataType::Utf8 => any
                .downcast_ref::<StringArray>()
                .map(|a| ScalarValue::Utf8(a.value(row).to_string())),
            DataType::Boolean => any
                .downcast_ref::<BooleanArray>()
                .map(|a| ScalarValue::Boolean(a.value(row))),
            _ => None,
        };
        value.ok_or_else(|| {
            TdfError::Execution(format!(
                "vector array does not match its type {:?}",
                self.array.data_type()
            ))
        })
    }

    pub fn as_boolean(&self) -> Result<&BooleanArray> {
        self.array
            .as_any()
            .downcast_ref::<BooleanArray>()
            .ok_or_else(|| {
                TdfError::Type(format!(
                    "expected a Boolean vector, got {:?}",
                    self.array.data_type()
                ))
            })
    }

    /// Concatenates `other` onto `self`. Element types must match exactly;
    /// on failure `self` is left untouched.
    pub fn append(&mut self, other: &Vector) -> Result<()> {
        if self.data_type() != other.data_type() {
            return Err(TdfError::Type(format!(
                "cannot append a {:?} vector to a {:?} vector",
                other.data_type(),
                self.data_type()
            )));
        }
        let merged = concat(&[self.array.as_ref(), other.array.as_ref()])
            .map_err(|e| TdfError::Execution(format!("vector append failed: {e}")))?;
        self.array = merged;
        Ok(())
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for row in 0..self.len() {
            if row > 0 {
                write!(f, " ")?;
            }
            match self.value(row) {
                Ok(v) => write!(f, "{v}")?,
                Err(_) => write!(f, "?")?,
            }
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Vector {
        Vector::try_new(Arc::new(Int64Array::from(values.to_vec()))).expect("vector")
    }

    #[test]
    fn append_same_type_concatenates() {
        let mut v = ints(&[1, 2]);
        v.append(&ints(&[3])).expect("append");
        assert_eq!(v.len(), 3);
        assert_eq!(v.value(2).expect("value"), ScalarValue::Int64(3));
        assert_eq!(v.to_string(), "[1 2 3]");
    }

    #[test]
    fn append_other_type_fails_and_keeps_original() {
        let mut v = ints(&[1, 2]);
        let other = Vector::try_new(Arc::new(StringArray::from(vec!["x"]))).expect("vector");
        let err = v.append(&other).expect_err("type mismatch");
        assert!(matches!(err, TdfError::Type(_)));
        assert_eq!(v.len(), 2);
        assert_eq!(v.to_string(), "[1 2]");
    }

    #[test]
    fn constant_repeats_value() {
        let v = Vector::constant(&ScalarValue::Utf8("a".to_string()), 3).expect("constant");
        assert_eq!(v.data_type(), &DataType::Utf8);
        assert_eq!(v.to_string(), "[a a a]");
        assert!(Vector::constant(&ScalarValue::Null, 3).is_err());
    }

    #[test]
    fn from_scalars_keeps_nulls() {
        let v = Vector::from_scalars(
            &[ScalarValue::Int64(4), ScalarValue::Null],
            &DataType::Int64,
        )
        .expect("vector");
        assert_eq!(v.value(1).expect("value"), ScalarValue::Null);
        assert!(Vector::from_scalars(&[ScalarValue::Boolean(true)], &DataType::Int64).is_err());
    }

    #[test]
    fn unsupported_array_type_is_rejected() {
        let arr = Arc::new(arrow::array::UInt8Array::from(vec![1_u8]));
        assert!(matches!(Vector::try_new(arr), Err(TdfError::Type(_))));
    }
}
