//! Per-group aggregation state.

use std::cmp::Ordering;
use std::fmt;

use arrow_schema::DataType;
use tdf_common::{Result, ScalarValue, TdfError};
use tdf_planner::AggregateFunction;

/// Mutable fold over the values of one aggregate expression within one group.
///
/// Null inputs are ignored by every accumulator.
pub trait Accumulator: Send + fmt::Debug {
    fn accumulate(&mut self, value: &ScalarValue) -> Result<()>;
    fn final_value(&self) -> ScalarValue;
}

/// Creates a fresh accumulator for `func` over operands of `input_type`.
pub fn create_accumulator(
    func: AggregateFunction,
    input_type: &DataType,
) -> Result<Box<dyn Accumulator>> {
    let output = func
        .return_type(input_type)
        .map_err(|e| TdfError::Planning(e.to_string()))?;
    Ok(match func {
        AggregateFunction::Sum => Box::new(SumAccumulator::new(output)),
        AggregateFunction::Count => Box::new(CountAccumulator::default()),
        AggregateFunction::Min => Box::new(ExtremumAccumulator::new(input_type.clone(), Ordering::Less)),
        AggregateFunction::Max => {
            Box::new(ExtremumAccumulator::new(input_type.clone(), Ordering::Greater))
        }
        AggregateFunction::Avg => Box::new(AvgAccumulator::default()),
    })
}

/// Sum of integers (as Int64, overflow checked) or floats.
#[derive(Debug)]
pub struct SumAccumulator {
    output: DataType,
    sum: Option<ScalarValue>,
}

impl SumAccumulator {
    pub fn new(output: DataType) -> Self {
        Self { output, sum: None }
    }
}

impl Accumulator for SumAccumulator {
    fn accumulate(&mut self, value: &ScalarValue) -> Result<()> {
        let next = match (&self.output, value) {
            (_, ScalarValue::Null) => return Ok(()),
            (DataType::Int64, ScalarValue::Int32(v)) => add_int(&self.sum, i64::from(*v))?,
            (DataType::Int64, ScalarValue::Int64(v)) => add_int(&self.sum, *v)?,
            (DataType::Float64, ScalarValue::Float64(v)) => match &self.sum {
                Some(ScalarValue::Float64(acc)) => ScalarValue::Float64(acc + v),
                _ => ScalarValue::Float64(*v),
            },
            (out, other) => {
                return Err(TdfError::Type(format!(
                    "sum producing {out:?} cannot accept value '{other}'"
                )))
            }
        };
        self.sum = Some(next);
        Ok(())
    }

    fn final_value(&self) -> ScalarValue {
        self.sum.clone().unwrap_or(ScalarValue::Null)
    }
}

fn add_int(acc: &Option<ScalarValue>, v: i64) -> Result<ScalarValue> {
    match acc {
        Some(ScalarValue::Int64(a)) => a
            .checked_add(v)
            .map(ScalarValue::Int64)
            .ok_or_else(|| TdfError::Execution("sum overflowed Int64".to_string())),
        _ => Ok(ScalarValue::Int64(v)),
    }
}

/// Number of non-null values.
#[derive(Debug, Default)]
pub struct CountAccumulator {
    count: i64,
}

impl Accumulator for CountAccumulator {
    fn accumulate(&mut self, value: &ScalarValue) -> Result<()> {
        if !value.is_null() {
            self.count += 1;
        }
        Ok(())
    }

    fn final_value(&self) -> ScalarValue {
        ScalarValue::Int64(self.count)
    }
}

/// Min (`keep == Less`) or max (`keep == Greater`).
#[derive(Debug)]
pub struct ExtremumAccumulator {
    input_type: DataType,
    keep: Ordering,
    current: Option<ScalarValue>,
}

impl ExtremumAccumulator {
    pub fn new(input_type: DataType, keep: Ordering) -> Self {
        Self {
            input_type,
            keep,
            current: None,
        }
    }
}

impl Accumulator for ExtremumAccumulator {
    fn accumulate(&mut self, value: &ScalarValue) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        if value.data_type().as_ref() != Some(&self.input_type) {
            return Err(TdfError::Type(format!(
                "value '{value}' does not match aggregate input type {:?}",
                self.input_type
            )));
        }
        let replace = match &self.current {
            Some(cur) => value.total_cmp(cur) == self.keep,
            None => true,
        };
        if replace {
            self.current = Some(value.clone());
        }
        Ok(())
    }

    fn final_value(&self) -> ScalarValue {
        self.current.clone().unwrap_or(ScalarValue::Null)
    }
}

/// Arithmetic mean as Float64.
#[derive(Debug, Default)]
pub struct AvgAccumulator {
    sum: f64,
    count: u64,
}

impl Accumulator for AvgAccumulator {
    fn accumulate(&mut self, value: &ScalarValue) -> Result<()> {
        let v = match value {
            ScalarValue::Null => return Ok(()),
            ScalarValue::Int32(v) => f64::from(*v),
            ScalarValue::Int64(v) => *v as f64,
            ScalarValue::Float64(v) => *v,
            other => {
                return Err(TdfError::Type(format!(
                    "avg cannot accept non-numeric value '{other}'"
                )))
            }
        };
        self.sum += v;
        self.count += 1;
        Ok(())
    }

    fn final_value(&self) -> ScalarValue {
        if self.count == 0 {
            ScalarValue::Null
        } else {
            ScalarValue::Float64(self.sum / self.count as f64)
        }
    }
}
