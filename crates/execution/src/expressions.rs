//! Physical expressions: logical expressions bound to input column ordinals.
//!
//! Evaluation contract:
//! - every evaluation returns a [`Vector`] aligned with the input batch row count
//! - aggregate wrappers are never evaluated here; the aggregate operators
//!   evaluate their operands and fold them through accumulators

use std::fmt;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Datum, Float64Array, Int32Array, Int64Array, StringArray,
};
use arrow::compute::kernels::{
    boolean::{and_kleene, or_kleene},
    cmp::{eq, gt, gt_eq, lt, lt_eq, neq},
};
use arrow_schema::DataType;
use tdf_common::{Batch, Result, ScalarValue, TdfError, Vector};
use tdf_planner::{AggregateFunction, BinaryOp};

#[derive(Debug, Clone, PartialEq)]
pub enum PhysicalExpr {
    /// Input column at `index`.
    Column { index: usize, data_type: DataType },
    Literal(ScalarValue),
    Binary {
        left: Box<PhysicalExpr>,
        op: BinaryOp,
        right: Box<PhysicalExpr>,
    },
    /// Carried through planning so aggregate operators know which function
    /// to fold; not evaluable.
    Aggregate {
        func: AggregateFunction,
        expr: Box<PhysicalExpr>,
    },
}

impl PhysicalExpr {
    pub fn data_type(&self) -> Result<DataType> {
        match self {
            PhysicalExpr::Column { data_type, .. } => Ok(data_type.clone()),
            PhysicalExpr::Literal(v) => v.data_type().ok_or_else(|| {
                TdfError::Planning("untyped null literal".to_string())
            }),
            PhysicalExpr::Binary { .. } => Ok(DataType::Boolean),
            PhysicalExpr::Aggregate { func, expr } => func.return_type(&expr.data_type()?),
        }
    }

    /// Evaluates this expression for every row of `batch`.
    ///
    /// # Panics
    /// On [`PhysicalExpr::Aggregate`]. Aggregates are folded by the aggregate
    /// operators; reaching this is a planner bug, not a data error.
    pub fn evaluate(&self, batch: &Batch) -> Result<Vector> {
        match self {
            PhysicalExpr::Column { index, .. } => batch.column(*index).cloned().ok_or_else(|| {
                TdfError::Execution(format!(
                    "column #{index} out of range for batch with {} columns",
                    batch.num_columns()
                ))
            }),
            PhysicalExpr::Literal(v) => Vector::constant(v, batch.num_rows()),
            PhysicalExpr::Binary { left, op, right } => {
                let l = left.evaluate(batch)?;
                let r = right.evaluate(batch)?;
                evaluate_binary(*op, &l, &r)
            }
            PhysicalExpr::Aggregate { .. } => panic!(
                "aggregate expression {self} evaluated row-wise; only aggregate operators may fold it"
            ),
        }
    }
}

/// Elementwise `l op r`.
///
/// Operands must have the same length and the same element type.
pub fn evaluate_binary(op: BinaryOp, l: &Vector, r: &Vector) -> Result<Vector> {
    if l.len() != r.len() {
        return Err(TdfError::Type(format!(
            "operands of {op} do not have the same length: {} vs {}",
            l.len(),
            r.len()
        )));
    }
    if l.data_type() != r.data_type() {
        return Err(TdfError::Type(format!(
            "type mismatch for {op}: {:?} vs {:?}",
            l.data_type(),
            r.data_type()
        )));
    }
    let out = match op {
        BinaryOp::And | BinaryOp::Or => {
            let (la, ra) = (l.as_boolean()?, r.as_boolean()?);
            let res = if op == BinaryOp::And {
                and_kleene(la, ra)
            } else {
                or_kleene(la, ra)
            };
            res.map_err(|e| TdfError::Execution(format!("boolean kernel failed: {e}")))?
        }
        _ => match l.data_type() {
            DataType::Int32 => eval_cmp::<Int32Array>(op, l.array(), r.array())?,
            DataType::Int64 => eval_cmp::<Int64Array>(op, l.array(), r.array())?,
            DataType::Float64 => eval_cmp::<Float64Array>(op, l.array(), r.array())?,
            DataType::Utf8 => eval_cmp::<StringArray>(op, l.array(), r.array())?,
            DataType::Boolean => eval_cmp::<BooleanArray>(op, l.array(), r.array())?,
            other => {
                return Err(TdfError::Type(format!(
                    "comparison not supported for {other:?}"
                )))
            }
        },
    };
    Vector::try_new(Arc::new(out))
}

fn eval_cmp<T>(op: BinaryOp, l: &ArrayRef, r: &ArrayRef) -> Result<BooleanArray>
where
    T: Array + Datum + 'static,
{
    let (la, ra) = (downcast::<T>(l)?, downcast::<T>(r)?);
    match op {
        BinaryOp::Eq => eq(la, ra),
        BinaryOp::NotEq => neq(la, ra),
        BinaryOp::Lt => lt(la, ra),
        BinaryOp::LtEq => lt_eq(la, ra),
        BinaryOp::Gt => gt(la, ra),
        BinaryOp::GtEq => gt_eq(la, ra),
        BinaryOp::And | BinaryOp::Or => {
            return Err(TdfError::Execution(format!("{op} is not a comparison")))
        }
    }
    .map_err(|e| TdfError::Execution(format!("cmp kernel failed: {e}")))
}

fn downcast<T: Array + 'static>(a: &ArrayRef) -> Result<&T> {
    a.as_any().downcast_ref::<T>().ok_or_else(|| {
        TdfError::Execution(format!("array does not match type {:?}", a.data_type()))
    })
}

impl fmt::Display for PhysicalExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicalExpr::Column { index, .. } => write!(f, "#{index}"),
            PhysicalExpr::Literal(ScalarValue::Utf8(s)) => write!(f, "'{s}'"),
            PhysicalExpr::Literal(v) => write!(f, "{v}"),
            PhysicalExpr::Binary { left, op, right } => write!(f, "{left} {op} {right}"),
            PhysicalExpr::Aggregate { func, expr } => write!(f, "{}({expr})", func.name()),
        }
    }
}
