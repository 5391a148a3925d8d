use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use arrow_schema::{DataType, SchemaRef};
use tdf_common::{Batch, Result, ScalarValue, Vector};
use tdf_planner::AggregateFunction;
use tracing::debug;

use super::PhysicalPlan;
use crate::accumulator::{create_accumulator, Accumulator};
use crate::expressions::PhysicalExpr;

/// One aggregate expression: the function and its compiled operand.
#[derive(Debug, Clone)]
pub struct AggregateInput {
    pub func: AggregateFunction,
    pub input: PhysicalExpr,
    pub input_type: DataType,
}

/// Representative group-by values plus one accumulator per aggregate.
#[derive(Debug)]
pub struct GroupEntry {
    pub values: Vec<ScalarValue>,
    pub accumulators: Vec<Box<dyn Accumulator>>,
}

/// Storage for groups seen so far. Owned by exactly one aggregate operator
/// and only mutated through its `callback`.
pub trait GroupTable: Default + Send + fmt::Debug {
    fn get_or_insert_with<F>(&mut self, values: Vec<ScalarValue>, init: F) -> Result<&mut GroupEntry>
    where
        F: FnOnce() -> Result<Vec<Box<dyn Accumulator>>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes and returns every group in the table's output order.
    fn drain(&mut self) -> Vec<GroupEntry>;
}

/// Groups keyed by [`encode_group_key`]. Output order is unspecified.
#[derive(Debug, Default)]
pub struct HashGroups {
    groups: HashMap<Vec<u8>, GroupEntry>,
}

impl GroupTable for HashGroups {
    fn get_or_insert_with<F>(&mut self, values: Vec<ScalarValue>, init: F) -> Result<&mut GroupEntry>
    where
        F: FnOnce() -> Result<Vec<Box<dyn Accumulator>>>,
    {
        match self.groups.entry(encode_group_key(&values)) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => Ok(e.insert(GroupEntry {
                values,
                accumulators: init()?,
            })),
        }
    }

    fn len(&self) -> usize {
        self.groups.len()
    }

    fn drain(&mut self) -> Vec<GroupEntry> {
        self.groups.drain().map(|(_, entry)| entry).collect()
    }
}

/// Groups kept sorted by their values; output is ascending, nulls first.
#[derive(Debug, Default)]
pub struct OrderedGroups {
    groups: BTreeMap<GroupKey, GroupEntry>,
}

#[derive(Debug, Clone)]
struct GroupKey(Vec<ScalarValue>);

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.0.iter().zip(&other.0) {
            let ord = match (a, b) {
                (ScalarValue::Float64(x), ScalarValue::Float64(y)) => {
                    canonical_f64(*x).total_cmp(&canonical_f64(*y))
                }
                _ => a.total_cmp(b),
            };
            match ord {
                Ordering::Equal => continue,
                non_eq => return non_eq,
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GroupKey {}

impl GroupTable for OrderedGroups {
    fn get_or_insert_with<F>(&mut self, values: Vec<ScalarValue>, init: F) -> Result<&mut GroupEntry>
    where
        F: FnOnce() -> Result<Vec<Box<dyn Accumulator>>>,
    {
        use std::collections::btree_map::Entry as BEntry;
        match self.groups.entry(GroupKey(values.clone())) {
            BEntry::Occupied(e) => Ok(e.into_mut()),
            BEntry::Vacant(e) => Ok(e.insert(GroupEntry {
                values,
                accumulators: init()?,
            })),
        }
    }

    fn len(&self) -> usize {
        self.groups.len()
    }

    fn drain(&mut self) -> Vec<GroupEntry> {
        std::mem::take(&mut self.groups).into_values().collect()
    }
}

/// Typed, length-prefixed encoding of a group-by tuple.
///
/// Each value is a type tag followed by its little-endian payload (strings
/// carry a u32 length first) and a 0xff separator, so distinct tuples never
/// share an encoding: `(1, 23)` and `(12, 3)` differ. Floats are encoded
/// after [`canonical_f64`], so `0.0` and `-0.0` share a group and so do all NaNs.
pub fn encode_group_key(values: &[ScalarValue]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 10);
    for value in values {
        match value {
            ScalarValue::Null => out.push(0),
            ScalarValue::Int64(v) => {
                out.push(1);
                out.extend_from_slice(&v.to_le_bytes());
            }
            ScalarValue::Float64(v) => {
                out.push(2);
                out.extend_from_slice(&canonical_f64(*v).to_bits().to_le_bytes());
            }
            ScalarValue::Boolean(v) => {
                out.push(3);
                out.push(u8::from(*v));
            }
            ScalarValue::Utf8(s) => {
                out.push(4);
                let len = s.len() as u32;
                out.extend_from_slice(&len.to_le_bytes());
                out.extend_from_slice(s.as_bytes());
            }
            ScalarValue::Int32(v) => {
                out.push(5);
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        out.push(0xff);
    }
    out
}

/// Folds `-0.0` into `0.0` and every NaN payload into one NaN.
pub fn canonical_f64(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else if v.is_nan() {
        f64::NAN
    } else {
        v
    }
}

fn canonical_key_value(value: ScalarValue) -> ScalarValue {
    match value {
        ScalarValue::Float64(v) => ScalarValue::Float64(canonical_f64(v)),
        other => other,
    }
}

/// Grouped aggregation over pushed batches, flushed as one batch on finish.
#[derive(Debug)]
pub struct AggregateExec<T: GroupTable> {
    pub(crate) group_exprs: Vec<PhysicalExpr>,
    pub(crate) aggr_exprs: Vec<AggregateInput>,
    schema: SchemaRef,
    groups: T,
    pub(crate) next: Box<PhysicalPlan>,
}

pub type HashAggregateExec = AggregateExec<HashGroups>;
pub type OrderedAggregateExec = AggregateExec<OrderedGroups>;

impl<T: GroupTable> AggregateExec<T> {
    /// `schema` lists the group columns followed by the aggregate columns.
    pub fn try_new(
        group_exprs: Vec<PhysicalExpr>,
        aggr_exprs: Vec<AggregateInput>,
        schema: SchemaRef,
        next: PhysicalPlan,
    ) -> Result<Self> {
        // surface unsupported operand types at planning time
        new_accumulators(&aggr_exprs)?;
        Ok(Self {
            group_exprs,
            aggr_exprs,
            schema,
            groups: T::default(),
            next: Box::new(next),
        })
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    pub(crate) fn callback(&mut self, batch: Batch) -> Result<()> {
        let keys = self
            .group_exprs
            .iter()
            .map(|e| e.evaluate(&batch))
            .collect::<Result<Vec<_>>>()?;
        let operands = self
            .aggr_exprs
            .iter()
            .map(|a| a.input.evaluate(&batch))
            .collect::<Result<Vec<_>>>()?;

        let aggr_exprs = &self.aggr_exprs;
        for row in 0..batch.num_rows() {
            let values = keys
                .iter()
                .map(|k| k.value(row).map(canonical_key_value))
                .collect::<Result<Vec<_>>>()?;
            let entry = self
                .groups
                .get_or_insert_with(values, || new_accumulators(aggr_exprs))?;
            for (acc, operand) in entry.accumulators.iter_mut().zip(&operands) {
                acc.accumulate(&operand.value(row)?)?;
            }
        }
        Ok(())
    }

    pub(crate) fn finish(&mut self) -> Result<()> {
        let mut entries = self.groups.drain();
        if entries.is_empty() && self.group_exprs.is_empty() {
            // a global aggregate always yields one row
            entries.push(GroupEntry {
                values: Vec::new(),
                accumulators: new_accumulators(&self.aggr_exprs)?,
            });
        }

        let fields = self.schema.fields();
        let mut columns = Vec::with_capacity(fields.len());
        for i in 0..self.group_exprs.len() {
            let values: Vec<ScalarValue> = entries.iter().map(|e| e.values[i].clone()).collect();
            columns.push(Vector::from_scalars(&values, fields[i].data_type())?);
        }
        let offset = self.group_exprs.len();
        for j in 0..self.aggr_exprs.len() {
            let values: Vec<ScalarValue> = entries
                .iter()
                .map(|e| e.accumulators[j].final_value())
                .collect();
            columns.push(Vector::from_scalars(&values, fields[offset + j].data_type())?);
        }

        let batch = Batch::try_new_with_rows(self.schema.clone(), columns, entries.len())?;
        debug!(groups = entries.len(), "aggregate flushed");
        self.next.callback(batch)?;
        self.next.finish()
    }
}

fn new_accumulators(aggr_exprs: &[AggregateInput]) -> Result<Vec<Box<dyn Accumulator>>> {
    aggr_exprs
        .iter()
        .map(|a| create_accumulator(a.func, &a.input_type))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_keys_do_not_alias() {
        let a = encode_group_key(&[ScalarValue::Int64(1), ScalarValue::Int64(23)]);
        let b = encode_group_key(&[ScalarValue::Int64(12), ScalarValue::Int64(3)]);
        assert_ne!(a, b);
        let s1 = encode_group_key(&[ScalarValue::Utf8("1".into()), ScalarValue::Utf8("23".into())]);
        let s2 = encode_group_key(&[ScalarValue::Utf8("12".into()), ScalarValue::Utf8("3".into())]);
        assert_ne!(s1, s2);
        assert_ne!(
            encode_group_key(&[ScalarValue::Int32(7)]),
            encode_group_key(&[ScalarValue::Int64(7)])
        );
    }

    #[test]
    fn ordered_groups_drain_sorted() {
        let mut groups = OrderedGroups::default();
        for v in [3, 1, 2, 1] {
            groups
                .get_or_insert_with(vec![ScalarValue::Int64(v)], || Ok(Vec::new()))
                .expect("insert");
        }
        assert_eq!(groups.len(), 3);
        let order: Vec<_> = groups.drain().into_iter().map(|e| e.values[0].clone()).collect();
        assert_eq!(order, [1, 2, 3].map(ScalarValue::Int64).to_vec());
        assert!(groups.is_empty());
    }

    #[test]
    fn signed_zeros_and_nans_share_a_group() {
        assert_eq!(
            encode_group_key(&[ScalarValue::Float64(0.0)]),
            encode_group_key(&[ScalarValue::Float64(-0.0)])
        );
        let quiet = f64::from_bits(0x7ff8_0000_0000_0001);
        assert_eq!(
            encode_group_key(&[ScalarValue::Float64(f64::NAN)]),
            encode_group_key(&[ScalarValue::Float64(-quiet)])
        );

        let mut groups = OrderedGroups::default();
        for v in [0.0, -0.0, f64::NAN, -f64::NAN, 1.5] {
            groups
                .get_or_insert_with(vec![ScalarValue::Float64(v)], || Ok(Vec::new()))
                .expect("insert");
        }
        assert_eq!(groups.len(), 3);
    }
}
