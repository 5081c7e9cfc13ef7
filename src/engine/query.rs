//! Executes [`Query`] clauses against an in-memory document list.

use std::cmp::Ordering;

use serde_json::Value;

use crate::model::{Clause, Direction, Document, Query, RangeOp, Timestamp};

/// Compares two values of the same kind using the store's natural ordering.
///
/// Strings compare lexicographically, numbers numerically, timestamps
/// chronologically and booleans `false < true`. Values of different kinds
/// (or kinds without an ordering) are incomparable and yield `None`.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(na), Value::Number(nb)) => match (as_int(na), as_int(nb)) {
            (Some(ia), Some(ib)) => Some(ia.cmp(&ib)),
            (Some(ia), None) => cmp_int_float(ia, nb.as_f64()?),
            (None, Some(ib)) => cmp_int_float(ib, na.as_f64()?).map(Ordering::reverse),
            (None, None) => na.as_f64()?.partial_cmp(&nb.as_f64()?),
        },
        (Value::String(sa), Value::String(sb)) => Some(sa.cmp(sb)),
        (Value::Bool(ba), Value::Bool(bb)) => Some(ba.cmp(bb)),
        (Value::Object(_), Value::Object(_)) => {
            let ta = Timestamp::from_value(a)?;
            let tb = Timestamp::from_value(b)?;
            Some(ta.cmp(&tb))
        }
        _ => None,
    }
}

fn as_int(n: &serde_json::Number) -> Option<i128> {
    n.as_i64().map(i128::from).or_else(|| n.as_u64().map(i128::from))
}

/// Exact comparison of an integer with a float. Going through `f64` would
/// round integers above 2^53 and break transitivity of the sort.
fn cmp_int_float(i: i128, f: f64) -> Option<Ordering> {
    const TWO_POW_127: f64 = 170141183460469231731687303715884105728.0;
    if f.is_nan() {
        return None;
    }
    if f >= TWO_POW_127 {
        return Some(Ordering::Less);
    }
    if f < -TWO_POW_127 {
        return Some(Ordering::Greater);
    }
    let floor = f.floor();
    // Exact: every float in range with a fractional part is far below 2^127.
    let whole = floor as i128;
    match i.cmp(&whole) {
        Ordering::Equal if f > floor => Some(Ordering::Less),
        ord => Some(ord),
    }
}

/// Type-sensitive equality. Numbers compare by value, so `1` equals `1.0`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Number(_) => 0,
        Value::String(_) => 1,
        Value::Object(_) if Timestamp::from_value(v).is_some() => 2,
        Value::Bool(_) => 3,
        _ => 4,
    }
}

/// Total order used for sorting; never fails.
///
/// Missing values sort last in both directions; `direction` only reorders
/// present values.
fn sort_order(a: Option<&Value>, b: Option<&Value>, direction: Direction) -> Ordering {
    let (a, b) = match (a, b) {
        (None, None) => return Ordering::Equal,
        (None, Some(_)) => return Ordering::Greater,
        (Some(_), None) => return Ordering::Less,
        (Some(a), Some(b)) => (a, b),
    };
    let ord = compare_values(a, b).unwrap_or_else(|| type_rank(a).cmp(&type_rank(b)));
    match direction {
        Direction::Asc => ord,
        Direction::Desc => ord.reverse(),
    }
}

fn range_matches(value: &Value, op: RangeOp, bound: &Value) -> bool {
    match compare_values(value, bound) {
        Some(ord) => match op {
            RangeOp::Lt => ord == Ordering::Less,
            RangeOp::Le => ord != Ordering::Greater,
            RangeOp::Gt => ord == Ordering::Greater,
            RangeOp::Ge => ord != Ordering::Less,
        },
        None => false,
    }
}

/// Checks a single filter clause. Ordering clauses always match.
pub fn clause_matches(doc: &Document, clause: &Clause) -> bool {
    match clause {
        Clause::Equality { field, value } => doc
            .fields
            .get(field)
            .map_or(false, |v| values_equal(v, value)),
        Clause::Range { field, op, value } => doc
            .fields
            .get(field)
            .map_or(false, |v| range_matches(v, *op, value)),
        Clause::OrderBy { .. } => true,
    }
}

/// Applies the query's filters and ordering to `docs`.
///
/// Without an ordering clause the input order is preserved. With several, the
/// first is the primary sort key. The sort is stable.
pub fn apply(query: &Query, docs: Vec<Document>) -> Vec<Document> {
    let mut out: Vec<Document> = docs
        .into_iter()
        .filter(|doc| query.clauses().iter().all(|c| clause_matches(doc, c)))
        .collect();

    let keys: Vec<(&str, Direction)> = query
        .clauses()
        .iter()
        .filter_map(|c| match c {
            Clause::OrderBy { field, direction } => Some((field.as_str(), *direction)),
            _ => None,
        })
        .collect();

    if !keys.is_empty() {
        out.sort_by(|a, b| {
            keys.iter()
                .map(|(field, dir)| sort_order(a.fields.get(*field), b.fields.get(*field), *dir))
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }

    out
}
