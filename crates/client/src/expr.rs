use tdf_planner::{AggregateExpr, AggregateFunction, BinaryOp, Expr, LiteralValue};

/// Builds a column-reference expression.
pub fn col(name: &str) -> Expr {
    Expr::Column(name.to_string())
}

/// Builds an `Int32` literal expression.
pub fn lit_i32(v: i32) -> Expr {
    Expr::Literal(LiteralValue::Int32(v))
}

/// Builds an `Int64` literal expression.
pub fn lit_i64(v: i64) -> Expr {
    Expr::Literal(LiteralValue::Int64(v))
}

/// Builds a `Float64` literal expression.
pub fn lit_f64(v: f64) -> Expr {
    Expr::Literal(LiteralValue::Float64(v))
}

/// Builds a boolean literal expression.
pub fn lit_bool(v: bool) -> Expr {
    Expr::Literal(LiteralValue::Boolean(v))
}

/// Builds a UTF-8 string literal expression.
pub fn lit_str(v: &str) -> Expr {
    Expr::Literal(LiteralValue::Utf8(v.to_string()))
}

fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
    Expr::BinaryExpr {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

/// Builds an equality expression (`left = right`).
pub fn eq(left: Expr, right: Expr) -> Expr {
    binary(left, BinaryOp::Eq, right)
}

pub fn not_eq(left: Expr, right: Expr) -> Expr {
    binary(left, BinaryOp::NotEq, right)
}

pub fn lt(left: Expr, right: Expr) -> Expr {
    binary(left, BinaryOp::Lt, right)
}

pub fn lt_eq(left: Expr, right: Expr) -> Expr {
    binary(left, BinaryOp::LtEq, right)
}

pub fn gt(left: Expr, right: Expr) -> Expr {
    binary(left, BinaryOp::Gt, right)
}

pub fn gt_eq(left: Expr, right: Expr) -> Expr {
    binary(left, BinaryOp::GtEq, right)
}

/// Builds a boolean AND expression.
pub fn and(left: Expr, right: Expr) -> Expr {
    binary(left, BinaryOp::And, right)
}

/// Builds a boolean OR expression.
pub fn or(left: Expr, right: Expr) -> Expr {
    binary(left, BinaryOp::Or, right)
}

fn aggregate(func: AggregateFunction, expr: Expr) -> Expr {
    Expr::AggregateFunction(AggregateExpr {
        func,
        expr: Box::new(expr),
    })
}

/// `sum(expr)`; integer inputs sum into `Int64`.
pub fn sum(expr: Expr) -> Expr {
    aggregate(AggregateFunction::Sum, expr)
}

/// `count(expr)`; nulls are not counted.
pub fn count(expr: Expr) -> Expr {
    aggregate(AggregateFunction::Count, expr)
}

pub fn min(expr: Expr) -> Expr {
    aggregate(AggregateFunction::Min, expr)
}

pub fn max(expr: Expr) -> Expr {
    aggregate(AggregateFunction::Max, expr)
}

/// `avg(expr)` as `Float64`.
pub fn avg(expr: Expr) -> Expr {
    aggregate(AggregateFunction::Avg, expr)
}
