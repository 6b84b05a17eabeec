//! Tree-walking interpreter over JSON data.

use crate::error::Fault;
use crate::parser::{BinaryOp, Expr, UnaryOp};
use serde_json::{Number, Value};
use std::cmp::Ordering;

/// Evaluates a parsed expression against the context data.
pub(crate) fn evaluate(expr: &Expr, data: &Value) -> Result<Value, Fault> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::List(items) => items
            .iter()
            .map(|item| evaluate(item, data))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Expr::Var(name) => lookup(data, name),
        Expr::Root => Ok(data.clone()),
        Expr::Attr(base, name) => {
            if base.is_context_root() {
                return lookup(data, name);
            }
            match evaluate(base, data)? {
                Value::Object(map) => Ok(map.get(name).cloned().unwrap_or(Value::Null)),
                other => Err(Fault::Type(format!(
                    "cannot read attribute '{}' of {}",
                    name,
                    type_name(&other)
                ))),
            }
        }
        Expr::Index(base, index) => {
            let base = evaluate(base, data)?;
            let index = evaluate(index, data)?;
            match (&base, &index) {
                (Value::Array(items), Value::Number(n)) => {
                    let i = n
                        .as_i64()
                        .ok_or_else(|| Fault::Type("list index must be an integer".to_string()))?;
                    let len = items.len() as i64;
                    let i = if i < 0 { len + i } else { i };
                    Ok(usize::try_from(i)
                        .ok()
                        .and_then(|i| items.get(i))
                        .cloned()
                        .unwrap_or(Value::Null))
                }
                (Value::Object(map), Value::String(key)) => {
                    Ok(map.get(key).cloned().unwrap_or(Value::Null))
                }
                _ => Err(Fault::Type(format!(
                    "cannot index {} with {}",
                    type_name(&base),
                    type_name(&index)
                ))),
            }
        }
        Expr::Call(name, args) => call(name, args, data),
        Expr::Unary(UnaryOp::Not, operand) => Ok(Value::Bool(!truthy(&evaluate(operand, data)?))),
        Expr::Unary(UnaryOp::Neg, operand) => match evaluate(operand, data)? {
            Value::Number(n) => match n.as_i64().and_then(i64::checked_neg) {
                Some(i) => Ok(Value::from(i)),
                None => Ok(float(-n.as_f64().unwrap_or(0.0))),
            },
            other => Err(Fault::Type(format!("cannot negate {}", type_name(&other)))),
        },
        Expr::Binary(BinaryOp::And, left, right) => {
            if !truthy(&evaluate(left, data)?) {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(truthy(&evaluate(right, data)?)))
        }
        Expr::Binary(BinaryOp::Or, left, right) => {
            if truthy(&evaluate(left, data)?) {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(truthy(&evaluate(right, data)?)))
        }
        Expr::Binary(op, left, right) => {
            let left = evaluate(left, data)?;
            let right = evaluate(right, data)?;
            binary(*op, &left, &right)
        }
    }
}

/// Renders a value the way interpolation inserts it into text.
pub(crate) fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Truthiness used by `not`, `and`, `or` and guard conditions.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn lookup(data: &Value, name: &str) -> Result<Value, Fault> {
    data.get(name)
        .cloned()
        .ok_or_else(|| Fault::Undefined(name.to_string()))
}

fn call(name: &str, args: &[Expr], data: &Value) -> Result<Value, Fault> {
    match (name, args) {
        ("ctx", []) => Ok(data.clone()),
        ("ctx", [Expr::Var(var)]) => lookup(data, var),
        ("ctx", [arg]) => match evaluate(arg, data)? {
            Value::String(var) => lookup(data, &var),
            other => Err(Fault::Type(format!(
                "ctx() expects a variable name, got {}",
                type_name(&other)
            ))),
        },
        ("len", [arg]) => match evaluate(arg, data)? {
            Value::String(s) => Ok(Value::from(s.chars().count())),
            Value::Array(items) => Ok(Value::from(items.len())),
            Value::Object(map) => Ok(Value::from(map.len())),
            other => Err(Fault::Type(format!("len() of {}", type_name(&other)))),
        },
        ("str", [arg]) => Ok(Value::String(render(&evaluate(arg, data)?))),
        ("ctx" | "len" | "str", _) => Err(Fault::Type(format!(
            "wrong number of arguments for {}()",
            name
        ))),
        _ => Err(Fault::UnknownFunction(name.to_string())),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, Fault> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(equals(left, right))),
        BinaryOp::Ne => Ok(Value::Bool(!equals(left, right))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(left, right)?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        BinaryOp::In => match right {
            Value::Array(items) => Ok(Value::Bool(items.iter().any(|item| equals(item, left)))),
            Value::String(haystack) => match left {
                Value::String(needle) => Ok(Value::Bool(haystack.contains(needle.as_str()))),
                other => Err(Fault::Type(format!(
                    "cannot search a string for {}",
                    type_name(other)
                ))),
            },
            Value::Object(map) => match left {
                Value::String(key) => Ok(Value::Bool(map.contains_key(key))),
                other => Err(Fault::Type(format!(
                    "object keys are strings, got {}",
                    type_name(other)
                ))),
            },
            other => Err(Fault::Type(format!("cannot search {}", type_name(other)))),
        },
        BinaryOp::Add => match (left, right) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
            (Value::Array(a), Value::Array(b)) => {
                Ok(Value::Array(a.iter().chain(b.iter()).cloned().collect()))
            }
            (Value::Number(a), Value::Number(b)) => arithmetic(op, a, b),
            _ => Err(mismatch("+", left, right)),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => match (left, right) {
            (Value::Number(a), Value::Number(b)) => arithmetic(op, a, b),
            _ => Err(mismatch(symbol(op), left, right)),
        },
        // Normally short-circuited in `evaluate`.
        BinaryOp::And => Ok(Value::Bool(truthy(left) && truthy(right))),
        BinaryOp::Or => Ok(Value::Bool(truthy(left) || truthy(right))),
    }
}

fn arithmetic(op: BinaryOp, a: &Number, b: &Number) -> Result<Value, Fault> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        let exact = match op {
            BinaryOp::Add => x.checked_add(y),
            BinaryOp::Sub => x.checked_sub(y),
            BinaryOp::Mul => x.checked_mul(y),
            _ => {
                if y == 0 {
                    return Err(Fault::Type("division by zero".to_string()));
                }
                if x.checked_rem(y) == Some(0) {
                    x.checked_div(y)
                } else {
                    None
                }
            }
        };
        if let Some(result) = exact {
            return Ok(Value::from(result));
        }
    }

    let x = a.as_f64().unwrap_or(0.0);
    let y = b.as_f64().unwrap_or(0.0);
    match op {
        BinaryOp::Add => Ok(float(x + y)),
        BinaryOp::Sub => Ok(float(x - y)),
        BinaryOp::Mul => Ok(float(x * y)),
        _ => {
            if y == 0.0 {
                Err(Fault::Type("division by zero".to_string()))
            } else {
                Ok(float(x / y))
            }
        }
    }
}

fn equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Result<Ordering, Fault> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .zip(b.as_f64())
            .and_then(|(x, y)| x.partial_cmp(&y))
            .ok_or_else(|| Fault::Type("numbers are not comparable".to_string())),
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(mismatch("comparison", left, right)),
    }
}

fn float(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        _ => "operator",
    }
}

fn mismatch(op: &str, left: &Value, right: &Value) -> Fault {
    Fault::Type(format!(
        "unsupported operand types for {}: {} and {}",
        op,
        type_name(left),
        type_name(right)
    ))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use serde_json::json;

    fn eval(source: &str, data: &Value) -> Result<Value, Fault> {
        evaluate(&parse(source).unwrap(), data)
    }

    #[test]
    fn test_lookup_forms() {
        let data = json!({"foo": 1, "nested": {"a": [10, 20]}});
        assert_eq!(eval("foo", &data).unwrap(), json!(1));
        assert_eq!(eval("ctx(foo)", &data).unwrap(), json!(1));
        assert_eq!(eval("ctx('foo')", &data).unwrap(), json!(1));
        assert_eq!(eval("ctx().foo", &data).unwrap(), json!(1));
        assert_eq!(eval("$.nested.a[1]", &data).unwrap(), json!(20));
        assert_eq!(eval("nested.a[-1]", &data).unwrap(), json!(20));
    }

    #[test]
    fn test_undefined_variable() {
        let data = json!({});
        assert_eq!(eval("bar", &data), Err(Fault::Undefined("bar".to_string())));
        assert_eq!(eval("ctx().bar", &data), Err(Fault::Undefined("bar".to_string())));
    }

    #[test]
    fn test_arithmetic_and_comparison() {
        let data = json!({"x": 7});
        assert_eq!(eval("x * 2 + 1", &data).unwrap(), json!(15));
        assert_eq!(eval("x / 2", &data).unwrap(), json!(3.5));
        assert_eq!(eval("x / 7", &data).unwrap(), json!(1));
        assert_eq!(eval("x >= 7 and not x > 7", &data).unwrap(), json!(true));
        assert_eq!(eval("x = 7.0", &data).unwrap(), json!(true));
        assert!(matches!(eval("x / 0", &data), Err(Fault::Type(_))));
    }

    #[test]
    fn test_membership_and_concatenation() {
        let data = json!({"items": ["a", "b"], "name": "weft"});
        assert_eq!(eval("'a' in items", &data).unwrap(), json!(true));
        assert_eq!(eval("'ef' in name", &data).unwrap(), json!(true));
        assert_eq!(eval("name + '!'", &data).unwrap(), json!("weft!"));
        assert_eq!(eval("len(items + ['c'])", &data).unwrap(), json!(3));
    }

    #[test]
    fn test_integer_overflow_falls_back_to_float() {
        let data = json!({"min": i64::MIN, "max": i64::MAX});
        assert_eq!(eval("-min", &data).unwrap(), json!(-(i64::MIN as f64)));
        assert_eq!(eval("-max", &data).unwrap(), json!(-i64::MAX));
        assert_eq!(eval("min / -1", &data).unwrap(), json!(-(i64::MIN as f64)));
        assert_eq!(eval("max + 1", &data).unwrap(), json!(i64::MAX as f64 + 1.0));
    }

    #[test]
    fn test_type_errors() {
        let data = json!({"name": "weft"});
        assert!(matches!(eval("name - 1", &data), Err(Fault::Type(_))));
        assert!(matches!(eval("name < 1", &data), Err(Fault::Type(_))));
        assert!(matches!(eval("len(1)", &data), Err(Fault::Type(_))));
    }

    #[test]
    fn test_unknown_function() {
        assert_eq!(
            eval("succeeded()", &json!({})),
            Err(Fault::UnknownFunction("succeeded".to_string()))
        );
    }
}
