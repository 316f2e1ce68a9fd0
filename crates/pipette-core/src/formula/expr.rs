//! Formula expressions, evaluated with `evalexpr`.
//!
//! Formulas are written by template authors in calculator notation:
//! `tc - hdl - tg / 5`, `hb / pcv * 100`, `sqrt(height * weight / 3600)`.
//! Every number is a double, so integer literals are promoted before the
//! text reaches `evalexpr` (whose integer division would turn `1 / 3` into 0).

use evalexpr::{
    eval_with_context, ContextWithMutableFunctions, ContextWithMutableVariables, EvalexprError,
    Function, HashMapContext, Value,
};

use crate::model::VariableTable;

/// Why a formula produced no usable value.
#[derive(Debug, thiserror::Error)]
pub enum ExpressionError {
    #[error("{0}")]
    Eval(#[from] EvalexprError),

    #[error("formula evaluated to {0}, expected a number")]
    NonNumeric(&'static str),

    #[error("formula evaluated to a non-finite number ({0})")]
    NonFinite(f64),
}

/// The value of a successfully evaluated formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormulaValue {
    Number(f64),
    Boolean(bool),
}

impl FormulaValue {
    /// Numeric value published for other formulas. Booleans count as 1 and 0.
    pub fn as_f64(self) -> f64 {
        match self {
            FormulaValue::Number(n) => n,
            FormulaValue::Boolean(true) => 1.0,
            FormulaValue::Boolean(false) => 0.0,
        }
    }
}

/// Evaluate `formula` with the variable table as its bindings.
pub fn evaluate(formula: &str, variables: &VariableTable) -> Result<FormulaValue, ExpressionError> {
    let mut context = HashMapContext::new();
    register_functions(&mut context)?;
    for (name, value) in variables.iter() {
        context.set_value(name.to_string(), Value::Float(value))?;
    }

    let source = promote_integer_literals(formula);
    match eval_with_context(&source, &context)? {
        Value::Float(n) if n.is_finite() => Ok(FormulaValue::Number(n)),
        Value::Float(n) => Err(ExpressionError::NonFinite(n)),
        Value::Int(n) => Ok(FormulaValue::Number(n as f64)),
        Value::Boolean(b) => Ok(FormulaValue::Boolean(b)),
        Value::String(_) => Err(ExpressionError::NonNumeric("a string")),
        Value::Tuple(_) => Err(ExpressionError::NonNumeric("a tuple")),
        Value::Empty => Err(ExpressionError::NonNumeric("nothing")),
    }
}

/// Names callable from formulas in addition to the `evalexpr` builtins
/// (`min`, `max`, `floor`, `round`, `ceil`, `math::*`).
pub const FUNCTIONS: &[&str] = &[
    "sqrt", "cbrt", "abs", "exp", "ln", "log", "log10", "pow",
];

fn register_functions(context: &mut HashMapContext) -> Result<(), EvalexprError> {
    context.set_function("sqrt".into(), unary(f64::sqrt))?;
    context.set_function("cbrt".into(), unary(f64::cbrt))?;
    context.set_function("abs".into(), unary(f64::abs))?;
    context.set_function("exp".into(), unary(f64::exp))?;
    context.set_function("ln".into(), unary(f64::ln))?;
    context.set_function("log10".into(), unary(f64::log10))?;
    // log(x) is the natural log, log(x, base) any other base
    context.set_function(
        "log".into(),
        Function::new(|argument| {
            if let Ok(args) = argument.as_fixed_len_tuple(2) {
                let x = args[0].as_number()?;
                let base = args[1].as_number()?;
                Ok(Value::Float(x.ln() / base.ln()))
            } else {
                Ok(Value::Float(argument.as_number()?.ln()))
            }
        }),
    )?;
    context.set_function(
        "pow".into(),
        Function::new(|argument| {
            let args = argument.as_fixed_len_tuple(2)?;
            Ok(Value::Float(args[0].as_number()?.powf(args[1].as_number()?)))
        }),
    )?;
    Ok(())
}

fn unary(f: fn(f64) -> f64) -> Function {
    Function::new(move |argument| Ok(Value::Float(f(argument.as_number()?))))
}

/// Rewrite bare integer literals as floats: `x / 3` becomes `x / 3.0`.
/// Identifiers containing digits and quoted strings are left alone.
pub fn promote_integer_literals(formula: &str) -> String {
    let chars: Vec<char> = formula.chars().collect();
    let mut out = String::with_capacity(formula.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '"' {
            let start = i;
            i += 1;
            while i < chars.len() && chars[i] != '"' {
                i += 1;
            }
            i = (i + 1).min(chars.len());
            out.extend(&chars[start..i]);
            continue;
        }

        if is_ident_char(c) && !c.is_ascii_digit() {
            while i < chars.len() && is_ident_char(chars[i]) {
                out.push(chars[i]);
                i += 1;
            }
            continue;
        }

        if c.is_ascii_digit() && (i == 0 || chars[i - 1] != '.') {
            let start = i;
            let mut is_float = false;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            if i < chars.len() && chars[i] == '.' {
                is_float = true;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                is_float = true;
                i += 1;
                if i < chars.len() && (chars[i] == '+' || chars[i] == '-') {
                    i += 1;
                }
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            out.extend(&chars[start..i]);
            if !is_float {
                out.push_str(".0");
            }
            continue;
        }

        out.push(c);
        i += 1;
    }

    out
}

/// An identifier occurring in formula text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identifier<'a> {
    pub name: &'a str,
    /// Followed by `(`: a function name rather than a variable.
    pub is_call: bool,
}

/// Identifiers in `formula`, in order of appearance. Namespaced names such
/// as `math::sqrt` count as one identifier; `true`/`false` are skipped.
pub fn identifiers(formula: &str) -> Vec<Identifier<'_>> {
    let bytes = formula.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b == b'"' {
            i += 1;
            while i < bytes.len() && bytes[i] != b'"' {
                i += 1;
            }
            i += 1;
            continue;
        }
        if b.is_ascii_digit() || b == b'.' {
            // skip numeric literals, including exponents like 1e5
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.') {
                i += 1;
            }
            continue;
        }
        if b.is_ascii_alphabetic() || b == b'_' {
            let start = i;
            while i < bytes.len() && (is_ident_byte(bytes[i]) || bytes[i] == b':') {
                i += 1;
            }
            let name = &formula[start..i];
            let is_call = bytes[i..]
                .iter()
                .find(|c| !c.is_ascii_whitespace())
                .is_some_and(|c| *c == b'(');
            if name != "true" && name != "false" {
                found.push(Identifier { name, is_call });
            }
            continue;
        }
        i += 1;
    }

    found
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == ':'
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, f64)]) -> VariableTable {
        let mut table = VariableTable::new();
        for (name, value) in pairs {
            table.publish(name, *value);
        }
        table
    }

    #[test]
    fn test_arithmetic_with_variables() {
        let v = evaluate("x * 2 + y", &vars(&[("x", 5.0), ("y", 1.5)])).unwrap();
        assert_eq!(v, FormulaValue::Number(11.5));
    }

    #[test]
    fn test_integer_division_is_float() {
        let v = evaluate("1 / 3", &VariableTable::new()).unwrap();
        match v {
            FormulaValue::Number(n) => assert!((n - 1.0 / 3.0).abs() < 1e-12),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_precedence_and_parentheses() {
        let table = vars(&[("a", 2.0), ("b", 3.0)]);
        assert_eq!(evaluate("a + b * 2", &table).unwrap(), FormulaValue::Number(8.0));
        assert_eq!(evaluate("(a + b) * 2", &table).unwrap(), FormulaValue::Number(10.0));
        assert_eq!(evaluate("b ^ 2", &table).unwrap(), FormulaValue::Number(9.0));
    }

    #[test]
    fn test_registered_functions() {
        let table = vars(&[("x", 16.0)]);
        assert_eq!(evaluate("sqrt(x)", &table).unwrap(), FormulaValue::Number(4.0));
        assert_eq!(evaluate("abs(0 - x)", &table).unwrap(), FormulaValue::Number(16.0));
        assert_eq!(evaluate("pow(x, 2)", &table).unwrap(), FormulaValue::Number(256.0));
        assert_eq!(evaluate("log10(100)", &table).unwrap(), FormulaValue::Number(2.0));
        match evaluate("log(8, 2)", &table).unwrap() {
            FormulaValue::Number(n) => assert!((n - 3.0).abs() < 1e-9),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_boolean_result() {
        let v = evaluate("x > 10", &vars(&[("x", 12.0)])).unwrap();
        assert_eq!(v, FormulaValue::Boolean(true));
        assert_eq!(v.as_f64(), 1.0);
    }

    #[test]
    fn test_unknown_variable_fails() {
        assert!(evaluate("undefinedVar + 1", &VariableTable::new()).is_err());
    }

    #[test]
    fn test_malformed_expression_fails() {
        assert!(evaluate("x * * 2", &vars(&[("x", 1.0)])).is_err());
    }

    #[test]
    fn test_non_finite_results_fail() {
        assert!(evaluate("x / 0", &vars(&[("x", 1.0)])).is_err());
        assert!(evaluate("sqrt(0 - x)", &vars(&[("x", 1.0)])).is_err());
    }

    #[test]
    fn test_promote_integer_literals() {
        assert_eq!(promote_integer_literals("1 / 3"), "1.0 / 3.0");
        assert_eq!(promote_integer_literals("x2 + 10"), "x2 + 10.0");
        assert_eq!(promote_integer_literals("2.5 * 4"), "2.5 * 4.0");
        assert_eq!(promote_integer_literals("1e3 + 2"), "1e3 + 2.0");
        assert_eq!(promote_integer_literals("\"12\""), "\"12\"");
    }

    #[test]
    fn test_identifiers() {
        let ids = identifiers("sqrt(tc) - hdl_2 * 1e3 + math::ln(x)");
        let names: Vec<&str> = ids.iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["sqrt", "tc", "hdl_2", "math::ln", "x"]);
        assert!(ids[0].is_call);
        assert!(!ids[1].is_call);
        assert!(ids[3].is_call);
    }
}
