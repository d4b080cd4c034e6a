//! The restricted expression language computation nodes are written in.
//!
//! Expressions are parsed once into an [`Expr`] tree and evaluated against a
//! [`Bindings`] map on every pass. The grammar is closed: arithmetic,
//! comparisons, boolean logic, `if ... then ... else ...`, and calls to the
//! functions listed in [`functions::FUNCTIONS`]. There is no assignment, no
//! looping and no attribute access, so an expression cannot reach anything
//! beyond the values it is handed.
//!
//! ```ignore
//! let expr = parse("round(subtotal * rate, 2)", 64)?;
//! let mut bindings = Bindings::new();
//! bindings.insert("subtotal".into(), Value::Int(500));
//! bindings.insert("rate".into(), Value::Float(0.1));
//! assert_eq!(evaluate(&expr, &bindings, 10_000)?, Value::Float(50.0));
//! ```

pub mod ast;
pub mod error;
pub mod eval;
pub mod functions;
pub mod lexer;
pub mod parser;

pub use ast::{BinaryOp, Expr, LogicOp, UnaryOp};
pub use error::ExprError;
pub use eval::{evaluate, Bindings};
pub use parser::parse;

#[cfg(test)]
mod tests {
    use super::*;
    use whatif_core::Value;

    fn run(src: &str, bindings: &[(&str, Value)]) -> Result<Value, ExprError> {
        let expr = parse(src, 64)?;
        let bindings: Bindings = bindings
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        evaluate(&expr, &bindings, 10_000)
    }

    #[test]
    fn invoice_formulas() {
        let subtotal = run(
            "price * quantity",
            &[("price", Value::Int(100)), ("quantity", Value::Int(5))],
        )
        .unwrap();
        assert_eq!(subtotal, Value::Int(500));

        let tax = run(
            "subtotal * tax_rate",
            &[("subtotal", subtotal), ("tax_rate", Value::Float(0.1))],
        )
        .unwrap();
        assert_eq!(tax, Value::Float(50.0));
    }

    #[test]
    fn missing_input_defaults_through_coalesce() {
        let v = run(
            "coalesce(discount, 0) + price",
            &[("discount", Value::Null), ("price", Value::Int(10))],
        )
        .unwrap();
        assert_eq!(v, Value::Int(10));
    }

    #[test]
    fn certification_expiry() {
        let v = run(
            "add_days(latest(issued, renewed), validity_days)",
            &[
                ("issued", Value::from("2023-03-01")),
                ("renewed", Value::from("2024-03-01")),
                ("validity_days", Value::Int(365)),
            ],
        )
        .unwrap();
        assert_eq!(v, Value::from("2025-03-01"));
    }

    #[test]
    fn tiered_discount() {
        let src = "if qty >= 100 then 0.15 else if qty >= 10 then 0.05 else 0";
        assert_eq!(run(src, &[("qty", Value::Int(150))]).unwrap(), Value::Float(0.15));
        assert_eq!(run(src, &[("qty", Value::Int(12))]).unwrap(), Value::Float(0.05));
        assert_eq!(run(src, &[("qty", Value::Int(1))]).unwrap(), Value::Int(0));
    }

    #[test]
    fn no_attribute_access() {
        assert!(matches!(
            parse("order.price", 64),
            Err(ExprError::Parse { .. })
        ));
    }
}
