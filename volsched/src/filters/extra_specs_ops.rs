/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Operator expressions used in volume-type extra specs and scheduler hints.
//!
//! A requirement is a string whose first whitespace-separated token may be an
//! operator:
//!
//! | Form | Meaning |
//! |---|---|
//! | `gold` | string equality (no operator) |
//! | `= 100`, `== 100` | numeric equality |
//! | `!= 100` | numeric inequality |
//! | `< 10`, `> 10`, `<= 10`, `>= 10` | numeric comparison |
//! | `s== a`, `s!= a`, `s< a`, `s> a`, `s<= a`, `s>= a` | string comparison |
//! | `<in> ssd` | capability contains the substring |
//! | `<is> True` | boolean match (case-insensitive) |
//! | `<or> a <or> b` | capability is one of the listed values |
//!
//! A numeric operator against a non-numeric value never matches.

use std::fmt;

/// Comparison operator of a [`Requirement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    NumEq,
    NumNe,
    NumLt,
    NumGt,
    NumLe,
    NumGe,
    StrEq,
    StrNe,
    StrLt,
    StrGt,
    StrLe,
    StrGe,
    In,
    Is,
    Or,
}

impl Op {
    fn from_token(token: &str) -> Option<Op> {
        Some(match token {
            "=" | "==" => Op::NumEq,
            "!=" => Op::NumNe,
            "<" => Op::NumLt,
            ">" => Op::NumGt,
            "<=" => Op::NumLe,
            ">=" => Op::NumGe,
            "s==" => Op::StrEq,
            "s!=" => Op::StrNe,
            "s<" => Op::StrLt,
            "s>" => Op::StrGt,
            "s<=" => Op::StrLe,
            "s>=" => Op::StrGe,
            "<in>" => Op::In,
            "<is>" => Op::Is,
            "<or>" => Op::Or,
            _ => return None,
        })
    }
}

/// A parsed requirement expression.
///
/// `raw` keeps the original text so the requirement round-trips unchanged
/// through RPC serialisation.
#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
    raw: String,
    op: Option<Op>,
    operands: Vec<String>,
}

impl Requirement {
    /// Parse `expr`.  Never fails: text without a leading operator is a plain
    /// string-equality requirement.
    pub fn parse(expr: &str) -> Self {
        let raw = expr.trim().to_string();
        let mut tokens = raw.split_whitespace();
        let op = tokens.next().and_then(Op::from_token);

        let operands = match op {
            None => vec![raw.clone()],
            Some(Op::Or) => {
                // "<or> a <or> b c" → ["a", "b c"]
                raw.split("<or>")
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            }
            Some(_) => vec![tokens.collect::<Vec<_>>().join(" ")],
        };

        Requirement { raw, op, operands }
    }

    /// Numeric equality against `n`, used for number-valued hints.
    pub fn numeric_eq(n: f64) -> Self {
        Requirement {
            raw: format!("== {n}"),
            op: Some(Op::NumEq),
            operands: vec![n.to_string()],
        }
    }

    /// `true` when `text` starts with a recognised operator token.
    pub fn is_expression(text: &str) -> bool {
        text.split_whitespace()
            .next()
            .and_then(Op::from_token)
            .is_some()
    }

    pub fn op(&self) -> Option<Op> {
        self.op
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Evaluate the requirement against a capability rendered as a string.
    pub fn matches(&self, value: &str) -> bool {
        let Some(op) = self.op else {
            return value == self.raw;
        };
        let operand = self.operands.first().map(String::as_str).unwrap_or("");

        match op {
            Op::NumEq | Op::NumNe | Op::NumLt | Op::NumGt | Op::NumLe | Op::NumGe => {
                let (Ok(have), Ok(want)) = (value.trim().parse::<f64>(), operand.parse::<f64>())
                else {
                    return false;
                };
                match op {
                    Op::NumEq => have == want,
                    Op::NumNe => have != want,
                    Op::NumLt => have < want,
                    Op::NumGt => have > want,
                    Op::NumLe => have <= want,
                    _ => have >= want,
                }
            }
            Op::StrEq => value == operand,
            Op::StrNe => value != operand,
            Op::StrLt => value < operand,
            Op::StrGt => value > operand,
            Op::StrLe => value <= operand,
            Op::StrGe => value >= operand,
            Op::In => value.contains(operand),
            Op::Is => value.eq_ignore_ascii_case(operand),
            Op::Or => self.operands.iter().any(|o| o == value),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_value_is_string_equality() {
        let r = Requirement::parse("gold");
        assert_eq!(r.op(), None);
        assert!(r.matches("gold"));
        assert!(!r.matches("silver"));
    }

    #[test]
    fn numeric_comparisons() {
        assert!(Requirement::parse(">= 100").matches("100"));
        assert!(Requirement::parse(">= 100").matches("150.5"));
        assert!(!Requirement::parse(">= 100").matches("99"));
        assert!(Requirement::parse("< 10").matches("9"));
        assert!(!Requirement::parse("> 10").matches("10"));
        assert!(Requirement::parse("<= 10").matches("10"));
        assert!(Requirement::parse("= 4").matches("4.0"));
        assert!(Requirement::parse("!= 4").matches("5"));
    }

    #[test]
    fn numeric_operator_on_text_never_matches() {
        assert!(!Requirement::parse(">= 100").matches("lots"));
        assert!(!Requirement::parse("= abc").matches("abc"));
    }

    #[test]
    fn string_comparisons() {
        assert!(Requirement::parse("s== abc").matches("abc"));
        assert!(Requirement::parse("s!= abc").matches("abd"));
        assert!(Requirement::parse("s< b").matches("a"));
        assert!(Requirement::parse("s>= b").matches("b"));
    }

    #[test]
    fn substring_and_boolean() {
        assert!(Requirement::parse("<in> ssd").matches("fast-ssd-pool"));
        assert!(!Requirement::parse("<in> ssd").matches("hdd"));
        assert!(Requirement::parse("<is> True").matches("true"));
        assert!(!Requirement::parse("<is> True").matches("False"));
    }

    #[test]
    fn set_membership() {
        let r = Requirement::parse("<or> lvm <or> ceph <or> nfs v4");
        assert_eq!(r.op(), Some(Op::Or));
        assert!(r.matches("ceph"));
        assert!(r.matches("nfs v4"));
        assert!(!r.matches("nfs"));
    }

    #[test]
    fn expression_detection() {
        assert!(Requirement::is_expression(">= 3"));
        assert!(Requirement::is_expression("<or> a <or> b"));
        assert!(!Requirement::is_expression("gold"));
        assert!(!Requirement::is_expression(""));
    }

    #[test]
    fn display_round_trips_raw_text() {
        let r = Requirement::parse("  <in> ssd ");
        assert_eq!(r.to_string(), "<in> ssd");
        assert_eq!(Requirement::parse(&r.to_string()), r);
    }
}
