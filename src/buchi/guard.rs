//! 自动机边上的守卫: 命题上的布尔公式, 以及其文本形式的解析.
//!
//! 文法 (优先级由低到高): `or := and ('|' and)*`, `and := unary ('&' unary)*`,
//! `unary := '!' unary | atom`, `atom := true | false | 命题名 | '(' or ')'`.
use std::fmt;

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while, take_while1};
use nom::character::complete::{char, multispace0};
use nom::combinator::{map, recognize};
use nom::multi::separated_list1;
use nom::sequence::{delimited, pair, preceded};
use nom::{IResult, Parser};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::labels::{PropId, PropSet, PropositionTable};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Guard {
    True,
    False,
    Prop(PropId),
    Not(Box<Guard>),
    And(Vec<Guard>),
    Or(Vec<Guard>),
}

impl Guard {
    pub fn prop(id: PropId) -> Self {
        Guard::Prop(id)
    }

    pub fn negate(self) -> Self {
        match self {
            Guard::True => Guard::False,
            Guard::False => Guard::True,
            Guard::Not(inner) => *inner,
            other => Guard::Not(Box::new(other)),
        }
    }

    pub fn eval(&self, props: &PropSet) -> bool {
        match self {
            Guard::True => true,
            Guard::False => false,
            Guard::Prop(id) => props.contains(*id),
            Guard::Not(inner) => !inner.eval(props),
            Guard::And(terms) => terms.iter().all(|g| g.eval(props)),
            Guard::Or(terms) => terms.iter().any(|g| g.eval(props)),
        }
    }

    /// 守卫中引用的全部命题.
    pub fn props(&self) -> Vec<PropId> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(guard) = stack.pop() {
            match guard {
                Guard::True | Guard::False => {}
                Guard::Prop(id) => out.push(*id),
                Guard::Not(inner) => stack.push(inner),
                Guard::And(terms) | Guard::Or(terms) => stack.extend(terms.iter()),
            }
        }
        out
    }

    pub fn parse(text: &str, table: &PropositionTable) -> Result<Guard, GuardParseError> {
        let ast = match delimited(multispace0, parse_or, multispace0).parse(text) {
            Ok(("", ast)) => ast,
            Ok((rest, _)) => return Err(GuardParseError::Trailing(rest.to_string())),
            Err(err) => return Err(GuardParseError::Syntax(err.to_string())),
        };
        ast.resolve(table)
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |f: &mut fmt::Formatter<'_>, terms: &[Guard], op: &str| {
            write!(f, "(")?;
            for (i, term) in terms.iter().enumerate() {
                if i > 0 {
                    write!(f, " {op} ")?;
                }
                write!(f, "{term}")?;
            }
            write!(f, ")")
        };
        match self {
            Guard::True => write!(f, "T"),
            Guard::False => write!(f, "⊥"),
            Guard::Prop(id) => write!(f, "{id}"),
            Guard::Not(inner) => write!(f, "¬{inner}"),
            Guard::And(terms) => join(f, terms, "∧"),
            Guard::Or(terms) => join(f, terms, "∨"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardParseError {
    #[error("guard syntax error: {0}")]
    Syntax(String),
    #[error("unexpected trailing input `{0}`")]
    Trailing(String),
    #[error("unknown proposition `{0}`")]
    UnknownProposition(String),
}

enum Ast {
    True,
    False,
    Name(String),
    Not(Box<Ast>),
    And(Vec<Ast>),
    Or(Vec<Ast>),
}

impl Ast {
    fn resolve(self, table: &PropositionTable) -> Result<Guard, GuardParseError> {
        let all = |terms: Vec<Ast>| -> Result<Vec<Guard>, GuardParseError> {
            terms.into_iter().map(|t| t.resolve(table)).collect()
        };
        Ok(match self {
            Ast::True => Guard::True,
            Ast::False => Guard::False,
            Ast::Name(name) => Guard::Prop(
                table
                    .by_name(&name)
                    .ok_or(GuardParseError::UnknownProposition(name))?,
            ),
            Ast::Not(inner) => Guard::Not(Box::new(inner.resolve(table)?)),
            Ast::And(terms) => Guard::And(all(terms)?),
            Ast::Or(terms) => Guard::Or(all(terms)?),
        })
    }
}

fn token<'a>(t: &'static str) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    delimited(multispace0, tag(t), multispace0)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || "_.>=<".contains(c)),
    ))
    .parse(input)
}

fn parse_atom(input: &str) -> IResult<&str, Ast> {
    let name = map(identifier, |name: &str| match name {
        "true" => Ast::True,
        "false" => Ast::False,
        other => Ast::Name(other.to_string()),
    });
    let parens = delimited(token("("), parse_or, token(")"));
    delimited(multispace0, alt((parens, name)), multispace0).parse(input)
}

fn parse_unary(input: &str) -> IResult<&str, Ast> {
    alt((
        map(preceded(delimited(multispace0, char('!'), multispace0), parse_unary), |inner| {
            Ast::Not(Box::new(inner))
        }),
        parse_atom,
    ))
    .parse(input)
}

fn flatten(mut terms: Vec<Ast>, wrap: fn(Vec<Ast>) -> Ast) -> Ast {
    if terms.len() == 1 {
        terms.remove(0)
    } else {
        wrap(terms)
    }
}

fn parse_and(input: &str) -> IResult<&str, Ast> {
    map(separated_list1(token("&"), parse_unary), |terms| flatten(terms, Ast::And)).parse(input)
}

fn parse_or(input: &str) -> IResult<&str, Ast> {
    map(separated_list1(token("|"), parse_and), |terms| flatten(terms, Ast::Or)).parse(input)
}
