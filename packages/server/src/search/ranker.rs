//! Re-ranking: a user-supplied arithmetic expression over `score` and
//! `score.<name>`, or a uniform shuffle.

use rand::seq::SliceRandom;

use crate::error::{Error, Result};
use crate::search::types::SearchItem;

/// A compiled arithmetic expression.
#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    /// `score` (the hit similarity) or `score.<name>` (a named sub-score).
    Ident(String),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Open,
    Close,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '0'..='9' | '.' => {
                let mut number = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        number.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value: f64 = number
                    .parse()
                    .map_err(|_| Error::Config(format!("bad number in score expression: {number}")))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => {
                return Err(Error::Config(format!(
                    "unexpected character in score expression: {other}"
                )))
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn expression(&mut self) -> Result<Expr> {
        let mut left = self.term()?;
        while let Some(op) = self.peek().cloned() {
            match op {
                Token::Plus => {
                    self.next();
                    left = Expr::Add(Box::new(left), Box::new(self.term()?));
                }
                Token::Minus => {
                    self.next();
                    left = Expr::Sub(Box::new(left), Box::new(self.term()?));
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut left = self.factor()?;
        while let Some(op) = self.peek().cloned() {
            match op {
                Token::Star => {
                    self.next();
                    left = Expr::Mul(Box::new(left), Box::new(self.factor()?));
                }
                Token::Slash => {
                    self.next();
                    left = Expr::Div(Box::new(left), Box::new(self.factor()?));
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::Ident(name)) => Ok(Expr::Ident(name)),
            Some(Token::Minus) => Ok(Expr::Neg(Box::new(self.factor()?))),
            Some(Token::Open) => {
                let inner = self.expression()?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err(Error::Config("unbalanced parentheses in score expression".into())),
                }
            }
            other => Err(Error::Config(format!(
                "unexpected token in score expression: {other:?}"
            ))),
        }
    }
}

impl Expr {
    fn evaluate(&self, item: &SearchItem) -> f64 {
        match self {
            Expr::Number(value) => *value,
            Expr::Ident(name) => {
                if name == "score" {
                    item.score
                } else if let Some(score_name) = name.strip_prefix("score.") {
                    // Missing sub-scores evaluate to 0.
                    item.scores.get(score_name).copied().unwrap_or(0.0)
                } else {
                    0.0
                }
            }
            Expr::Neg(inner) => -inner.evaluate(item),
            Expr::Add(a, b) => a.evaluate(item) + b.evaluate(item),
            Expr::Sub(a, b) => a.evaluate(item) - b.evaluate(item),
            Expr::Mul(a, b) => a.evaluate(item) * b.evaluate(item),
            Expr::Div(a, b) => a.evaluate(item) / b.evaluate(item),
        }
    }
}

/// Re-rank by a compiled score expression, descending.
pub struct ScoreRanker {
    expr: Expr,
}

impl ScoreRanker {
    pub fn parse(expression: &str) -> Result<Self> {
        let tokens = tokenize(expression)?;
        if tokens.is_empty() {
            return Err(Error::Config("empty score expression".into()));
        }
        let mut parser = Parser {
            tokens,
            position: 0,
        };
        let expr = parser.expression()?;
        if parser.peek().is_some() {
            return Err(Error::Config(format!(
                "trailing input in score expression: {expression}"
            )));
        }
        Ok(Self { expr })
    }

    pub fn rank(&self, mut items: Vec<SearchItem>, limit: usize) -> Vec<SearchItem> {
        for item in &mut items {
            item.score = self.expr.evaluate(item);
        }
        items.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        items.truncate(limit);
        items
    }
}

/// Uniform shuffle, then truncate.
pub struct RandomRanker;

impl RandomRanker {
    pub fn rank(&self, mut items: Vec<SearchItem>, limit: usize) -> Vec<SearchItem> {
        items.shuffle(&mut rand::rng());
        items.truncate(limit);
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn item(id: &str, score: f64, scores: &[(&str, f64)]) -> SearchItem {
        SearchItem {
            id: id.to_string(),
            fields: serde_json::Map::new(),
            score,
            scores: scores
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<BTreeMap<_, _>>(),
            exported: None,
            description: None,
        }
    }

    #[test]
    fn test_plain_score_ranking() {
        let ranker = ScoreRanker::parse("score").unwrap();
        let ranked = ranker.rank(
            vec![item("a", 0.2, &[]), item("b", 0.9, &[]), item("c", 0.5, &[])],
            10,
        );
        let ids: Vec<&str> = ranked.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["b", "c", "a"]);
    }

    #[test]
    fn test_sub_scores() {
        let ranker = ScoreRanker::parse("score + score.popularity * 0.5").unwrap();
        let ranked = ranker.rank(
            vec![
                item("a", 0.5, &[("popularity", 0.0)]),
                item("b", 0.4, &[("popularity", 1.0)]),
            ],
            10,
        );
        assert_eq!(ranked[0].id, "b");
        assert!((ranked[0].score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_missing_sub_score_is_zero() {
        let ranker = ScoreRanker::parse("score + score.missing").unwrap();
        let ranked = ranker.rank(vec![item("a", 0.5, &[])], 10);
        assert!((ranked[0].score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_parentheses_and_precedence() {
        let ranker = ScoreRanker::parse("(score + 1) * 2").unwrap();
        let ranked = ranker.rank(vec![item("a", 0.5, &[])], 10);
        assert!((ranked[0].score - 3.0).abs() < 1e-9);

        let ranker = ScoreRanker::parse("score + 1 * 2").unwrap();
        let ranked = ranker.rank(vec![item("a", 0.5, &[])], 10);
        assert!((ranked[0].score - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_negation() {
        let ranker = ScoreRanker::parse("-score").unwrap();
        let ranked = ranker.rank(vec![item("a", 0.5, &[]), item("b", 0.2, &[])], 10);
        assert_eq!(ranked[0].id, "b");
    }

    #[test]
    fn test_limit_truncates() {
        let ranker = ScoreRanker::parse("score").unwrap();
        let ranked = ranker.rank(
            vec![item("a", 0.2, &[]), item("b", 0.9, &[]), item("c", 0.5, &[])],
            2,
        );
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn test_parse_errors() {
        assert!(ScoreRanker::parse("score +").is_err());
        assert!(ScoreRanker::parse("(score").is_err());
        assert!(ScoreRanker::parse("score ^ 2").is_err());
        assert!(ScoreRanker::parse("").is_err());
        assert!(ScoreRanker::parse("score 2").is_err());
    }

    #[test]
    fn test_random_ranker_truncates() {
        let ranked = RandomRanker.rank(
            vec![item("a", 0.2, &[]), item("b", 0.9, &[]), item("c", 0.5, &[])],
            2,
        );
        assert_eq!(ranked.len(), 2);
    }
}
