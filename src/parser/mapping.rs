// Mapping DSL: `dimension: column, dimension: [col_a, "col b"]`

use super::lexer::{identifier, string_literal, ws};
use anyhow::{anyhow, Result};
use nom::{
    branch::alt,
    character::complete::char,
    combinator::map,
    multi::separated_list0,
    sequence::{delimited, separated_pair},
    IResult,
};

/// One `dimension: columns` binding as written
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub dimension: String,
    pub columns: Vec<String>,
}

fn column(input: &str) -> IResult<&str, String> {
    ws(alt((string_literal, identifier)))(input)
}

fn columns(input: &str) -> IResult<&str, Vec<String>> {
    alt((
        delimited(ws(char('[')), separated_list0(ws(char(',')), column), ws(char(']'))),
        map(column, |c| vec![c]),
    ))(input)
}

fn binding(input: &str) -> IResult<&str, Binding> {
    map(
        separated_pair(ws(identifier), ws(char(':')), columns),
        |(dimension, columns)| Binding { dimension, columns },
    )(input)
}

/// Parse a whole mapping expression. Empty input yields no bindings.
pub fn parse_mapping(input: &str) -> Result<Vec<Binding>> {
    let (rest, bindings) = separated_list0(ws(char(',')), binding)(input)
        .map_err(|e| anyhow!("Failed to parse mapping: {}", e))?;
    if !rest.trim().is_empty() {
        anyhow::bail!("Unexpected input in mapping: '{}'", rest.trim());
    }
    Ok(bindings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_and_list() {
        let bindings = parse_mapping("date: day, value: [sales, \"net profit\"]").unwrap();
        assert_eq!(
            bindings,
            vec![
                Binding {
                    dimension: "date".into(),
                    columns: vec!["day".into()],
                },
                Binding {
                    dimension: "value".into(),
                    columns: vec!["sales".into(), "net profit".into()],
                },
            ]
        );
    }

    #[test]
    fn test_empty() {
        assert!(parse_mapping("").unwrap().is_empty());
        assert!(parse_mapping("   ").unwrap().is_empty());
    }

    #[test]
    fn test_quoted_column() {
        let bindings = parse_mapping("size: \"Total (EUR)\"").unwrap();
        assert_eq!(bindings[0].columns, vec!["Total (EUR)"]);
    }

    #[test]
    fn test_rejects_garbage() {
        let err = parse_mapping("value: a b").unwrap_err();
        assert!(err.to_string().contains("b"));
        assert!(parse_mapping("value a").is_err());
        assert!(parse_mapping("value: [a,").is_err());
    }
}
