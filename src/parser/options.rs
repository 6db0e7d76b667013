// Options DSL: `bins: 10, color: "#ff0000", showLabels: false, color: scale(ordinal, "schemeSet2")`

use super::lexer::{boolean_literal, identifier, number_literal, string_literal, ws};
use crate::options::OptionValue;
use crate::palette::{ColorScale, ScaleType};
use anyhow::{anyhow, Result};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::char,
    combinator::{map, value},
    multi::separated_list0,
    sequence::{delimited, separated_pair},
    IResult,
};

fn scale_type(input: &str) -> IResult<&str, ScaleType> {
    alt((
        value(ScaleType::Ordinal, tag("ordinal")),
        value(ScaleType::Sequential, tag("sequential")),
    ))(input)
}

/// `scale(ordinal, "interpolateSpectral")`
fn color_scale(input: &str) -> IResult<&str, ColorScale> {
    let (input, _) = ws(tag("scale"))(input)?;
    let (input, (kind, interpolator)) = delimited(
        ws(char('(')),
        separated_pair(ws(scale_type), ws(char(',')), ws(string_literal)),
        ws(char(')')),
    )(input)?;
    Ok((input, ColorScale::new(kind, &interpolator)))
}

fn option_value(input: &str) -> IResult<&str, OptionValue> {
    ws(alt((
        map(color_scale, OptionValue::ColorScale),
        map(boolean_literal, OptionValue::Bool),
        map(string_literal, OptionValue::Text),
        map(number_literal, OptionValue::Number),
    )))(input)
}

fn assignment(input: &str) -> IResult<&str, (String, OptionValue)> {
    separated_pair(ws(identifier), ws(char(':')), option_value)(input)
}

/// Parse `option: value` pairs in order. Later assignments of the same option win when applied.
pub fn parse_options(input: &str) -> Result<Vec<(String, OptionValue)>> {
    let (rest, pairs) = separated_list0(ws(char(',')), assignment)(input)
        .map_err(|e| anyhow!("Failed to parse options: {}", e))?;
    if !rest.trim().is_empty() {
        anyhow::bail!("Unexpected input in options: '{}'", rest.trim());
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_values() {
        let pairs = parse_options("bins: 10, color: \"#ff0000\", showLabels: false").unwrap();
        assert_eq!(
            pairs,
            vec![
                ("bins".to_string(), OptionValue::Number(10.0)),
                ("color".to_string(), OptionValue::Text("#ff0000".into())),
                ("showLabels".to_string(), OptionValue::Bool(false)),
            ]
        );
    }

    #[test]
    fn test_color_scale_value() {
        let pairs = parse_options("color: scale(sequential, \"interpolateViridis\")").unwrap();
        match &pairs[0].1 {
            OptionValue::ColorScale(scale) => {
                assert_eq!(scale.scale_type, ScaleType::Sequential);
                assert_eq!(scale.interpolator, "interpolateViridis");
                assert!(!scale.loaded);
            }
            other => panic!("unexpected value {:?}", other),
        }
    }

    #[test]
    fn test_empty_and_errors() {
        assert!(parse_options("").unwrap().is_empty());
        assert!(parse_options("bins: ten").is_err());
        assert!(parse_options("bins 10").is_err());
        assert!(parse_options("color: scale(linear, \"x\")").is_err());
    }
}
