// Shared token parsers for the mapping and options DSLs

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag},
    character::complete::{alpha1, alphanumeric1, char, multispace0},
    combinator::{map, not, opt, recognize, value},
    multi::many0,
    number::complete::double,
    sequence::{delimited, pair, terminated},
    IResult,
};

/// Wrap a parser so it skips surrounding whitespace
pub fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// Letters, digits and underscores, not starting with a digit
pub fn identifier(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(
            alt((alpha1, tag("_"))),
            many0(alt((alphanumeric1, tag("_")))),
        )),
        |s: &str| s.to_string(),
    )(input)
}

/// Double-quoted text without escapes
pub fn string_literal(input: &str) -> IResult<&str, String> {
    map(
        delimited(char('"'), opt(is_not("\"")), char('"')),
        |s: Option<&str>| s.unwrap_or_default().to_string(),
    )(input)
}

pub fn number_literal(input: &str) -> IResult<&str, f64> {
    double(input)
}

pub fn boolean_literal(input: &str) -> IResult<&str, bool> {
    terminated(
        alt((value(true, tag("true")), value(false, tag("false")))),
        not(alt((alphanumeric1, tag("_")))),
    )(input)
}
