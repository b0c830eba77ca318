// Lexical helpers shared by the command parsers

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag_no_case, take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{map, not, peek, recognize},
    error::ParseError,
    number::complete::double,
    sequence::{delimited, terminated},
    IResult,
};

/// Wrap a parser so it skips surrounding whitespace
pub fn ws<'a, F, O, E: ParseError<&'a str>>(
    inner: F,
) -> impl FnMut(&'a str) -> IResult<&'a str, O, E>
where
    F: FnMut(&'a str) -> IResult<&'a str, O, E>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Case-insensitive keyword that must not run into a following word character
pub fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(
        tag_no_case(kw),
        not(peek(take_while1(is_word_char))),
    )
}

/// Option or column identifier: letters, digits, `_`, `.` and `-`
pub fn identifier(input: &str) -> IResult<&str, String> {
    map(
        recognize(take_while1(|c: char| is_word_char(c) || c == '.' || c == '-')),
        |s: &str| s.to_string(),
    )(input)
}

/// Double- or single-quoted string without escapes
pub fn string_literal(input: &str) -> IResult<&str, String> {
    map(
        alt((
            delimited(char('"'), take_while(|c| c != '"'), char('"')),
            delimited(char('\''), take_while(|c| c != '\''), char('\'')),
        )),
        |s: &str| s.to_string(),
    )(input)
}

/// Floating point literal (finite values only)
pub fn number_literal(input: &str) -> IResult<&str, f64> {
    let (rest, value) = double(input)?;
    if value.is_finite() {
        Ok((rest, value))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Float,
        )))
    }
}

/// Unquoted token: everything up to whitespace
pub fn bare_word(input: &str) -> IResult<&str, String> {
    map(is_not(" \t\r\n"), |s: &str| s.to_string())(input)
}

/// A path or name that may be quoted
pub fn word_or_string(input: &str) -> IResult<&str, String> {
    alt((string_literal, bare_word))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier() {
        let (rest, id) = identifier("hue_order = x").unwrap();
        assert_eq!(id, "hue_order");
        assert_eq!(rest, " = x");
    }

    #[test]
    fn test_string_literal() {
        assert_eq!(string_literal("\"a b\"").unwrap().1, "a b");
        assert_eq!(string_literal("'c'").unwrap().1, "c");
        assert!(string_literal("\"open").is_err());
    }

    #[test]
    fn test_number_literal() {
        assert_eq!(number_literal("3.5").unwrap().1, 3.5);
        assert_eq!(number_literal("-2").unwrap().1, -2.0);
        assert!(number_literal("inf").is_err());
    }

    #[test]
    fn test_keyword_boundary() {
        assert!(keyword("set")("set x").is_ok());
        assert!(keyword("set")("SET x").is_ok());
        assert!(keyword("set")("settings").is_err());
    }
}
