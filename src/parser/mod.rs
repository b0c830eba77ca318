// Session command language parser

pub mod ast;
pub mod command;
pub mod lexer;

pub use ast::Command;

use lexer::{identifier, number_literal, ws};
use nom::{
    character::complete::char,
    combinator::all_consuming,
    sequence::separated_pair,
};

use crate::error::SessionError;
use crate::params::ParamValue;

/// Parse one full input line
pub fn parse_line(line: &str) -> Result<Command, SessionError> {
    match all_consuming(ws(command::parse_command))(line) {
        Ok((_, cmd)) => Ok(cmd),
        Err(_) => Err(SessionError::Parse(format!(
            "could not understand '{}' (try `help`)",
            line.trim()
        ))),
    }
}

/// Parse a `key=value` assignment as given on the command line
pub fn parse_assignment(text: &str) -> Result<(String, ParamValue), SessionError> {
    all_consuming(separated_pair(ws(identifier), char('='), command::parse_value))(text)
        .map(|(_, pair)| pair)
        .map_err(|_| SessionError::Parse(format!("expected key=value, got '{}'", text)))
}

/// Parse `"lo,hi"` into two finite numbers; anything else is `None`
pub fn parse_pair(text: &str) -> Option<(f64, f64)> {
    all_consuming(separated_pair(
        ws(number_literal),
        char(','),
        ws(number_literal),
    ))(text)
    .ok()
    .map(|(_, pair)| pair)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("  widgets ").unwrap(), Command::Widgets);
        assert_eq!(parse_line("preview 3").unwrap(), Command::Preview(Some(3)));
        assert_eq!(
            parse_line("set palette = 'rocket'").unwrap(),
            Command::Set {
                key: "palette".into(),
                value: ParamValue::text("rocket")
            }
        );
    }

    #[test]
    fn test_parse_line_rejects_garbage() {
        assert!(matches!(parse_line("frobnicate"), Err(SessionError::Parse(_))));
        assert!(parse_line("set = 3").is_err());
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("bins=20").unwrap(),
            ("bins".to_string(), ParamValue::Int(20))
        );
        assert_eq!(
            parse_assignment("hue_order=[Thu, Fri]").unwrap().1,
            ParamValue::List(vec!["Thu".into(), "Fri".into()])
        );
        assert!(parse_assignment("=3").is_err());
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(parse_pair("0,100"), Some((0.0, 100.0)));
        assert_eq!(parse_pair("-1.5, 2e1"), Some((-1.5, 20.0)));
        assert_eq!(parse_pair("abc"), None);
        assert_eq!(parse_pair("1,2,3"), None);
        assert_eq!(parse_pair("inf,2"), None);
    }
}
