// Command parser for the session language

use super::ast::Command;
use super::lexer::{identifier, keyword, string_literal, word_or_string, ws};
use crate::params::ParamValue;
use nom::{
    branch::alt,
    bytes::complete::is_not,
    character::complete::{char, digit1, multispace1},
    combinator::{map, map_res, opt, rest, value, verify},
    multi::separated_list0,
    sequence::{delimited, preceded},
    IResult,
};

/// Turn an unquoted token into the most specific value it spells
pub fn classify(token: &str) -> ParamValue {
    let token = token.trim();
    match token.to_ascii_lowercase().as_str() {
        "none" | "null" => return ParamValue::Null,
        "true" => return ParamValue::Bool(true),
        "false" => return ParamValue::Bool(false),
        _ => {}
    }
    if let Ok(i) = token.parse::<i64>() {
        return ParamValue::Int(i);
    }
    let numeric_start = token
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'));
    if numeric_start {
        if let Ok(f) = token.parse::<f64>() {
            if f.is_finite() {
                return ParamValue::Float(f);
            }
        }
    }
    ParamValue::text(token)
}

/// Parse a list literal
/// Format: [a, "b c", 3]
fn list_literal(input: &str) -> IResult<&str, Vec<String>> {
    delimited(
        ws(char('[')),
        separated_list0(
            ws(char(',')),
            ws(alt((
                string_literal,
                map(is_not(",]"), |s: &str| s.trim().to_string()),
            ))),
        ),
        ws(char(']')),
    )(input)
}

/// Parse the right-hand side of `set`
pub fn parse_value(input: &str) -> IResult<&str, ParamValue> {
    alt((
        map(list_literal, ParamValue::List),
        map(ws(string_literal), ParamValue::Text),
        map(verify(rest, |s: &str| !s.trim().is_empty()), classify),
    ))(input)
}

/// Rest of the line as a (possibly multi-word) name
fn name_argument(input: &str) -> IResult<&str, String> {
    alt((
        ws(string_literal),
        map(verify(rest, |s: &str| !s.trim().is_empty()), |s: &str| {
            s.trim().to_string()
        }),
    ))(input)
}

/// Parse a load command
/// Format: load data.csv or load "my data.xlsx" application/vnd.ms-excel
pub fn parse_load(input: &str) -> IResult<&str, Command> {
    let (input, _) = ws(keyword("load"))(input)?;
    let (input, path) = word_or_string(input)?;
    let (input, mime) = opt(preceded(multispace1, word_or_string))(input)?;
    Ok((input, Command::Load { path, mime }))
}

/// Parse a set command
/// Format: set key = value
pub fn parse_set(input: &str) -> IResult<&str, Command> {
    let (input, _) = ws(keyword("set"))(input)?;
    let (input, key) = ws(identifier)(input)?;
    let (input, _) = ws(char('='))(input)?;
    let (input, value) = parse_value(input)?;
    Ok((input, Command::Set { key, value }))
}

fn parse_unset(input: &str) -> IResult<&str, Command> {
    map(preceded(ws(keyword("unset")), ws(identifier)), Command::Unset)(input)
}

fn parse_family(input: &str) -> IResult<&str, Command> {
    map(preceded(ws(keyword("family")), name_argument), Command::Family)(input)
}

fn parse_chart(input: &str) -> IResult<&str, Command> {
    map(preceded(ws(keyword("chart")), name_argument), Command::Chart)(input)
}

fn parse_render(input: &str) -> IResult<&str, Command> {
    map(
        preceded(ws(keyword("render")), opt(ws(word_or_string))),
        Command::Render,
    )(input)
}

fn parse_view(input: &str) -> IResult<&str, Command> {
    map(
        preceded(ws(keyword("view")), opt(ws(word_or_string))),
        Command::View,
    )(input)
}

fn parse_preview(input: &str) -> IResult<&str, Command> {
    map(
        preceded(
            ws(keyword("preview")),
            opt(ws(map_res(digit1, |d: &str| d.parse::<usize>()))),
        ),
        Command::Preview,
    )(input)
}

fn parse_simple(input: &str) -> IResult<&str, Command> {
    alt((
        value(Command::Widgets, ws(keyword("widgets"))),
        value(Command::Record, ws(keyword("record"))),
        value(Command::Menu, ws(keyword("menu"))),
        value(Command::Help, ws(keyword("help"))),
        value(Command::Quit, ws(alt((keyword("quit"), keyword("exit"))))),
    ))(input)
}

/// Parse any command
pub fn parse_command(input: &str) -> IResult<&str, Command> {
    alt((
        parse_load,
        parse_set,
        parse_unset,
        parse_family,
        parse_chart,
        parse_render,
        parse_view,
        parse_preview,
        parse_simple,
    ))(input)
}
