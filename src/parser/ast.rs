// Commands of the interactive session language

use crate::params::ParamValue;

/// One parsed input line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `load <path> [mime]`
    Load { path: String, mime: Option<String> },
    /// `family <name>`
    Family(String),
    /// `chart <name>`
    Chart(String),
    /// `set <key> = <value>`
    Set { key: String, value: ParamValue },
    /// `unset <key>`
    Unset(String),
    Widgets,
    Record,
    /// `render [path]`
    Render(Option<String>),
    /// `view [path]`
    View(Option<String>),
    /// `preview [n]`
    Preview(Option<usize>),
    Menu,
    Help,
    Quit,
}
