use crate::error::ScriptError;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
pub type ExitCode = i32;

/// Exit code reported when a script ends without a `main` command.
pub const MISSING_ENTRY_POINT: ExitCode = 1;

/// One parsed control-script line.
///
/// Payloads borrow from the line they were parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// `path\t<filesystem-path>`: queue a location for the next layer.
    Path(&'a str),
    /// `load\t<qualified-name>`: compose pending locations, then preload the unit.
    Load(&'a str),
    /// `exit\t<code>`: stop immediately with the given code.
    Exit(ExitCode),
    /// `main\t<qualified-name>`: designate the entry point.
    Main(&'a str),
    /// `arg\t<text>`: everything from byte offset 4 onwards, tabs included.
    Arg(&'a str),
    /// Any other keyword, including blank lines.
    Unknown,
}

impl<'a> Command<'a> {
    /// Offset of the `arg` payload: the keyword plus its tab.
    const ARG_OFFSET: usize = 4;

    /// Parse a single line. `line_no` is 1-based and only used for diagnostics.
    pub fn parse(line: &'a str, line_no: usize) -> Result<Self, ScriptError> {
        let mut fields = line.split('\t');
        let keyword = fields.next().unwrap_or_default();
        let mut payload = |keyword: &'static str| {
            fields
                .next()
                .filter(|field| !field.is_empty())
                .ok_or(ScriptError::MissingField {
                    line: line_no,
                    keyword,
                })
        };

        Ok(match keyword {
            "path" => Command::Path(payload("path")?),
            "load" => Command::Load(payload("load")?),
            "main" => Command::Main(payload("main")?),
            "exit" => {
                let value = payload("exit")?;
                let code = value
                    .parse()
                    .map_err(|source| ScriptError::InvalidExitCode {
                        line: line_no,
                        value: value.to_owned(),
                        source,
                    })?;
                Command::Exit(code)
            }
            // The keyword matched exactly, so byte 3 is either the end of the
            // line or a tab and offset 4 is a char boundary.
            "arg" => Command::Arg(line.get(Self::ARG_OFFSET..).ok_or(
                ScriptError::MissingField {
                    line: line_no,
                    keyword: "arg",
                },
            )?),
            _ => Command::Unknown,
        })
    }
}
