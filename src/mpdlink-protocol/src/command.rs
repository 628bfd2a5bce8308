use std::fmt;

pub const COMMAND_LIST_BEGIN: &str = "command_list_begin";
pub const COMMAND_LIST_END: &str = "command_list_end";

/// A command name plus arguments, rendered with every argument quoted.
///
/// ```
/// use mpdlink_protocol::Command;
///
/// let cmd = Command::new("find").arg("artist").arg("Say \"Hi\"");
/// assert_eq!(cmd.to_string(), r#"find "artist" "Say \"Hi\"""#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    args: Vec<String>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, value: impl ToString) -> Self {
        self.args.push(value.to_string());
        self
    }

    pub fn args<I>(mut self, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: ToString,
    {
        self.args.extend(values.into_iter().map(|v| v.to_string()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for arg in &self.args {
            write!(f, " {}", quote_arg(arg))?;
        }
        Ok(())
    }
}

/// Wraps `value` in double quotes, escaping embedded quotes as `\"`.
pub fn quote_arg(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\\\""))
}

/// Joins sub-commands into one command list answered by a single frame.
pub fn batch<I>(commands: I) -> String
where
    I: IntoIterator,
    I::Item: fmt::Display,
{
    let mut text = String::from(COMMAND_LIST_BEGIN);
    for command in commands {
        text.push('\n');
        text.push_str(&command.to_string());
    }
    text.push('\n');
    text.push_str(COMMAND_LIST_END);
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_command_has_no_trailing_space() {
        assert_eq!(Command::new("status").to_string(), "status");
    }

    #[test]
    fn arguments_are_quoted() {
        let cmd = Command::new("seek").args([3, 120]);
        assert_eq!(cmd.to_string(), r#"seek "3" "120""#);
        assert_eq!(cmd.name(), "seek");
    }

    #[test]
    fn quote_escapes_embedded_quotes() {
        assert_eq!(quote_arg(r#"a "b" c"#), r#""a \"b\" c""#);
    }

    #[test]
    fn batch_wraps_commands() {
        let text = batch([Command::new("clear"), Command::new("add").arg("a.mp3")]);
        assert_eq!(
            text,
            "command_list_begin\nclear\nadd \"a.mp3\"\ncommand_list_end"
        );
        assert_eq!(
            batch(["play", "status"]),
            "command_list_begin\nplay\nstatus\ncommand_list_end"
        );
    }
}
