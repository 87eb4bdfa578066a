//! Line-oriented command grammar for the terminal client.
//!
//! What a line means depends on the screen it is typed on: a name on the
//! start screen, a choice number on a question, code or a `:command` on the
//! coding screen.

use std::path::PathBuf;

use crate::controller::Screen;

/// A parsed line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start { name: String },
    /// Zero-based choice index.
    Choose(usize),
    Back,
    AppendLine(String),
    RunTests,
    Submit,
    ResetEditor,
    ShowEditor,
    LoadFile(PathBuf),
    /// The line made no sense here; the message explains what would.
    Unrecognized(String),
}

/// Help text for the coding screen.
pub const CODING_HELP: &str = "Type code lines to append them. Commands: :run (test), :submit, :show, :reset, :load <file>, :back";

/// Interpret `line` as typed on `screen`. Returns `None` when input is ignored.
pub fn parse_command(screen: Screen, line: &str) -> Option<Command> {
    let line = line.trim_end_matches(['\r', '\n']);
    match screen {
        Screen::Idle | Screen::AwaitingName => Some(Command::Start {
            name: line.to_string(),
        }),
        Screen::InQuestion(_) => Some(parse_choice(line.trim())),
        Screen::InCoding => Some(parse_coding(line)),
        Screen::Submitted => None,
    }
}

fn parse_choice(line: &str) -> Command {
    if line.eq_ignore_ascii_case("b") || line.eq_ignore_ascii_case("back") {
        return Command::Back;
    }
    match line.parse::<usize>() {
        Ok(n) if n >= 1 => Command::Choose(n - 1),
        _ => Command::Unrecognized("Enter the number of your answer.".to_string()),
    }
}

fn parse_coding(line: &str) -> Command {
    let trimmed = line.trim();
    let Some(command) = trimmed.strip_prefix(':') else {
        return Command::AppendLine(line.to_string());
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    match name {
        "run" => Command::RunTests,
        "submit" => Command::Submit,
        "reset" => Command::ResetEditor,
        "show" => Command::ShowEditor,
        "back" => Command::Back,
        "load" if !arg.is_empty() => Command::LoadFile(PathBuf::from(arg)),
        "load" => Command::Unrecognized("Usage: :load <file>".to_string()),
        _ => Command::Unrecognized(CODING_HELP.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_screen_takes_whole_line() {
        assert_eq!(
            parse_command(Screen::AwaitingName, "Ada Lovelace\n"),
            Some(Command::Start {
                name: "Ada Lovelace".into()
            })
        );
    }

    #[test]
    fn question_screen_parses_choice_numbers() {
        let screen = Screen::InQuestion(0);
        assert_eq!(parse_command(screen, " 2 "), Some(Command::Choose(1)));
        assert_eq!(parse_command(screen, "back"), Some(Command::Back));
        assert!(matches!(
            parse_command(screen, "0"),
            Some(Command::Unrecognized(_))
        ));
        assert!(matches!(
            parse_command(screen, "two"),
            Some(Command::Unrecognized(_))
        ));
    }

    #[test]
    fn coding_screen_keeps_indentation() {
        assert_eq!(
            parse_command(Screen::InCoding, "    return x\r\n"),
            Some(Command::AppendLine("    return x".into()))
        );
    }

    #[test]
    fn coding_screen_commands() {
        let screen = Screen::InCoding;
        assert_eq!(parse_command(screen, ":run"), Some(Command::RunTests));
        assert_eq!(parse_command(screen, " :submit "), Some(Command::Submit));
        assert_eq!(
            parse_command(screen, ":load solution.py"),
            Some(Command::LoadFile(PathBuf::from("solution.py")))
        );
        assert!(matches!(
            parse_command(screen, ":load"),
            Some(Command::Unrecognized(_))
        ));
        assert!(matches!(
            parse_command(screen, ":frobnicate"),
            Some(Command::Unrecognized(_))
        ));
    }

    #[test]
    fn submitted_screen_ignores_input() {
        assert_eq!(parse_command(Screen::Submitted, "1"), None);
    }
}
