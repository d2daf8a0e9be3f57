//! Parsing of console input lines into commands.

/// One line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Empty,
    Help,
    Quit,
    /// Submit the login form, or switch to the login screen.
    Login,
    /// Submit the sign-up form, or switch to the sign-up screen.
    SignUp,
    Tasks,
    Profile,
    New,
    Edit(String),
    Delete(String),
    Search(String),
    Status(String),
    Priority(String),
    ClearFilters,
    Refresh,
    RefreshSession,
    EditProfile,
    Logout,
    Unknown(String),
}

impl Command {
    /// Parse a line. The verb is case-insensitive; the argument keeps its
    /// case but is trimmed.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (verb, arg) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(verb, rest)| (verb, rest.trim()));
        let arg = arg.to_owned();
        match verb.to_ascii_lowercase().as_str() {
            "" => Self::Empty,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            "login" | "signin" => Self::Login,
            "signup" | "register" => Self::SignUp,
            "tasks" => Self::Tasks,
            "profile" => Self::Profile,
            "new" | "add" => Self::New,
            "edit" => Self::Edit(arg),
            "delete" | "rm" => Self::Delete(arg),
            "search" => Self::Search(arg),
            "status" => Self::Status(arg),
            "priority" => Self::Priority(arg),
            "clear" | "clear-filters" => Self::ClearFilters,
            "refresh" => Self::Refresh,
            "refresh-session" => Self::RefreshSession,
            "edit-profile" => Self::EditProfile,
            "logout" | "signout" => Self::Logout,
            _ => Self::Unknown(verb.to_owned()),
        }
    }
}
