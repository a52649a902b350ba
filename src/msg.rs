use std::path::PathBuf;

/// Everything that drives a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// One line typed on stdin.
    Input(String),
    /// Stdin reached end of file.
    InputClosed,
    /// Something was created, modified or removed in a registered root.
    RootChanged(PathBuf),
    Quit,
}

/// Parsed session command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open(PathBuf),
    Close(PathBuf),
    Register(Option<PathBuf>),
    Rescan,
    Select,
    List,
    Env,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl Command {
    pub fn parse(raw: &str) -> Self {
        let input = raw.trim();
        let (verb, rest) = match input.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, unquote(rest)),
            None => (input, String::new()),
        };

        match (verb, rest.is_empty()) {
            ("", _) => Command::Empty,
            ("open" | "o", false) => Command::Open(PathBuf::from(rest)),
            ("close" | "c", false) => Command::Close(PathBuf::from(rest)),
            ("register", true) => Command::Register(None),
            ("register", false) => Command::Register(Some(PathBuf::from(rest))),
            ("rescan" | "scan", true) => Command::Rescan,
            ("select", true) => Command::Select,
            ("list" | "ls", true) => Command::List,
            ("env", true) => Command::Env,
            ("help" | "?", true) => Command::Help,
            ("quit" | "q" | "exit", true) => Command::Quit,
            _ => Command::Unknown(input.to_string()),
        }
    }
}

/// Strips one pair of matching quotes and resolves backslash escapes inside.
fn unquote(raw: &str) -> String {
    let input = raw.trim();
    if input.len() < 2 {
        return input.to_string();
    }

    let mut chars = input.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };

    if (first != '"' && first != '\'') || !input.ends_with(first) {
        return input.to_string();
    }

    let inner = &input[first.len_utf8()..input.len() - first.len_utf8()];
    let mut out = String::with_capacity(inner.len());
    let mut escaped = false;

    for ch in inner.chars() {
        if escaped {
            out.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else {
            out.push(ch);
        }
    }

    if escaped {
        out.push('\\');
    }

    out
}
