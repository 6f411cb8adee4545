/// A front-end command, already stripped of any `@botname` suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Returns,
    Volume,
    Report,
    AddTicker(Option<String>),
    RemoveTicker(Option<String>),
    ListTickers,
}

impl Command {
    /// Parses chat text such as `/addticker jpm` or `/dados@my_bot`.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split_whitespace();
        let head = parts.next()?.strip_prefix('/')?;
        let name = head.split('@').next().unwrap_or(head).to_lowercase();
        let argument = parts.next().map(str::to_string);

        let command = match name.as_str() {
            "start" | "help" => Command::Start,
            "dados" => Command::Returns,
            "volume" => Command::Volume,
            "relatorio" => Command::Report,
            "addticker" => Command::AddTicker(argument),
            "removeticker" => Command::RemoveTicker(argument),
            "listtickers" => Command::ListTickers,
            _ => return None,
        };
        Some(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        assert_eq!(Command::parse("/dados"), Some(Command::Returns));
        assert_eq!(Command::parse("/relatorio@snapshot_bot"), Some(Command::Report));
        assert_eq!(Command::parse("  /VOLUME "), Some(Command::Volume));
        assert_eq!(
            Command::parse("/addticker jpm"),
            Some(Command::AddTicker(Some("jpm".to_string())))
        );
        assert_eq!(Command::parse("/removeticker"), Some(Command::RemoveTicker(None)));
    }

    #[test]
    fn ignores_plain_text_and_unknown_commands() {
        assert_eq!(Command::parse("hello"), None);
        assert_eq!(Command::parse("/unknown"), None);
        assert_eq!(Command::parse(""), None);
    }
}
