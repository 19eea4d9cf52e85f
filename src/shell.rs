//! Shell quoting for command lines sent to clients.

const SHELL_META: &[char] = &[
    ' ', '\t', '\n', '\'', '"', '\\', '$', '`', '!', '*', '?', '[', ']', '(', ')', '{', '}',
    '<', '>', '|', '&', ';', '#', '~',
];


/// Quote a single word so the shell sees it verbatim.
pub fn quote(word: &str) -> String {
    if word.is_empty() {
        return "''".to_string();
    }
    if !word.contains(SHELL_META) {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', "'\\''"))
}


/// `export KEY=value;` with the value quoted.
pub fn export(key: &str, value: &str) -> String {
    format!("export {}={};", key, quote(value))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_words_pass_through() {
        assert_eq!(quote("/srv/app"), "/srv/app");
        assert_eq!(quote("web-1.example.com"), "web-1.example.com");
    }

    #[test]
    fn metacharacters_are_single_quoted() {
        assert_eq!(quote("/srv/my app"), "'/srv/my app'");
        assert_eq!(quote("$HOME/x"), "'$HOME/x'");
        assert_eq!(quote("it's"), "'it'\\''s'");
        assert_eq!(quote(""), "''");
    }

    #[test]
    fn export_quotes_value() {
        assert_eq!(export("SUP_HOST", "localhost"), "export SUP_HOST=localhost;");
        assert_eq!(export("GREETING", "hi there"), "export GREETING='hi there';");
    }
}
