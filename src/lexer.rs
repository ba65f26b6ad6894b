//! Lexical analysis: one line of input in, an ordered sequence of tokens out.
//!
//! The lexer only deals with quoting and escaping. Pipe and redirection
//! operators are not special here; they come out as ordinary tokens and the
//! planner recognizes them by exact string comparison.

/// A token produced by the lexer.
///
/// `text` carries no type tag. `quoted` is set when any character of the
/// token was produced inside quotes or through a backslash escape; the
/// planner refuses to treat such tokens as operators, which is why
/// `echo ">"` prints `>` instead of redirecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub quoted: bool,
}

impl Token {
    /// True when this token may act as the given operator.
    pub fn is_operator(&self, op: &str) -> bool {
        !self.quoted && self.text == op
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexState {
    Unquoted,
    SingleQuoted,
    DoubleQuoted,
}

struct Lexer {
    input: Vec<char>,
    pos: usize,
    state: LexState,
    buffer: String,
    buffer_quoted: bool,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(line: &str) -> Self {
        Lexer {
            input: line.chars().collect(),
            pos: 0,
            state: LexState::Unquoted,
            buffer: String::new(),
            buffer_quoted: false,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<Token> {
        while let Some(ch) = self.read_char() {
            match self.state {
                LexState::Unquoted => self.handle_unquoted(ch),
                LexState::SingleQuoted => self.handle_single_quoted(ch),
                LexState::DoubleQuoted => self.handle_double_quoted(ch),
            }
        }
        // An unterminated quote yields whatever has been accumulated.
        self.flush_token();
        self.tokens
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn handle_unquoted(&mut self, ch: char) {
        match ch {
            c if c.is_whitespace() => self.flush_token(),
            '\\' => match self.read_char() {
                // A backslash escapes the next character verbatim, quotes
                // and whitespace included.
                Some(escaped) => {
                    self.buffer.push(escaped);
                    self.buffer_quoted = true;
                }
                // A trailing backslash is kept literally.
                None => self.buffer.push('\\'),
            },
            '\'' => {
                self.state = LexState::SingleQuoted;
                self.buffer_quoted = true;
            }
            '"' => {
                self.state = LexState::DoubleQuoted;
                self.buffer_quoted = true;
            }
            c => self.buffer.push(c),
        }
    }

    fn handle_single_quoted(&mut self, ch: char) {
        // No escapes in here; only the closing quote is special.
        if ch == '\'' {
            self.state = LexState::Unquoted;
        } else {
            self.buffer.push(ch);
        }
    }

    fn handle_double_quoted(&mut self, ch: char) {
        match ch {
            '"' => self.state = LexState::Unquoted,
            '\\' => {
                // A backslash only escapes `"` and `\`; before anything
                // else it is kept literally.
                match self.peek_char() {
                    Some(next) if next == '"' || next == '\\' => {
                        self.read_char();
                        self.buffer.push(next);
                    }
                    _ => self.buffer.push('\\'),
                }
            }
            c => self.buffer.push(c),
        }
    }

    fn flush_token(&mut self) {
        if !self.buffer.is_empty() {
            self.tokens.push(Token {
                text: std::mem::take(&mut self.buffer),
                quoted: self.buffer_quoted,
            });
        }
        self.buffer_quoted = false;
    }
}

/// Tokenize one line of input.
///
/// Total over all inputs: never fails, runs in one pass over the line, and
/// never produces an empty token. Whitespace separates tokens and runs of
/// whitespace collapse.
pub fn lex(line: &str) -> Vec<Token> {
    Lexer::new(line).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(line: &str) -> Vec<String> {
        lex(line).into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn splits_on_whitespace_and_collapses_runs() {
        assert_eq!(texts("echo   a  b"), vec!["echo", "a", "b"]);
        assert_eq!(texts("  echo a  "), vec!["echo", "a"]);
    }

    #[test]
    fn empty_line_yields_no_tokens() {
        assert!(lex("").is_empty());
        assert!(lex("   \t  ").is_empty());
    }

    #[test]
    fn single_quotes_preserve_everything() {
        assert_eq!(texts("echo 'hello   world'"), vec!["echo", "hello   world"]);
        // Backslash and double quote are literal inside single quotes.
        assert_eq!(texts(r#"echo 'a\b"c'"#), vec!["echo", r#"a\b"c"#]);
    }

    #[test]
    fn double_quotes_escape_only_quote_and_backslash() {
        assert_eq!(texts(r#"echo "a\"b\\c""#), vec!["echo", r#"a"b\c"#]);
        // Before any other character the backslash is kept.
        assert_eq!(texts(r#""a\bc""#), vec![r"a\bc"]);
        // Whitespace and single quotes are literal.
        assert_eq!(texts(r#""a b'c""#), vec!["a b'c"]);
    }

    #[test]
    fn backslash_escapes_outside_quotes() {
        assert_eq!(texts(r"one\ two"), vec!["one two"]);
        assert_eq!(texts(r"a\'b"), vec!["a'b"]);
        assert_eq!(texts(r#"a\"b"#), vec![r#"a"b"#]);
    }

    #[test]
    fn trailing_backslash_is_kept() {
        assert_eq!(texts(r"echo abc\"), vec!["echo", r"abc\"]);
        assert_eq!(texts(r#""abc\"#), vec![r"abc\"]);
    }

    #[test]
    fn unterminated_quote_yields_accumulated_text() {
        assert_eq!(texts("echo 'abc"), vec!["echo", "abc"]);
        assert_eq!(texts("echo \"abc def"), vec!["echo", "abc def"]);
    }

    #[test]
    fn quote_symmetry_for_plain_words() {
        for word in ["s", "hello", "a1b2"] {
            let bare = texts(word);
            let single = texts(&format!("'{}'", word));
            let double = texts(&format!("\"{}\"", word));
            assert_eq!(bare, vec![word.to_string()]);
            assert_eq!(single, bare);
            assert_eq!(double, bare);
        }
    }

    #[test]
    fn adjacent_quoted_and_bare_parts_join_into_one_token() {
        assert_eq!(texts("a'b'c"), vec!["abc"]);
        assert_eq!(texts("'a'\"b\""), vec!["ab"]);
    }

    #[test]
    fn empty_quotes_produce_no_token() {
        assert_eq!(texts("echo ''"), vec!["echo"]);
        assert_eq!(texts("\"\""), Vec::<String>::new());
    }

    #[test]
    fn operators_come_out_as_plain_tokens() {
        let tokens = lex("echo hi > out.txt 2>> err.txt | wc");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["echo", "hi", ">", "out.txt", "2>>", "err.txt", "|", "wc"]);
        assert!(tokens.iter().all(|t| !t.quoted));
    }

    #[test]
    fn quoted_operators_are_marked() {
        let tokens = lex(r#"echo ">" '|' \>"#);
        assert_eq!(tokens[1].text, ">");
        assert!(tokens[1].quoted);
        assert_eq!(tokens[2].text, "|");
        assert!(tokens[2].quoted);
        assert_eq!(tokens[3].text, ">");
        assert!(tokens[3].quoted);
        assert!(!tokens[1].is_operator(">"));
    }

    #[test]
    fn no_token_is_ever_empty() {
        for line in ["", "''", "\"\" \"\"", "a '' b", "  '  ' "] {
            assert!(lex(line).iter().all(|t| !t.text.is_empty()));
        }
    }
}
