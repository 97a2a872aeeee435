//! Hand-rolled SQL tokenizer.
//!
//! Just enough lexing for validation: distinguishes string literals (with
//! `''` escapes), quoted identifiers, bare words, numbers and symbols.
//! Comments are skipped. No parse tree is built; validators walk the token
//! stream directly.

/// Lexical class of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare identifier or keyword.
    Word,
    /// `"quoted"` identifier, quotes stripped.
    QuotedIdent,
    /// `'string'` literal, quotes stripped and `''` unescaped.
    StringLiteral,
    /// Numeric literal.
    Number,
    /// Any other single character (punctuation, operators).
    Symbol,
}

/// One lexed token.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    fn new(kind: TokenKind, text: String) -> Self {
        Self { kind, text }
    }

    /// Lowercased text, the form validators compare against.
    pub fn lower(&self) -> String {
        self.text.to_lowercase()
    }

    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(word)
    }

    pub fn is_symbol(&self, symbol: char) -> bool {
        self.kind == TokenKind::Symbol && self.text.len() == 1 && self.text.starts_with(symbol)
    }
}

/// Tokenize a SQL string. Unterminated literals consume to end of input
/// rather than failing; validation happens downstream.
pub fn tokenize(sql: &str) -> Vec<Token> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // -- line comment
        if c == '-' && chars.get(i + 1) == Some(&'-') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        // /* block comment */
        if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            while i < chars.len() {
                if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                    i += 2;
                    break;
                }
                i += 1;
            }
            continue;
        }

        // 'string literal' with '' escape
        if c == '\'' {
            let mut text = String::new();
            i += 1;
            while i < chars.len() {
                if chars[i] == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        text.push('\'');
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                text.push(chars[i]);
                i += 1;
            }
            tokens.push(Token::new(TokenKind::StringLiteral, text));
            continue;
        }

        // "quoted identifier" with "" escape
        if c == '"' {
            let mut text = String::new();
            i += 1;
            while i < chars.len() {
                if chars[i] == '"' {
                    if chars.get(i + 1) == Some(&'"') {
                        text.push('"');
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                text.push(chars[i]);
                i += 1;
            }
            tokens.push(Token::new(TokenKind::QuotedIdent, text));
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            let mut text = String::new();
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                text.push(chars[i]);
                i += 1;
            }
            tokens.push(Token::new(TokenKind::Word, text));
            continue;
        }

        if c.is_ascii_digit() {
            let mut text = String::new();
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                text.push(chars[i]);
                i += 1;
            }
            tokens.push(Token::new(TokenKind::Number, text));
            continue;
        }

        tokens.push(Token::new(TokenKind::Symbol, c.to_string()));
        i += 1;
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(sql: &str) -> Vec<(TokenKind, String)> {
        tokenize(sql)
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn test_basic_select() {
        let tokens = tokenize("SELECT id FROM users");
        assert_eq!(tokens.len(), 4);
        assert!(tokens[0].is_word("select"));
        assert!(tokens[1].is_word("id"));
        assert!(tokens[2].is_word("from"));
        assert!(tokens[3].is_word("users"));
    }

    #[test]
    fn test_string_literal_with_escape() {
        let tokens = kinds("WHERE name = 'O''Brien'");
        assert_eq!(
            tokens[3],
            (TokenKind::StringLiteral, "O'Brien".to_string())
        );
    }

    #[test]
    fn test_quoted_identifier() {
        let tokens = kinds(r#"SELECT "order count" FROM t"#);
        assert_eq!(
            tokens[1],
            (TokenKind::QuotedIdent, "order count".to_string())
        );
    }

    #[test]
    fn test_numbers_and_symbols() {
        let tokens = kinds("WHERE total >= 10.5");
        assert_eq!(tokens[1], (TokenKind::Symbol, ">".to_string()));
        assert_eq!(tokens[2], (TokenKind::Symbol, "=".to_string()));
        assert_eq!(tokens[3], (TokenKind::Number, "10.5".to_string()));
    }

    #[test]
    fn test_line_comment_skipped() {
        let tokens = tokenize("SELECT 1 -- trailing note\nFROM t");
        assert_eq!(tokens.len(), 4);
        assert!(tokens[2].is_word("from"));
    }

    #[test]
    fn test_block_comment_skipped() {
        let tokens = tokenize("SELECT /* hint */ id FROM t");
        assert_eq!(tokens.len(), 4);
        assert!(tokens[1].is_word("id"));
    }

    #[test]
    fn test_unterminated_literal_consumes_rest() {
        let tokens = tokenize("WHERE x = 'oops");
        assert_eq!(tokens.last().unwrap().kind, TokenKind::StringLiteral);
        assert_eq!(tokens.last().unwrap().text, "oops");
    }

    #[test]
    fn test_literal_is_not_an_identifier() {
        // Content of string literals must never look like column references
        let tokens = tokenize("WHERE status = 'started_at'");
        let words: Vec<_> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Word)
            .map(|t| t.lower())
            .collect();
        assert_eq!(words, vec!["where", "status"]);
    }
}
