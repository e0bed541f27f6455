use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    Word(String),
    Pipe,
    And,
    Or,
    Redirect(RedirectOp),
    Background,
    Semi,
    EOF,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RedirectOp {
    Input,  // <
    Output, // >
    Append, // >>
}

pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.chars().peekable(),
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        match self.peek_char() {
            None => Token::EOF,
            Some(c) => match c {
                '|' => {
                    self.read_char();
                    if self.peek_char() == Some('|') {
                        self.read_char();
                        Token::Or
                    } else {
                        Token::Pipe
                    }
                }
                ';' => {
                    self.read_char();
                    Token::Semi
                }
                '&' => {
                    self.read_char();
                    if self.peek_char() == Some('&') {
                        self.read_char();
                        Token::And
                    } else {
                        Token::Background
                    }
                }
                '<' => {
                    self.read_char();
                    Token::Redirect(RedirectOp::Input)
                }
                '>' => {
                    self.read_char();
                    if self.peek_char() == Some('>') {
                        self.read_char();
                        Token::Redirect(RedirectOp::Append)
                    } else {
                        Token::Redirect(RedirectOp::Output)
                    }
                }
                _ => self.read_word(),
            },
        }
    }

    fn read_char(&mut self) -> Option<char> {
        self.input.next()
    }

    fn peek_char(&mut self) -> Option<char> {
        self.input.peek().copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if !c.is_whitespace() {
                break;
            }
            self.read_char();
        }
    }

    fn read_word(&mut self) -> Token {
        let mut word = String::new();

        while let Some(c) = self.peek_char() {
            if c.is_whitespace() || ";<>|&".contains(c) {
                break;
            }
            word.push(self.read_char().unwrap_or_default());
        }

        Token::Word(word)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_command() {
        let mut lexer = Lexer::new("ls -l");
        assert_eq!(lexer.next_token(), Token::Word("ls".to_string()));
        assert_eq!(lexer.next_token(), Token::Word("-l".to_string()));
        assert_eq!(lexer.next_token(), Token::EOF);
    }

    #[test]
    fn test_pipe() {
        let mut lexer = Lexer::new("ls | grep foo");
        assert_eq!(lexer.next_token(), Token::Word("ls".to_string()));
        assert_eq!(lexer.next_token(), Token::Pipe);
        assert_eq!(lexer.next_token(), Token::Word("grep".to_string()));
        assert_eq!(lexer.next_token(), Token::Word("foo".to_string()));
        assert_eq!(lexer.next_token(), Token::EOF);
    }

    #[test]
    fn test_logical_operators() {
        let mut lexer = Lexer::new("true && echo yes || echo no");
        assert_eq!(lexer.next_token(), Token::Word("true".to_string()));
        assert_eq!(lexer.next_token(), Token::And);
        assert_eq!(lexer.next_token(), Token::Word("echo".to_string()));
        assert_eq!(lexer.next_token(), Token::Word("yes".to_string()));
        assert_eq!(lexer.next_token(), Token::Or);
        assert_eq!(lexer.next_token(), Token::Word("echo".to_string()));
        assert_eq!(lexer.next_token(), Token::Word("no".to_string()));
        assert_eq!(lexer.next_token(), Token::EOF);
    }

    #[test]
    fn test_redirections() {
        let mut lexer = Lexer::new("sort < in.txt >> out.txt");
        assert_eq!(lexer.next_token(), Token::Word("sort".to_string()));
        assert_eq!(lexer.next_token(), Token::Redirect(RedirectOp::Input));
        assert_eq!(lexer.next_token(), Token::Word("in.txt".to_string()));
        assert_eq!(lexer.next_token(), Token::Redirect(RedirectOp::Append));
        assert_eq!(lexer.next_token(), Token::Word("out.txt".to_string()));
        assert_eq!(lexer.next_token(), Token::EOF);
    }

    #[test]
    fn test_background_and_semi() {
        let mut lexer = Lexer::new("sleep 10 & echo hi;");
        assert_eq!(lexer.next_token(), Token::Word("sleep".to_string()));
        assert_eq!(lexer.next_token(), Token::Word("10".to_string()));
        assert_eq!(lexer.next_token(), Token::Background);
        assert_eq!(lexer.next_token(), Token::Word("echo".to_string()));
        assert_eq!(lexer.next_token(), Token::Word("hi".to_string()));
        assert_eq!(lexer.next_token(), Token::Semi);
        assert_eq!(lexer.next_token(), Token::EOF);
    }

    #[test]
    fn test_operators_without_spaces() {
        let mut lexer = Lexer::new("a|b&&c");
        assert_eq!(lexer.next_token(), Token::Word("a".to_string()));
        assert_eq!(lexer.next_token(), Token::Pipe);
        assert_eq!(lexer.next_token(), Token::Word("b".to_string()));
        assert_eq!(lexer.next_token(), Token::And);
        assert_eq!(lexer.next_token(), Token::Word("c".to_string()));
        assert_eq!(lexer.next_token(), Token::EOF);
    }
}
