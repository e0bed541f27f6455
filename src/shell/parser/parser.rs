use super::ast::Node;
use super::lexer::{Lexer, RedirectOp, Token};

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current_token: Token,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token();
        Parser {
            lexer,
            current_token,
        }
    }

    fn next_token(&mut self) {
        self.current_token = self.lexer.next_token();
    }

    /// Parse one input line into its top-level command trees. `&`
    /// terminates the current tree and wraps it in a background marker,
    /// so a background node is always the outermost operator; `;` joins
    /// trees into a sequence node instead of splitting them.
    pub fn parse_line(&mut self) -> Result<Vec<Node>, String> {
        let mut trees = Vec::new();

        while self.current_token != Token::EOF {
            if self.current_token == Token::Semi {
                self.next_token();
                continue;
            }

            let mut node = self.parse_and_or()?;
            loop {
                match self.current_token {
                    Token::Semi => {
                        self.next_token();
                        if matches!(self.current_token, Token::EOF | Token::Semi) {
                            break;
                        }
                        let right = self.parse_and_or()?;
                        node = Node::Sequence {
                            left: Box::new(node),
                            right: Box::new(right),
                        };
                    }
                    Token::Background => {
                        self.next_token();
                        node = Node::Background {
                            child: Box::new(node),
                        };
                        break;
                    }
                    Token::EOF => break,
                    ref token => return Err(format!("unexpected token {:?}", token)),
                }
            }
            trees.push(node);
        }

        Ok(trees)
    }

    fn parse_and_or(&mut self) -> Result<Node, String> {
        let mut node = self.parse_pipeline()?;

        loop {
            match self.current_token {
                Token::And => {
                    self.next_token();
                    let right = self.parse_pipeline()?;
                    node = Node::And {
                        left: Box::new(node),
                        right: Box::new(right),
                    };
                }
                Token::Or => {
                    self.next_token();
                    let right = self.parse_pipeline()?;
                    node = Node::Or {
                        left: Box::new(node),
                        right: Box::new(right),
                    };
                }
                _ => break,
            }
        }

        Ok(node)
    }

    fn parse_pipeline(&mut self) -> Result<Node, String> {
        let mut node = self.parse_command()?;

        while self.current_token == Token::Pipe {
            self.next_token();
            let right = self.parse_command()?;
            node = Node::Pipe {
                left: Box::new(node),
                right: Box::new(right),
            };
        }

        Ok(node)
    }

    /// A simple command plus its redirections. Redirections wrap the
    /// simple node inside-out in source order.
    fn parse_command(&mut self) -> Result<Node, String> {
        let mut program = None;
        let mut args = Vec::new();
        let mut redirections = Vec::new();

        loop {
            match &self.current_token {
                Token::Word(word) => {
                    if program.is_none() {
                        program = Some(word.clone());
                    } else {
                        args.push(word.clone());
                    }
                    self.next_token();
                }
                Token::Redirect(op) => {
                    let direction = *op;
                    self.next_token();
                    match &self.current_token {
                        Token::Word(target) => {
                            redirections.push((direction, target.clone()));
                            self.next_token();
                        }
                        _ => {
                            return Err("expected filename after redirection operator".to_string())
                        }
                    }
                }
                _ => break,
            }
        }

        let program = program.ok_or_else(|| "expected command name".to_string())?;
        let mut node = Node::Simple { program, args };
        for (direction, target) in redirections {
            node = Node::Redirect {
                child: Box::new(node),
                direction,
                target,
            };
        }
        Ok(node)
    }
}
