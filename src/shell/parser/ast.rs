use std::fmt;

use super::lexer::RedirectOp;

/// Command tree handed to the executor. Built once per input line and
/// consumed read-only.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Simple {
        program: String,
        args: Vec<String>,
    },
    Redirect {
        child: Box<Node>,
        direction: RedirectOp,
        target: String,
    },
    Pipe {
        left: Box<Node>,
        right: Box<Node>,
    },
    Sequence {
        left: Box<Node>,
        right: Box<Node>,
    },
    And {
        left: Box<Node>,
        right: Box<Node>,
    },
    Or {
        left: Box<Node>,
        right: Box<Node>,
    },
    Background {
        child: Box<Node>,
    },
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Simple { program, args } => {
                write!(f, "{}", program)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                Ok(())
            }
            Node::Redirect {
                child,
                direction,
                target,
            } => {
                let op = match direction {
                    RedirectOp::Input => "<",
                    RedirectOp::Output => ">",
                    RedirectOp::Append => ">>",
                };
                write!(f, "{} {} {}", child, op, target)
            }
            Node::Pipe { left, right } => write!(f, "{} | {}", left, right),
            Node::Sequence { left, right } => write!(f, "{} ; {}", left, right),
            Node::And { left, right } => write!(f, "{} && {}", left, right),
            Node::Or { left, right } => write!(f, "{} || {}", left, right),
            Node::Background { child } => write!(f, "{} &", child),
        }
    }
}
