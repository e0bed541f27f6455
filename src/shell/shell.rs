use std::error::Error;
use std::io::Write;

use colored::Colorize;
use log::{debug, error, warn};

use crate::shell::executor::Executor;
use crate::shell::parser::ast::Node;
use crate::shell::parser::Parser;
use crate::shell::readline::{ReadlineError, ReadlineManager};
use crate::utils::config::Config;
use crate::utils::path;

enum BuiltinOutcome {
    Exit,
    Status(i32),
}

pub struct Shell<'a> {
    config: &'a Config,
    readline: ReadlineManager<'a>,
    executor: Executor,
    last_status: i32,
}

impl<'a> Shell<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            readline: ReadlineManager::new(config),
            executor: Executor::new(),
            last_status: 0,
        }
    }

    pub fn run(&mut self) -> Result<(), Box<dyn Error>> {
        debug!("starting {}...", self.config.name);
        self.readline.load_history()?;

        self.run_loop()?;
        self.readline.save_history()?;

        debug!("leaving {}...", self.config.name);
        Ok(())
    }

    fn run_loop(&mut self) -> Result<(), Box<dyn Error>> {
        loop {
            self.report_finished_jobs();
            std::io::stdout().flush()?;

            match self.readline.readline(&self.prompt()) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    self.readline.add_history(line.clone())?;
                    if !self.handle_input(&line) {
                        break;
                    }
                }
                Err(ReadlineError::Eof) => {
                    warn!("received EOF, leaving...");
                    break;
                }
                Err(ReadlineError::Interrupted) => {
                    warn!("interrupted");
                    self.last_status = 130;
                }
                Err(err) => {
                    error!("readline error: {}", err);
                    eprintln!("{}: {}", self.config.name, err);
                    break;
                }
            }
        }
        Ok(())
    }

    fn prompt(&self) -> String {
        let cwd = path::current_dir();
        let dir = path::basename(&cwd);
        let marker = if self.last_status == 0 {
            "$".bright_green()
        } else {
            "$".bright_red()
        };
        format!("{} {} ", dir.as_ref().bright_cyan(), marker)
    }

    /// Parse a line and run each resulting top-level tree in order.
    /// Returns false when the shell should terminate.
    fn handle_input(&mut self, line: &str) -> bool {
        debug!("input: {}", line);
        let trees = match Parser::new(line).parse_line() {
            Ok(trees) => trees,
            Err(err) => {
                eprintln!("{}: parse error: {}", self.config.name, err);
                self.last_status = 2;
                return true;
            }
        };

        for tree in trees {
            match self.try_builtin(&tree) {
                Some(BuiltinOutcome::Exit) => return false,
                Some(BuiltinOutcome::Status(status)) => self.last_status = status,
                None => {
                    debug!("executing: {}", tree);
                    self.last_status = self.executor.execute(&tree);
                    debug!("status: {}", self.last_status);
                }
            }
        }
        true
    }

    /// Builtins apply only when the whole tree is a single bare command;
    /// anything structured goes to the engine untouched.
    fn try_builtin(&mut self, tree: &Node) -> Option<BuiltinOutcome> {
        let Node::Simple { program, args } = tree else {
            return None;
        };
        match program.as_str() {
            "exit" => Some(BuiltinOutcome::Exit),
            "cd" => {
                let target = args.first().map(String::as_str).unwrap_or("~");
                let target = shellexpand::tilde(target);
                match std::env::set_current_dir(target.as_ref()) {
                    Ok(()) => Some(BuiltinOutcome::Status(0)),
                    Err(err) => {
                        eprintln!("{}: cd: {}", self.config.name, err);
                        Some(BuiltinOutcome::Status(1))
                    }
                }
            }
            "jobs" => {
                for job in self.executor.jobs().jobs() {
                    println!("{}", job);
                }
                Some(BuiltinOutcome::Status(0))
            }
            _ => None,
        }
    }

    fn report_finished_jobs(&mut self) {
        for (id, status) in self.executor.reap_jobs() {
            if status == 0 {
                println!("[{}] done", id);
            } else {
                println!("[{}] exited with status {}", id, status);
            }
        }
    }
}
