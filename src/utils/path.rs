use std::borrow::Cow;
use std::env;

use log::error;

pub fn basename(path: &str) -> Cow<'_, str> {
    let mut pieces = path.rsplit('/');
    match pieces.next() {
        Some(p) => p.into(),
        None => path.into(),
    }
}

pub fn current_dir() -> String {
    let dir = match env::current_dir() {
        Ok(x) => x,
        Err(e) => {
            error!("msh: env current_dir error: {}", e);
            return String::new();
        }
    };
    match dir.to_str() {
        Some(x) => x.to_string(),
        None => {
            error!("msh: current dir is not valid UTF-8");
            String::new()
        }
    }
}
