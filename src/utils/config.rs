use dotenv::dotenv;
use rustyline::EditMode;
use std::env;
use std::fs;
use std::path::PathBuf;

pub struct Config {
    pub name: String,
    pub history_file: PathBuf,
    pub editor_mode: String,
    pub logger_level: String,
    pub logger_dir: PathBuf,
    pub config_dir: PathBuf,
}

impl Config {
    fn get_config_dir() -> PathBuf {
        if let Ok(home) = env::var("HOME") {
            PathBuf::from(home).join(".config/minish")
        } else {
            PathBuf::from("tmp")
        }
    }

    fn default() -> Self {
        let config_dir = Self::get_config_dir();
        Config {
            // matches the binary crate name, which is what log targets carry
            name: String::from("msh"),
            history_file: config_dir.join(".msh_history"),
            editor_mode: String::from("vi"),
            logger_level: String::from("info"),
            logger_dir: config_dir.join("logs"),
            config_dir,
        }
    }

    pub fn new() -> Self {
        // environment overrides take priority
        if cfg!(debug_assertions) {
            dotenv::from_filename(".env.development").ok();
        } else {
            dotenv().ok();
        }

        let mut config = Config::default();

        if let Ok(editor) = env::var("MSH_EDITOR") {
            config.editor_mode = editor;
        }

        if let Ok(history) = env::var("MSH_HISTORY") {
            config.history_file = PathBuf::from(history);
        }

        if let Ok(level) = env::var("MSH_LOG_LEVEL") {
            config.logger_level = level;
        }

        if let Ok(dir) = env::var("MSH_LOG_DIR") {
            config.logger_dir = PathBuf::from(dir);
        }

        if let Some(parent) = config.history_file.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!("msh: cannot create history directory: {}", e);
            }
        }

        config
    }

    pub fn get_edit_mode(&self) -> EditMode {
        match self.editor_mode.to_lowercase().as_str() {
            "emacs" => EditMode::Emacs,
            _ => EditMode::Vi,
        }
    }
}
