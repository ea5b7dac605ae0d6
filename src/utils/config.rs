#![forbid(unsafe_code)]

use anyhow::{Result, anyhow};
use clap::Parser;
use log::{info, error, LevelFilter};
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Root};
use serde::Deserialize;
use std::{env, fs, path::Path};
use fs_mistrust::Mistrust;
use std::os::unix::fs::PermissionsExt;
use lazy_static::lazy_static;

// Userdir Utilities
use crate::utils::{userdir_utils, errors::Errors};

use super::userdir_utils::get_absolute_path;

// ***************************************************************************
//                                Constants
// ***************************************************************************
// Directory and file locations. Unless otherwise noted, all files and directories
// are relative to the root directory.
const ENV_USERDIR_ROOT_DIR : &str = "USERDIR_ROOT_DIR";
const DEFAULT_ROOT_DIR     : &str = "~/.userdir";
const CONFIG_DIR           : &str = "/config";
const LOGS_DIR             : &str = "/logs";
const USERS_DIR            : &str = "/users";
const STATIC_DIR           : &str = "/static";
const LOG4RS_CONFIG_FILE   : &str = "/log4rs.yml";    // relative to config dir
const USERDIR_CONFIG_FILE  : &str = "/userdir.toml";  // relative to config dir

// Networking.
const DEFAULT_HTTP_ADDR    : &str = "http://localhost";
const DEFAULT_HTTP_PORT    : u16  = 3000;

// ***************************************************************************
//                             Static Variables
// ***************************************************************************
// Assign the command line arguments BEFORE RUNTIME_CTX is initialized in main.
lazy_static! {
    pub static ref USERDIR_ARGS: UserdirArgs = init_userdir_args();
}

// Calculate the data directories BEFORE RUNTIME_CTX is initialized in main.
lazy_static! {
    pub static ref USERDIR_DIRS: UserdirDirs = init_userdir_dirs();
}

// ***************************************************************************
//                             Directory Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// UserdirDirs:
// ---------------------------------------------------------------------------
#[derive(Debug)]
#[allow(dead_code)]
pub struct UserdirDirs {
    pub root_dir: String,
    pub config_dir: String,
    pub logs_dir: String,
    pub users_dir: String,
    pub static_dir: String,
}

// ***************************************************************************
//                               Config Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// UserdirArgs:
// ---------------------------------------------------------------------------
#[derive(Debug, Parser)]
#[command(name = "userdir_server", about = "Command line arguments for the user directory server.")]
pub struct UserdirArgs {
    /// Specify the server's root data directory.
    ///
    /// This directory contains all the files the server uses during execution.
    #[arg(short, long)]
    pub root_dir: Option<String>,

    /// Create the data directories and then exit.
    ///
    /// The data directories will be rooted at a root directory calculated
    /// using the following priority order:
    ///
    ///   1. If set, the value of the USERDIR_ROOT_DIR environment,
    ///
    ///   2. Otherwise, if set, the value of the --root-dir command line argument,
    ///
    ///   3. Otherwise, ~/.userdir
    ///
    #[arg(short, long)]
    pub create_dirs_only: bool,
}

// ---------------------------------------------------------------------------
// Parms:
// ---------------------------------------------------------------------------
#[derive(Debug)]
#[allow(dead_code)]
pub struct Parms {
    pub config_file: String,
    pub config: Config,
}

// ---------------------------------------------------------------------------
// RuntimeCtx:
// ---------------------------------------------------------------------------
#[derive(Debug)]
#[allow(dead_code)]
pub struct RuntimeCtx {
    pub parms: Parms,
    pub userdir_args: &'static UserdirArgs,
    pub userdir_dirs: &'static UserdirDirs,
}

impl RuntimeCtx {
    /// The directory holding one record file per user.  The configured
    /// users_dir wins over the default location under the root directory.
    pub fn users_dir(&self) -> String {
        match &self.parms.config.users_dir {
            Some(d) => get_absolute_path(d),
            None => self.userdir_dirs.users_dir.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config:
// ---------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub title: String,
    pub http_addr: String,
    pub http_port: u16,
    pub users_dir: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Config::default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "User Directory".to_string(),
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            users_dir: None,
        }
    }
}

// ***************************************************************************
//                            Directory Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_userdir_args:
// ---------------------------------------------------------------------------
/** Get the command line arguments. */
fn init_userdir_args() -> UserdirArgs {
    let args = UserdirArgs::parse();
    println!("{:?}", args);
    args
}

// ---------------------------------------------------------------------------
// init_userdir_dirs:
// ---------------------------------------------------------------------------
/** Calculate the external data directories. */
fn init_userdir_dirs() -> UserdirDirs {
    // Initialize the mistrust object.
    let mistrust = get_mistrust();

    // Check that each path is absolute and is a directory with the
    // proper permission assign if it exists.  If it doesn't exist,
    // create it.
    let root_dir = get_root_dir();
    check_userdir_dir(&root_dir, "root directory", &mistrust);

    let config_dir = root_dir.clone() + CONFIG_DIR;
    check_userdir_dir(&config_dir, "config directory", &mistrust);

    let logs_dir = root_dir.clone() + LOGS_DIR;
    check_userdir_dir(&logs_dir, "logs directory", &mistrust);

    let users_dir = root_dir.clone() + USERS_DIR;
    check_userdir_dir(&users_dir, "users directory", &mistrust);

    let static_dir = root_dir.clone() + STATIC_DIR;
    check_userdir_dir(&static_dir, "static directory", &mistrust);

    // Package up and return the directories.
    UserdirDirs {
        root_dir, config_dir, logs_dir, users_dir, static_dir,
    }
}

// ---------------------------------------------------------------------------
// check_userdir_dir:
// ---------------------------------------------------------------------------
/** Check that the path is absolute and, if it exists, that is has the proper
 * permissions assigned.  If it doesn't exist, create it.  The mistrust package
 * creates directories with 0o700 permissions.
 *
 * Any failure results in a panic.
 */
fn check_userdir_dir(dir: &str, msgname: &str, mistrust: &Mistrust) {
    // Get the path object.
    let path = Path::new(dir);
    if !path.is_absolute() {
        panic!("The userdir {} path must be absolute: {}", msgname, dir);
    }
    if path.exists() {
        // Make sure the path represents a directory.
        if !path.is_dir() {
            panic!("The userdir {} path must be a directory: {}", msgname, dir);
        }

        // Make sure the directory had rwx for owner only.
        let meta = path.metadata().unwrap_or_else(|_| panic!("Unable to read metadata for {}: {}", msgname, dir));
        let perm = meta.permissions().mode();
        if perm & 0o777 != 0o700 {
            panic!("The userdir {} path must be have 0o700 permissions: {}", msgname, dir);
        }
    } else {
        // Create the directory with the correct permissions.
        if let Err(e) = mistrust.make_directory(path) {
            panic!("Make directory error for {:?}: {}", path, &e.to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// get_mistrust:
// ---------------------------------------------------------------------------
/** Configure a new mistrust object for initial directory processing. */
fn get_mistrust() -> Mistrust {
    match Mistrust::builder()
        .ignore_prefix(get_absolute_path("~"))
        .trust_group(0)
        .build() {
            Ok(m) => m,
            Err(e) => {
                panic!("Mistrust configuration error: {}", &e.to_string());
            }
        }
}

// ---------------------------------------------------------------------------
// get_root_dir:
// ---------------------------------------------------------------------------
fn get_root_dir() -> String {
    // Order of precedence:
    //  1. Environment variable
    //  2. Command line --root-dir argument
    //  3. Default location
    //
    let root_dir = env::var(ENV_USERDIR_ROOT_DIR).unwrap_or_else(
        |_| {
            match USERDIR_ARGS.root_dir.clone() {
                Some(r) => r,
                None => DEFAULT_ROOT_DIR.to_string(),
            }
        });

    // Canonicalize the path.
    get_absolute_path(&root_dir)
}

// ***************************************************************************
//                               Log Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_log:
// ---------------------------------------------------------------------------
/** Initialize log4rs from the config directory's log4rs.yml.  Without that
 * file, log to the console at info level.
 */
pub fn init_log() {
    let logconfig = init_log_config();
    if !Path::new(&logconfig).exists() {
        init_console_log();
        info!("Log4rs file {} not found, logging to console.", logconfig);
        return;
    }

    if let Err(e) = log4rs::init_file(logconfig.clone(), Default::default()) {
        println!("{}", e);
        let s = format!("{}", Errors::Log4rsInitialization(logconfig));
        panic!("{}", s);
    }
    info!("Log4rs initialized using: {}", logconfig);
}

// ---------------------------------------------------------------------------
// init_console_log:
// ---------------------------------------------------------------------------
fn init_console_log() {
    let stdout = ConsoleAppender::builder().build();
    let config = log4rs::config::Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info));

    let result = match config {
        Ok(c) => log4rs::init_config(c).map(|_| ()).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    if let Err(e) = result {
        let s = format!("{}: {}", Errors::Log4rsInitialization("<console>".to_string()), e);
        panic!("{}", s);
    }
}

// ---------------------------------------------------------------------------
// init_log_config:
// ---------------------------------------------------------------------------
fn init_log_config() -> String {
    USERDIR_DIRS.config_dir.clone() + LOG4RS_CONFIG_FILE
}

// ***************************************************************************
//                             Parms Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// get_parms:
// ---------------------------------------------------------------------------
/** Retrieve the application parameters from the configuration file in the
 * config directory.  If the file cannot be read the default values are used.
 */
fn get_parms() -> Result<Parms> {
    // Get the config file path from its data directory.
    let config_file = USERDIR_DIRS.config_dir.clone() + USERDIR_CONFIG_FILE;

    // Read the cofiguration file.
    let config_file_abs = userdir_utils::get_absolute_path(&config_file);
    info!("{}", Errors::ReadingConfigFile(config_file_abs.clone()));
    let contents = match fs::read_to_string(&config_file_abs) {
        Ok(c) => c,
        Err(_) => {
            println!("Unable to read configuration at {}. Using default values.", config_file);
            return Ok(Parms { config_file: Default::default(), config: Config::new() });
        }
    };

    let config = parse_config(&contents, &config_file_abs)?;
    Ok(Parms { config_file: config_file_abs, config })
}

// ---------------------------------------------------------------------------
// parse_config:
// ---------------------------------------------------------------------------
fn parse_config(contents: &str, config_file_abs: &str) -> Result<Config> {
    match toml::from_str(contents) {
        Ok(c)  => Ok(c),
        Err(e) => {
            let msg = format!("{}\n   {}", Errors::TOMLParseError(config_file_abs.to_string()), e);
            error!("{}", msg);
            Result::Err(anyhow!(msg))
        }
    }
}

// ***************************************************************************
//                             Config Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_runtime_context:
// ---------------------------------------------------------------------------
pub fn init_runtime_context() -> RuntimeCtx {
    // If this fails the application aborts.
    let parms = get_parms().expect("FAILED to read configuration file.");
    RuntimeCtx {parms, userdir_args: &USERDIR_ARGS, userdir_dirs: &USERDIR_DIRS}
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_config() {
        println!("{:?}", Config::new());
    }

    #[test]
    fn partial_config_takes_defaults() {
        let config = parse_config("http_port = 8080\n", "/tmp/userdir.toml").unwrap();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.http_addr, DEFAULT_HTTP_ADDR);
        assert!(config.users_dir.is_none());
    }

    #[test]
    fn full_config() {
        let toml = r#"
            title = "Staff"
            http_addr = "http://0.0.0.0"
            http_port = 9000
            users_dir = "/srv/users"
        "#;
        let config = parse_config(toml, "/tmp/userdir.toml").unwrap();
        assert_eq!(config.title, "Staff");
        assert_eq!(config.users_dir.as_deref(), Some("/srv/users"));
    }

    #[test]
    fn bad_config_is_an_error() {
        let err = parse_config("http_port = \"not a port\"", "/tmp/userdir.toml").unwrap_err();
        assert!(err.to_string().contains("Unable to parse TOML file"));
    }

    #[test]
    fn args_parse() {
        let args = UserdirArgs::parse_from(["userdir_server", "--root-dir", "/tmp/ud", "-c"]);
        assert_eq!(args.root_dir.as_deref(), Some("/tmp/ud"));
        assert!(args.create_dirs_only);
    }
}
