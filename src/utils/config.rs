#![forbid(unsafe_code)]

use anyhow::{Result, anyhow};
use log::{info, error, LevelFilter};
use serde::Deserialize;
use std::{env, fs, path::Path};
use toml;
use fs_mistrust::Mistrust;
use std::os::unix::fs::PermissionsExt;
use lazy_static::lazy_static;
use structopt::StructOpt;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config as LogConfig, Root};
use log4rs::encode::pattern::PatternEncoder;

// Numclass Utilities
use crate::utils::{numclass_utils, errors::Errors};

use super::numclass_utils::get_absolute_path;

// ***************************************************************************
//                                Constants
// ***************************************************************************
// Directory and file locations. Unless otherwise noted, all files and directories
// are relative to the root directory.
const ENV_NUMCLASS_ROOT_DIR : &str = "NUMCLASS_ROOT_DIR";
const DEFAULT_ROOT_DIR      : &str = "~/.numclass";
const CONFIG_DIR            : &str = "/config";
const LOGS_DIR              : &str = "/logs";
const LOG4RS_CONFIG_FILE    : &str = "/log4rs.yml";     // relative to config dir
const NUMCLASS_CONFIG_FILE  : &str = "/numclass.toml";  // relative to config dir

// Networking.
const DEFAULT_HTTP_ADDR     : &str = "http://localhost";
const DEFAULT_HTTP_PORT     : u16  = 8000;

// Fun fact lookup.
const DEFAULT_FUN_FACT_URL        : &str = "http://numbersapi.com/{number}/math";
const DEFAULT_FUN_FACT_TIMEOUT_MS : u64  = 3000;
const DEFAULT_FUN_FACT_CACHE_SIZE : usize = 1024;

// Classification.
const DEFAULT_CLASSIFY_WORKERS    : usize = 4;

// Used when no log4rs file is installed.
const DEFAULT_LOG_PATTERN   : &str = "{d(%Y-%m-%dT%H:%M:%S%.3fZ)(utc)} {h({l})} {t} - {m}{n}";

// ***************************************************************************
//                             Static Variables
// ***************************************************************************
// Assign the command line arguments BEFORE RUNTIME_CTX is initialized in main.
lazy_static! {
    pub static ref NUMCLASS_ARGS: NumclassArgs = init_numclass_args();
}

// Calculate the data directories BEFORE RUNTIME_CTX is initialized in main.
lazy_static! {
    pub static ref NUMCLASS_DIRS: NumclassDirs = init_numclass_dirs();
}

// ***************************************************************************
//                             Directory Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// NumclassDirs:
// ---------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct NumclassDirs {
    pub root_dir: String,
    pub config_dir: String,
    pub logs_dir: String,
}

// ***************************************************************************
//                               Config Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// NumclassArgs:
// ---------------------------------------------------------------------------
#[derive(Debug, StructOpt)]
#[structopt(name = "numclass_args", about = "Command line arguments for the number classification server.")]
pub struct NumclassArgs {
    /// Specify the server's root data directory.
    ///
    /// This directory contains the config and logs subdirectories.
    #[structopt(short, long)]
    pub root_dir: Option<String>,

    /// Create the data directories and then exit.
    ///
    /// The data directories will be rooted at a root directory calculated
    /// using the following priority order:
    ///
    ///   1. If set, the value of the NUMCLASS_ROOT_DIR environment,
    ///
    ///   2. Otherwise, if set, the value of the --root_dir command line argument,
    ///
    ///   3. Otherwise, ~/.numclass
    ///
    #[structopt(short, long)]
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
    pub numclass_args: &'static NumclassArgs,
    pub numclass_dirs: &'static NumclassDirs,
}

// ---------------------------------------------------------------------------
// Config:
// ---------------------------------------------------------------------------
/// Contents of numclass.toml.  Keys left out of the file keep their defaults.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub title: String,
    pub http_addr: String,
    pub http_port: u16,
    pub fun_fact_url: String,
    pub fun_fact_timeout_ms: u64,
    pub fun_fact_cache_size: usize,
    pub classify_workers: usize,
}

impl Config {
    pub fn new() -> Self {
        Config::default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "Number Classification Server".to_string(),
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            fun_fact_url: DEFAULT_FUN_FACT_URL.to_string(),
            fun_fact_timeout_ms: DEFAULT_FUN_FACT_TIMEOUT_MS,
            fun_fact_cache_size: DEFAULT_FUN_FACT_CACHE_SIZE,
            classify_workers: DEFAULT_CLASSIFY_WORKERS,
        }
    }
}

// ***************************************************************************
//                            Directory Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_numclass_args:
// ---------------------------------------------------------------------------
/** Get the command line arguments. */
fn init_numclass_args() -> NumclassArgs {
    let args = NumclassArgs::from_args();
    println!("{:?}", args);
    args
}

// ---------------------------------------------------------------------------
// init_numclass_dirs:
// ---------------------------------------------------------------------------
/** Calculate the external data directories. */
fn init_numclass_dirs() -> NumclassDirs {
    // Initialize the mistrust object.
    let mistrust = get_mistrust();

    // Check that each path is absolute and is a directory with the
    // proper permission assign if it exists.  If it doesn't exist,
    // create it.
    let root_dir = get_root_dir();
    check_numclass_dir(&root_dir, "root directory", &mistrust);

    let config_dir = root_dir.clone() + CONFIG_DIR;
    check_numclass_dir(&config_dir, "config directory", &mistrust);

    let logs_dir = root_dir.clone() + LOGS_DIR;
    check_numclass_dir(&logs_dir, "logs directory", &mistrust);

    // Package up and return the directories.
    NumclassDirs {root_dir, config_dir, logs_dir}
}

// ---------------------------------------------------------------------------
// check_numclass_dir:
// ---------------------------------------------------------------------------
/** Check that the path is absolute and, if it exists, that is has the proper
 * permissions assigned.  If it doesn't exist, create it.  The mistrust package
 * creates directories with 0o700 permissions.
 *
 * Any failure results in a panic.
 */
fn check_numclass_dir(dir: &String, msgname: &str, mistrust: &Mistrust) {
    // Get the path object.
    let path = Path::new(dir);
    if !path.is_absolute() {
        panic!("The {} path must be absolute: {}", msgname, dir);
    }
    if path.exists() {
        // Make sure the path represents a directory.
        if !path.is_dir() {
            panic!("The {} path must be a directory: {}", msgname, dir);
        }

        // Make sure the directory had rwx for owner only.
        let meta = path.metadata().unwrap_or_else(|_| panic!("Unable to read metadata for {}: {}", msgname, dir));
        let perm = meta.permissions().mode();
        if perm & 0o777 != 0o700 {
            panic!("The {} path must be have 0o700 permissions: {}", msgname, dir);
        }
    } else if let Err(e) = mistrust.make_directory(path) {
        panic!("Make directory error for {:?}: {}", path, &e.to_string());
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
    let root_dir = env::var(ENV_NUMCLASS_ROOT_DIR).unwrap_or_else(
        |_| {
            match NUMCLASS_ARGS.root_dir.clone() {
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
/** Initialize log4rs from the config directory's log4rs.yml.  When that file
 * is absent we log to the console at info level.
 */
pub fn init_log() {
    let logconfig = init_log_config();
    if !Path::new(&logconfig).exists() {
        init_console_log();
        info!("No log configuration at {}, logging to console.", logconfig);
        return;
    }

    match log4rs::init_file(logconfig.clone(), Default::default()) {
        Ok(_) => (),
        Err(e) => {
            println!("{}", e);
            let s = format!("{}", Errors::Log4rsInitialization(logconfig));
            panic!("{}", s);
        },
    }
    info!("Log4rs initialized using: {}", logconfig);
}

// ---------------------------------------------------------------------------
// init_log_config:
// ---------------------------------------------------------------------------
fn init_log_config() -> String {
    NUMCLASS_DIRS.config_dir.clone() + LOG4RS_CONFIG_FILE
}

// ---------------------------------------------------------------------------
// init_console_log:
// ---------------------------------------------------------------------------
fn init_console_log() {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(DEFAULT_LOG_PATTERN)))
        .build();
    let config = LogConfig::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info));

    let result = match config {
        Ok(c) => log4rs::init_config(c).map(|_| ()).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    if let Err(e) = result {
        println!("{}", e);
        panic!("{}", Errors::Log4rsInitialization("<console>".to_string()));
    }
}

/// ***************************************************************************
//                             Parms Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// get_parms:
// ---------------------------------------------------------------------------
/** Retrieve the application parameters from the configuration file in the
 * config directory.  If the file can't be read, default values are used.
 */
fn get_parms() -> Result<Parms> {
    // Get the config file path from its data directory.
    let config_file = NUMCLASS_DIRS.config_dir.clone() + NUMCLASS_CONFIG_FILE;

    // Read the cofiguration file.
    let config_file_abs = numclass_utils::get_absolute_path(&config_file);
    info!("{}", Errors::ReadingConfigFile(config_file_abs.clone()));
    let contents = match fs::read_to_string(&config_file_abs) {
        Ok(c) => c,
        Err(_) => {
            println!("Unable to read configuration at {}. Using default values.", config_file);
            return Ok(Parms { config_file: Default::default(), config: Config::new() });
        }
    };

    // Parse the toml configuration.
    let config = parse_config(&contents, &config_file_abs)?;
    Ok(Parms { config_file: config_file_abs, config })
}

// ---------------------------------------------------------------------------
// parse_config:
// ---------------------------------------------------------------------------
fn parse_config(contents: &str, config_file: &str) -> Result<Config> {
    match toml::from_str(contents) {
        Ok(c)  => Ok(c),
        Err(e) => {
            let msg = format!("{}\n   {}", Errors::TOMLParseError(config_file.to_string()), e);
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
    RuntimeCtx {parms, numclass_args: &NUMCLASS_ARGS, numclass_dirs: &NUMCLASS_DIRS}
}
