#![forbid(unsafe_code)]

use lazy_static::lazy_static;
use log::{error, info};
use poem::listener::TcpListener;

// Numclass Utilities
use crate::api::build_routes;
use crate::api::version::BUILD_INFO;
use crate::utils::config::{init_log, init_runtime_context, RuntimeCtx, NUMCLASS_ARGS, NUMCLASS_DIRS};
use crate::utils::errors::Errors;
use crate::utils::fun_facts::init_fact_provider;

// Modules
mod api;
mod utils;

// ***************************************************************************
//                                Constants
// ***************************************************************************
const SERVER_NAME : &str = "NumclassServer"; // for poem logging

// ***************************************************************************
//                             Static Variables
// ***************************************************************************
// Lazily initialize the parameters variable so that is has a 'static lifetime.
// We exit if we can't read our parameters.
lazy_static! {
    static ref RUNTIME_CTX: RuntimeCtx = init_runtime_context();
}

// ---------------------------------------------------------------------------
// main:
// ---------------------------------------------------------------------------
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    // --------------- Initialize Server --------------
    // Announce ourselves.
    println!("Starting numclass_server!");

    // Directory creation is all that's needed in this mode.
    if NUMCLASS_ARGS.create_dirs_only {
        println!("Data directories created under {}.", NUMCLASS_DIRS.root_dir);
        return Ok(());
    }

    // Initialize the server.
    numclass_init();

    // --------------- Main Loop Set Up ---------------
    // Assign base URL.
    let config = &RUNTIME_CTX.parms.config;
    let numclass_url = format!("{}:{}{}", config.http_addr, config.http_port, "/api");

    // The outbound fun fact client is the only collaborator the routes need.
    let facts = match init_fact_provider(config) {
        Ok(f) => f,
        Err(e) => {
            error!("{}", e);
            return Err(std::io::Error::other(e.to_string()));
        }
    };
    let app = build_routes(facts, config.classify_workers, &numclass_url, &config.title);

    // ------------------ Main Loop -------------------
    let addr = format!("{}{}", "0.0.0.0:", config.http_port);
    info!("Listening on {} as {}.", addr, numclass_url);
    poem::Server::new(TcpListener::bind(addr))
        .name(SERVER_NAME)
        .run(app)
        .await
}

// ***************************************************************************
//                             Private Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// numclass_init:
// ---------------------------------------------------------------------------
/** Initialize logging and force the runtime context to be read. */
fn numclass_init() {
    // Configure out log.
    init_log();

    // Force the reading of input parameters and initialization of runtime context.
    info!("{}", Errors::InputParms(format!("{:#?}", *RUNTIME_CTX)));

    // Log build info.
    print_version_info();
}

// ---------------------------------------------------------------------------
// print_version_info:
// ---------------------------------------------------------------------------
fn print_version_info() {
    info!("\n*** Running {}.", BUILD_INFO);
}
