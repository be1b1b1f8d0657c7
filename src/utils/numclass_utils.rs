#![forbid(unsafe_code)]

use path_absolutize::Absolutize;
use std::ops::Deref;
use std::path::Path;

use poem::Request;

use log::{debug, LevelFilter};

// ***************************************************************************
// GENERAL PUBLIC FUNCTIONS
// ***************************************************************************
// ---------------------------------------------------------------------------
// get_absolute_path:
// ---------------------------------------------------------------------------
/** Replace tilde (~) and environment variable values in a path name and
 * then construct the absolute path name.  Unlike canonicalize, absolutize
 * does not care whether the file exists or what it really is.
 *
 * On any expansion or conversion failure the original path is returned.
 */
pub fn get_absolute_path(path: &str) -> String {
    // Replace ~ and environment variable values if possible.
    let s = match shellexpand::full(path) {
        Ok(x) => x,
        Err(_) => return path.to_owned(),
    };

    // Convert to absolute path if necessary.
    let p = Path::new(s.deref());
    let p1 = match p.absolutize() {
        Ok(x) => x,
        Err(_) => return path.to_owned(),
    };
    let p2 = match p1.to_str() {
        Some(x) => x,
        None => return path.to_owned(),
    };

    p2.to_owned()
}

// ***************************************************************************
//                                  Traits
// ***************************************************************************
/// Request types that can describe themselves in a debug log record.
pub trait RequestDebug {
    fn get_request_info(&self) -> String;
}

// ---------------------------------------------------------------------------
// debug_request:
// ---------------------------------------------------------------------------
// Dump http request information to the log.
pub fn debug_request(http_req: &Request, req: &impl RequestDebug) {
    // Check that debug or higher logging is in effect.
    if log::max_level() < LevelFilter::Debug {
        return;
    }
    debug!("{}", format_request(http_req, req));
}

// ***************************************************************************
// PRIVATE FUNCTIONS
// ***************************************************************************
// ---------------------------------------------------------------------------
// format_request:
// ---------------------------------------------------------------------------
fn format_request(http_req: &Request, req: &impl RequestDebug) -> String {
    // Accumulate the output.
    let mut s = "\n".to_string();

    // Restate the URI.
    let uri = http_req.uri();
    s += format!("  URI: {:?}\n", uri).as_str();

    // Accumulate the headers
    for v in http_req.headers().iter() {
         s += format!("  Header: {} = {:?} \n", v.0, v.1).as_str();
    };

    // List query parameters.
    if let Some(q) = uri.query() {
        s += format!("  Query Parameters: {:?}\n", q).as_str();
    } else {
        s += "  * No Query Parameters\n";
    }

    // Add the request's information.
    s += req.get_request_info().as_str();
    s
}
