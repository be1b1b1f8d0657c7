#![forbid(unsafe_code)]

use std::fmt;

use poem_openapi::{ OpenApi, payload::Json, Object };

// From cargo.toml.
const NUMCLASS_VERSION: Option<&str> = option_env!("CARGO_PKG_VERSION");

// ***************************************************************************
//                               Build Info
// ***************************************************************************
/// Identity of the running binary, captured at compile time by build.rs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_branch: &'static str,
    pub git_commit: &'static str,
    pub git_dirty: &'static str,
    pub source_ts: &'static str,
    pub rustc_version: &'static str,
}

pub const BUILD_INFO: BuildInfo = BuildInfo {
    version: match NUMCLASS_VERSION {
        Some(v) => v,
        None => "unknown",
    },
    git_branch: env!("GIT_BRANCH"),
    git_commit: env!("GIT_COMMIT_SHORT"),
    git_dirty: env!("GIT_DIRTY"),
    source_ts: env!("SOURCE_TIMESTAMP"),
    rustc_version: env!("RUSTC_VERSION"),
};

// Startup log line.
impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NUMCLASS={}, BRANCH={}, COMMIT={}, DIRTY={}, SRC_TS={}, RUSTC={}",
               self.version, self.git_branch, self.git_commit, self.git_dirty,
               self.source_ts, self.rustc_version)
    }
}

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
pub struct VersionApi;

#[derive(Object, Debug, PartialEq)]
struct RespVersion
{
    result_code: String,
    result_msg: String,
    version: String,
    git_branch: String,
    git_commit: String,
    git_dirty: String,
    source_ts: String,
    rustc_version: String,
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl VersionApi {
    #[oai(path = "/version", method = "get")]
    async fn get_version(&self) -> Json<RespVersion> {
        Json(RespVersion::from(&BUILD_INFO))
    }
}

impl From<&BuildInfo> for RespVersion {
    fn from(info: &BuildInfo) -> Self {
        Self {
            result_code: "0".to_string(),
            result_msg: "success".to_string(),
            version: info.version.to_string(),
            git_branch: info.git_branch.to_string(),
            git_commit: info.git_commit.to_string(),
            git_dirty: info.git_dirty.to_string(),
            source_ts: info.source_ts.to_string(),
            rustc_version: info.rustc_version.to_string(),
        }
    }
}
