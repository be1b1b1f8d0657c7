#![forbid(unsafe_code)]

use std::sync::Arc;

use poem::Request;
use tokio::sync::Semaphore;
use poem_openapi::{ OpenApi, payload::Json, Object, param::Query, ApiResponse };
use anyhow::Result;
use log::{error, info};

use crate::utils::classifier::{self, Classification, ValidationError};
use crate::utils::errors::HttpResult;
use crate::utils::fun_facts::{self, FactProvider};
use crate::utils::numclass_utils::{self, RequestDebug};

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
pub struct ClassifyNumberApi {
    facts: Arc<dyn FactProvider>,
    workers: Arc<Semaphore>,
}

struct ReqClassifyNumber
{
    number: String,
}

/// Fields holding a zero, false or empty value are left out of the JSON;
/// only error is always present.
#[derive(Object, Debug, Default, PartialEq)]
pub struct RespClassifyNumber
{
    #[oai(skip_serializing_if_is_none)]
    number: Option<i64>,
    #[oai(skip_serializing_if_is_none)]
    is_prime: Option<bool>,
    #[oai(skip_serializing_if_is_none)]
    is_perfect: Option<bool>,
    #[oai(skip_serializing_if_is_none)]
    properties: Option<Vec<String>>,
    #[oai(skip_serializing_if_is_none)]
    digit_sum: Option<i64>,
    #[oai(skip_serializing_if_is_none)]
    fun_fact: Option<String>,
    error: bool,
}

// Implement the debug record trait for logging.
impl RequestDebug for ReqClassifyNumber {
    fn get_request_info(&self) -> String {
        let mut s = String::with_capacity(64);
        s.push_str("  Request query:");
        s.push_str("\n    number: ");
        s.push_str(&self.number);
        s.push('\n');
        s
    }
}

// ------------------- HTTP Status Codes -------------------
#[derive(Debug, ApiResponse)]
enum NumclassResponse {
    #[oai(status = 200)]
    Http200(Json<RespClassifyNumber>),
    #[oai(status = 400)]
    Http400(Json<RespClassifyNumber>),
    #[oai(status = 500)]
    Http500(Json<HttpResult>),
}

fn make_http_200(resp: RespClassifyNumber) -> NumclassResponse {
    NumclassResponse::Http200(Json(resp))
}
fn make_http_400(e: ValidationError) -> NumclassResponse {
    NumclassResponse::Http400(Json(RespClassifyNumber::invalid(e)))
}
fn make_http_500(msg: String) -> NumclassResponse {
    NumclassResponse::Http500(Json(HttpResult::new(500.to_string(), msg)))
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl ClassifyNumberApi {
    #[oai(path = "/classify-number", method = "get")]
    async fn classify_number_api(&self, http_req: &Request, number: Query<Option<String>>) -> NumclassResponse {
        // A missing parameter is treated like an empty one.
        let req = ReqClassifyNumber {number: number.0.unwrap_or_default()};

        // Conditional logging depending on log level.
        numclass_utils::debug_request(http_req, &req);

        // -------------------- Validate Input -----------------------
        let n = match classifier::validate(&req.number) {
            Ok(n) => n,
            Err(e) => {
                info!("Rejecting number {:?}: {}", req.number, e);
                return make_http_400(e);
            }
        };

        // -------------------- Process Request ----------------------
        match RespClassifyNumber::process(n, self.facts.as_ref(), &self.workers).await {
            Ok(r) => r,
            Err(e) => {
                let msg = "ERROR: ".to_owned() + e.to_string().as_str();
                error!("{}", msg);
                make_http_500(msg)
            }
        }
    }
}

impl ClassifyNumberApi {
    /// At most `workers` classifications run at once; at least one is allowed.
    pub fn new(facts: Arc<dyn FactProvider>, workers: usize) -> Self {
        Self {facts, workers: Arc::new(Semaphore::new(workers.max(1)))}
    }
}

// ***************************************************************************
//                          Request/Response Methods
// ***************************************************************************
impl RespClassifyNumber {
    /// Success body.  Zero values become None so they are not serialized.
    fn new(c: Classification, fact: String) -> Self {
        Self {
            number: (c.number != 0).then_some(c.number),
            is_prime: c.is_prime.then_some(true),
            is_perfect: c.is_perfect.then_some(true),
            properties: (!c.properties.is_empty()).then_some(c.properties),
            digit_sum: (c.digit_sum != 0).then_some(c.digit_sum),
            fun_fact: (!fact.is_empty()).then_some(fact),
            error: false,
        }
    }

    /// Error body carrying only the diagnostic token.
    fn invalid(e: ValidationError) -> Self {
        Self {fun_fact: Some(e.token().to_string()), error: true, ..Default::default()}
    }

    /** Classify on a blocking thread while the fun fact is fetched.  Large
     * primes cost billions of trial divisions, so a worker permit is taken
     * first and held by the blocking task until it finishes, even if the
     * client has gone away.
     */
    async fn process(n: i64, facts: &dyn FactProvider, workers: &Arc<Semaphore>) -> Result<NumclassResponse> {
        let permit = workers.clone().acquire_owned().await?;
        let worker = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            classifier::classify(n)
        });
        let (classification, fact) = tokio::join!(worker, fun_facts::fun_fact(facts, n));
        Ok(make_http_200(Self::new(classification?, fact)))
    }
}
