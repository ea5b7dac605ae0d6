#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use poem::Request;
use poem::web::Data;
use poem_openapi::{ OpenApi, payload::Json, Object, param::Path, ApiResponse };
use log::{error, info};

use crate::utils::errors::{HttpResult, StoreError};
use crate::utils::user_store::UserRecordStore;
use crate::utils::userdir_utils::{self, RequestDebug};

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
pub struct UpdateUserApi;

// The new location replaces the old one wholesale.  Values are stored as sent.
struct ReqUpdateUser
{
    username: String,
    location: BTreeMap<String, String>,
}

#[derive(Object, Debug)]
pub struct RespUpdateUser
{
    result_code: String,
    result_msg: String,
    username: String,
}

// Implement the debug record trait for logging.
impl RequestDebug for ReqUpdateUser {
    type Req = ReqUpdateUser;
    fn get_request_info(&self) -> String {
        let mut s = String::with_capacity(255);
        s.push_str("  Request body:");
        s.push_str("\n    username: ");
        s.push_str(&self.username);
        for (k, v) in &self.location {
            s.push_str("\n    location.");
            s.push_str(k);
            s.push_str(": ");
            s.push_str(v);
        }
        s
    }
}

// ------------------- HTTP Status Codes -------------------
#[derive(Debug, ApiResponse)]
enum UserdirResponse {
    #[oai(status = 200)]
    Http200(Json<RespUpdateUser>),
    #[oai(status = 400)]
    Http400(Json<HttpResult>),
    #[oai(status = 404)]
    Http404(Json<HttpResult>),
    #[oai(status = 500)]
    Http500(Json<HttpResult>),
}

fn make_http_200(resp: RespUpdateUser) -> UserdirResponse {
    UserdirResponse::Http200(Json(resp))
}
fn make_http_error(e: StoreError) -> UserdirResponse {
    let code = e.http_status();
    let result = Json(HttpResult::new(code.to_string(), e.to_string()));
    match code {
        400 => UserdirResponse::Http400(result),
        404 => UserdirResponse::Http404(result),
        _ => UserdirResponse::Http500(result),
    }
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl UpdateUserApi {
    #[oai(path = "/users/:username", method = "put")]
    async fn update_user_api(&self, http_req: &Request, username: Path<String>,
                             location: Json<BTreeMap<String, String>>,
                             store: Data<&Arc<UserRecordStore>>) -> UserdirResponse {
        // Package the request parameters.
        let req = ReqUpdateUser {username: username.0, location: location.0};

        // -------------------- Process Request ----------------------
        match RespUpdateUser::process(http_req, req, &store).await {
            Ok(r) => r,
            Err(e) => {
                error!("ERROR: {}", e);
                make_http_error(e)
            }
        }
    }
}

// ***************************************************************************
//                          Request/Response Methods
// ***************************************************************************
impl RespUpdateUser {
    /// Create a new response.
    fn new(result_code: &str, result_msg: String, username: String) -> Self {
        Self {result_code: result_code.to_string(), result_msg, username}
    }

    /// Process the request.
    async fn process(http_req: &Request, req: ReqUpdateUser, store: &UserRecordStore)
    -> Result<UserdirResponse, StoreError> {
        // Conditional logging depending on log level.
        userdir_utils::debug_request(http_req, &req);

        let num_fields = req.location.len();
        store.update_location(&req.username, req.location).await?;

        // Log result and return response.
        let msg = format!("Location of user {} updated with {} field(s)", req.username, num_fields);
        info!("{}", msg);
        Ok(make_http_200(Self::new("0", msg, req.username)))
    }
}
