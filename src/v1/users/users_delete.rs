#![forbid(unsafe_code)]

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
pub struct DeleteUserApi;

struct ReqDeleteUser
{
    username: String,
}

#[derive(Object, Debug)]
pub struct RespDeleteUser
{
    result_code: String,
    result_msg: String,
    num_deleted: u32,
}

// Implement the debug record trait for logging.
impl RequestDebug for ReqDeleteUser {
    type Req = ReqDeleteUser;
    fn get_request_info(&self) -> String {
        let mut s = String::with_capacity(255);
        s.push_str("  Request body:");
        s.push_str("\n    username: ");
        s.push_str(&self.username);
        s
    }
}

// ------------------- HTTP Status Codes -------------------
#[derive(Debug, ApiResponse)]
enum UserdirResponse {
    #[oai(status = 200)]
    Http200(Json<RespDeleteUser>),
    #[oai(status = 400)]
    Http400(Json<HttpResult>),
    #[oai(status = 404)]
    Http404(Json<HttpResult>),
    #[oai(status = 500)]
    Http500(Json<HttpResult>),
}

fn make_http_200(resp: RespDeleteUser) -> UserdirResponse {
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
impl DeleteUserApi {
    #[oai(path = "/users/:username", method = "delete")]
    async fn delete_user_api(&self, http_req: &Request, username: Path<String>,
                             store: Data<&Arc<UserRecordStore>>) -> UserdirResponse {
        // Package the request parameters.
        let req = ReqDeleteUser {username: username.0};

        // -------------------- Process Request ----------------------
        match RespDeleteUser::process(http_req, &req, &store).await {
            Ok(r) => r,
            Err(e) => {
                if !matches!(e, StoreError::NotFound(_)) {
                    error!("ERROR: {}", e);
                }
                make_http_error(e)
            }
        }
    }
}

// ***************************************************************************
//                          Request/Response Methods
// ***************************************************************************
impl RespDeleteUser {
    /// Create a new response.
    fn new(result_code: &str, result_msg: String, num_deleted: u32) -> Self {
        Self {result_code: result_code.to_string(), result_msg, num_deleted}
    }

    /// Process the request.
    async fn process(http_req: &Request, req: &ReqDeleteUser, store: &UserRecordStore)
    -> Result<UserdirResponse, StoreError> {
        // Conditional logging depending on log level.
        userdir_utils::debug_request(http_req, req);

        store.delete_user(&req.username).await?;

        // Log result and return response.
        let msg = format!("User {} deleted", req.username);
        info!("{}", msg);
        Ok(make_http_200(Self::new("0", msg, 1)))
    }
}
