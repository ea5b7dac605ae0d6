#![forbid(unsafe_code)]

use std::sync::Arc;

use poem::Request;
use poem::web::Data;
use poem_openapi::{ OpenApi, payload::Json, Object, param::Path, ApiResponse };
use log::error;

use crate::utils::errors::{HttpResult, StoreError};
use crate::utils::user_store::UserRecordStore;
use crate::utils::userdir_utils::{self, RequestDebug};
use crate::v1::users::UserElement;

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
pub struct GetUserApi;

struct ReqGetUser
{
    username: String,
}

#[derive(Object, Debug)]
pub struct RespGetUser
{
    result_code: String,
    result_msg: String,
    user: UserElement,
}

// Implement the debug record trait for logging.
impl RequestDebug for ReqGetUser {
    type Req = ReqGetUser;
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
    Http200(Json<RespGetUser>),
    #[oai(status = 400)]
    Http400(Json<HttpResult>),
    #[oai(status = 404)]
    Http404(Json<HttpResult>),
    #[oai(status = 500)]
    Http500(Json<HttpResult>),
}

fn make_http_200(resp: RespGetUser) -> UserdirResponse {
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
impl GetUserApi {
    #[oai(path = "/users/:username", method = "get")]
    async fn get_user_api(&self, http_req: &Request, username: Path<String>,
                          store: Data<&Arc<UserRecordStore>>) -> UserdirResponse {
        // Package the request parameters.
        let req = ReqGetUser {username: username.0};

        // -------------------- Process Request ----------------------
        match RespGetUser::process(http_req, &req, &store).await {
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
impl RespGetUser {
    /// Create a new response.
    fn new(result_code: &str, result_msg: String, user: UserElement) -> Self {
        Self {result_code: result_code.to_string(), result_msg, user}
    }

    /// Process the request.
    async fn process(http_req: &Request, req: &ReqGetUser, store: &UserRecordStore)
    -> Result<UserdirResponse, StoreError> {
        // Conditional logging depending on log level.
        userdir_utils::debug_request(http_req, req);

        let rec = store.read_one(&req.username).await?;
        Ok(make_http_200(Self::new("0", "success".to_string(), UserElement::from(rec))))
    }
}
