#![forbid(unsafe_code)]

use std::sync::Arc;

use poem::Request;
use poem::web::Data;
use poem_openapi::{ OpenApi, payload::Json, Object, ApiResponse };
use log::error;

use crate::utils::errors::{HttpResult, StoreError};
use crate::utils::user_store::UserRecordStore;
use crate::utils::userdir_utils::{self, RequestDebug};
use crate::v1::users::UserElement;

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
pub struct ListUsersApi;

struct ReqListUsers;

#[derive(Object, Debug)]
pub struct RespListUsers
{
    result_code: String,
    result_msg: String,
    num_users: i32,
    users: Vec<UserElement>,
}

// Implement the debug record trait for logging.
impl RequestDebug for ReqListUsers {
    type Req = ReqListUsers;
    fn get_request_info(&self) -> String {
        "  Request body: none".to_string()
    }
}

// ------------------- HTTP Status Codes -------------------
#[derive(Debug, ApiResponse)]
enum UserdirResponse {
    #[oai(status = 200)]
    Http200(Json<RespListUsers>),
    #[oai(status = 500)]
    Http500(Json<HttpResult>),
}

fn make_http_200(resp: RespListUsers) -> UserdirResponse {
    UserdirResponse::Http200(Json(resp))
}
fn make_http_500(msg: String) -> UserdirResponse {
    UserdirResponse::Http500(Json(HttpResult::new(500.to_string(), msg)))
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl ListUsersApi {
    #[oai(path = "/users", method = "get")]
    async fn list_users_api(&self, http_req: &Request, store: Data<&Arc<UserRecordStore>>) -> UserdirResponse {
        // -------------------- Process Request ----------------------
        // A single unreadable record fails the whole listing.
        match RespListUsers::process(http_req, &ReqListUsers, &store).await {
            Ok(r) => make_http_200(r),
            Err(e) => {
                let msg = "ERROR: ".to_owned() + e.to_string().as_str();
                error!("{}", msg);
                make_http_500(msg)
            }
        }
    }
}

// ***************************************************************************
//                          Request/Response Methods
// ***************************************************************************
impl RespListUsers {
    /// Create a new response.
    fn new(result_code: &str, result_msg: String, num_users: i32, users: Vec<UserElement>) -> Self {
        Self {result_code: result_code.to_string(), result_msg, num_users, users}
    }

    /// Process the request.
    async fn process(http_req: &Request, req: &ReqListUsers, store: &UserRecordStore)
    -> Result<RespListUsers, StoreError> {
        // Conditional logging depending on log level.
        userdir_utils::debug_request(http_req, req);

        let users: Vec<UserElement> = store.list_all().await?
            .into_iter()
            .map(UserElement::from)
            .collect();
        Ok(Self::new("0", "success".to_string(), users.len() as i32, users))
    }
}
