#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use poem_openapi::Object;

use crate::utils::record_types::UserRecord;

pub mod users_delete;
pub mod users_get;
pub mod users_list;
pub mod users_update;

// ***************************************************************************
//                          Shared Response Elements
// ***************************************************************************
#[derive(Object, Debug)]
pub struct NameElement
{
    first: String,
    last: String,
    full: String,
}

#[derive(Object, Debug)]
pub struct UserElement
{
    username: String,
    name: NameElement,
    location: BTreeMap<String, String>,
}

impl From<UserRecord> for UserElement {
    fn from(rec: UserRecord) -> Self {
        Self {
            username: rec.username,
            name: NameElement {first: rec.name.first, last: rec.name.last, full: rec.name.full},
            location: rec.location,
        }
    }
}
