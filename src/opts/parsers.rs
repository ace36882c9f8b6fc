use std::str::FromStr;

use crate::fleet::models::UserId;
use crate::prelude::*;

pub fn user_id(value: &str) -> Result<UserId> {
    match UserId::from_str(value)? {
        user_id if user_id >= 1 => Ok(user_id),
        user_id => Err(anyhow!("{} is an invalid user ID", user_id)),
    }
}
