//! Blocking and unblocking another user.

use serde::Serialize;

use crate::context::SessionContext;
use crate::endpoint::{Endpoint, Route};
use crate::error::Result;
use crate::resolver::Reply;

#[derive(Debug, Serialize)]
pub struct FriendParams {
    pub fid: String,
    pub imei: String,
}

fn friend_params(user_id: &str, session: &SessionContext) -> FriendParams {
    FriendParams {
        fid: user_id.to_string(),
        imei: session.imei().to_string(),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BlockUser;

impl Endpoint for BlockUser {
    type Input = String;
    type Params = FriendParams;
    type Output = ();

    fn route(&self, _user_id: &String) -> Route {
        Route::new("friend", "/api/friend/block")
    }

    fn params(&self, user_id: &String, session: &SessionContext) -> Result<FriendParams> {
        Ok(friend_params(user_id, session))
    }

    // The server answers with an empty string on success.
    fn output(&self, _reply: Reply) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnblockUser;

impl Endpoint for UnblockUser {
    type Input = String;
    type Params = FriendParams;
    type Output = ();

    fn route(&self, _user_id: &String) -> Route {
        Route::new("friend", "/api/friend/unblock")
    }

    fn params(&self, user_id: &String, session: &SessionContext) -> Result<FriendParams> {
        Ok(friend_params(user_id, session))
    }

    fn output(&self, _reply: Reply) -> Result<()> {
        Ok(())
    }
}
