use clap::Args;

use drivemaster::drive::auth::AuthError;
use drivemaster::{DriveApi, DriveError};

/// Show which account the credentials belong to
#[derive(Args, Debug, Clone)]
pub struct Whoami;

#[derive(Debug, thiserror::Error)]
pub enum WhoamiError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Drive error: {0}")]
    Drive(#[from] DriveError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Whoami {
    type Error = WhoamiError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session().await?;
        let email = session.drive.whoami().await?;
        Ok(format!("Authenticated as {}", email))
    }
}
