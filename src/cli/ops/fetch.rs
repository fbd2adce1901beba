use clap::Args;

use drivemaster::drive::auth::AuthError;
use drivemaster::workflow::WorkflowError;

/// Snapshot permissions under a folder into an archive and an editor sheet
#[derive(Args, Debug, Clone)]
pub struct Fetch {
    /// ID of the root folder to scan
    #[arg(long)]
    pub root: String,

    /// Only keep items this address has access to
    #[arg(long)]
    pub email: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("fetch failed: {0}")]
    Workflow(#[from] WorkflowError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Fetch {
    type Error = FetchError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session().await?;
        let outcome = ctx
            .workflow(session)
            .run_fetch(&self.root, self.email.as_deref())
            .await?;
        Ok(outcome.to_string())
    }
}
