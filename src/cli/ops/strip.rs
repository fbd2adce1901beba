use std::path::{Path, PathBuf};

use clap::Args;

use drivemaster::drive::auth::AuthError;
use drivemaster::workflow::WorkflowError;

use crate::cli::op::ABORTED;

/// Remove every permission the given addresses hold under a folder
/// (dry run unless --live)
#[derive(Args, Debug, Clone)]
pub struct Strip {
    /// ID of the root folder
    #[arg(long)]
    pub root: String,

    /// Address to strip; repeat for several
    #[arg(long = "email")]
    pub emails: Vec<String>,

    /// File with one address per line; `#` starts a comment
    #[arg(long)]
    pub emails_file: Option<PathBuf>,

    /// Actually modify Google Drive
    #[arg(long)]
    pub live: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum StripError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("strip failed: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no addresses given; use --email or --emails-file")]
    NoEmails,
}

fn read_emails_file(path: &Path) -> std::io::Result<Vec<String>> {
    Ok(parse_emails(&std::fs::read_to_string(path)?))
}

fn parse_emails(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

impl Strip {
    fn targets(&self) -> Result<Vec<String>, StripError> {
        let mut emails: Vec<String> = self
            .emails
            .iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
        if let Some(path) = &self.emails_file {
            emails.extend(read_emails_file(path)?);
        }
        if emails.is_empty() {
            return Err(StripError::NoEmails);
        }
        Ok(emails)
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Strip {
    type Error = StripError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let emails = self.targets()?;
        let what = format!("Stripping {} addresses", emails.len());
        if !ctx.confirm_live(self.live, &what)? {
            return Ok(ABORTED.to_string());
        }
        let session = ctx.session().await?;
        let outcome = ctx
            .workflow(session)
            .run_strip(&self.root, &emails, self.live)
            .await?;
        Ok(outcome.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_file_skips_comments_and_blanks() {
        let text = "# former monitors\na@x.com\n\n  b@x.com  # left in May\n#c@x.com\n";
        assert_eq!(parse_emails(text), vec!["a@x.com", "b@x.com"]);
    }

    #[test]
    fn needs_at_least_one_address() {
        let strip = Strip {
            root: "root".into(),
            emails: vec!["  ".into()],
            emails_file: None,
            live: false,
        };
        assert!(matches!(strip.targets(), Err(StripError::NoEmails)));
    }
}
