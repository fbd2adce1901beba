use std::error::Error;
use std::io::{self, BufRead, Write};

use tokio::sync::OnceCell;

use drivemaster::contacts::SheetsRanges;
use drivemaster::drive::auth::{connect, AuthError};
use drivemaster::drive::hub::HubDrive;
use drivemaster::drive::Retrying;
use drivemaster::workflow::Workflow;
use drivemaster::AppConfig;

/// Authenticated handles, created on first use.
pub struct Session {
    pub drive: Retrying<HubDrive>,
    pub sheets: SheetsRanges,
}

pub struct OpContext {
    pub config: AppConfig,
    /// Skip the confirmation before live runs.
    pub assume_yes: bool,
    session: OnceCell<Session>,
}

impl OpContext {
    pub fn new(config: AppConfig, assume_yes: bool) -> Self {
        Self {
            config,
            assume_yes,
            session: OnceCell::new(),
        }
    }

    /// Authenticate on the first call; later calls share the session.
    pub async fn session(&self) -> Result<&Session, AuthError> {
        self.session
            .get_or_try_init(|| async {
                let hubs = connect(&self.config.credentials).await?;
                tracing::info!("authenticated with Google Drive");
                Ok(Session {
                    drive: Retrying::new(HubDrive::new(hubs.drive), self.config.retry.policy()),
                    sheets: SheetsRanges::new(hubs.sheets),
                })
            })
            .await
    }

    pub fn workflow<'a>(&'a self, session: &'a Session) -> Workflow<'a> {
        Workflow::new(&session.drive, &self.config.paths, self.config.batch_size)
    }

    /// Dry runs need no confirmation. A live run goes ahead only when the
    /// user types `yes`, unless `--yes` was given.
    pub fn confirm_live(&self, live: bool, what: &str) -> io::Result<bool> {
        if !live || self.assume_yes {
            return Ok(true);
        }
        let mut stderr = io::stderr();
        writeln!(stderr, "WARNING: LIVE MODE. {} will modify Google Drive.", what)?;
        write!(stderr, "Type 'yes' to continue: ")?;
        stderr.flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(answer.trim().eq_ignore_ascii_case("yes"))
    }
}

pub const ABORTED: &str = "Aborted; nothing was changed.";

#[async_trait::async_trait]
pub trait Op: Send + Sync {
    type Error: Error + Send + Sync + 'static;
    type Output;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

#[macro_export]
macro_rules! command_enum {
    ($(($variant:ident, $type:ty)),* $(,)?) => {
        #[derive(Subcommand, Debug, Clone)]
        pub enum Command {
            $($variant($type),)*
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($variant(<$type as $crate::cli::op::Op>::Output),)*
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(
                #[error(transparent)]
                $variant(<$type as $crate::cli::op::Op>::Error),
            )*
        }

        #[async_trait::async_trait]
        impl $crate::cli::op::Op for Command {
            type Output = OpOutput;
            type Error = OpError;

            async fn execute(&self, ctx: &$crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
                match self {
                    $(
                        Command::$variant(op) => {
                            op.execute(ctx).await
                                .map(OpOutput::$variant)
                                .map_err(OpError::$variant)
                        },
                    )*
                }
            }
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        OpOutput::$variant(output) => write!(f, "{}", output),
                    )*
                }
            }
        }
    };
}
