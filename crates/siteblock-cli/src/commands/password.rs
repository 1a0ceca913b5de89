use clap::Subcommand;
use siteblock_core::credentials::{self, SECURITY_QUESTIONS};
use siteblock_core::{AuthError, CoreError};

use super::{open_store, CliResult};

#[derive(Subcommand)]
pub enum PasswordAction {
    /// Set the password and security question
    Set {
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm: String,
        /// Security question id (see `password questions`)
        #[arg(long)]
        question: String,
        #[arg(long)]
        answer: String,
    },
    /// Check a password
    Verify {
        #[arg(long)]
        password: String,
    },
    /// Reset the password by answering the security question
    Recover {
        #[arg(long)]
        answer: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm: String,
    },
    /// List security questions and show the configured one
    Questions,
}

pub async fn run(action: PasswordAction) -> CliResult {
    let (_, store) = open_store()?;
    match action {
        PasswordAction::Set {
            password,
            confirm,
            question,
            answer,
        } => {
            credentials::set_password(&store, &password, &confirm, &question, &answer).await?;
            println!("password set");
        }
        PasswordAction::Verify { password } => {
            credentials::verify_password(&store, &password).await?;
            println!("ok");
        }
        PasswordAction::Recover {
            answer,
            password,
            confirm,
        } => match credentials::recover_password(&store, &answer, &password, &confirm).await {
            Ok(()) => println!("password reset"),
            Err(CoreError::Auth(AuthError::NoSecurityQuestion)) => {
                return Err("no security question set; run `siteblock reset --yes` to start over".into());
            }
            Err(e) => return Err(e.into()),
        },
        PasswordAction::Questions => {
            for (id, prompt) in SECURITY_QUESTIONS {
                println!("{id:<8} {prompt}");
            }
            if let Some(id) = credentials::security_question(&store).await? {
                let prompt = credentials::question_prompt(&id).unwrap_or("unknown question");
                println!("\nconfigured: {id} ({prompt})");
            }
        }
    }
    Ok(())
}
