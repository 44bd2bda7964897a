use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "job-tracker", about = "Job application tracker API")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run migrations, then serve the HTTP API (default)
    Serve,

    /// Apply pending database migrations and exit
    Migrate,

    /// Delete stored resumes that no job references
    Sweep {
        /// Only report what would be deleted
        #[arg(long)]
        dry_run: bool,
    },
}

impl Cli {
    pub fn command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Serve)
    }
}
