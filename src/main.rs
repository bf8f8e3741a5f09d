use anyhow::Result;
use clap::{Parser, Subcommand};
use gtrack::commands::porcelain::commit::CommitOptions;
use gtrack::commands::porcelain::status::{render_long, render_porcelain};
use gtrack::{Tracker, TrackerConfig};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "gtrack",
    version = "0.1.0",
    author = "Sami Barbut-Dica",
    about = "Git file-status tracker",
    long_about = "Resolves the status of every file in a Git working tree, either in-process \
    or through a native git executable, and performs the staging, commit and checkout \
    operations a source-control panel needs.",
    help_template = r"
{name} {version} - {about}

USAGE:
    {usage}

OPTIONS:
    {all-args}
",
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "GTRACK_GIT",
        help = "Native git executable; without it statuses are resolved in-process"
    )]
    git: Option<PathBuf>,
    #[arg(
        long = "latin1-file-names",
        global = true,
        help = "Decode file names printed by git as Latin-1 instead of UTF-8"
    )]
    latin1_file_names: bool,
    #[arg(
        short = 'C',
        long = "workdir",
        global = true,
        help = "Run as if started in this directory"
    )]
    workdir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(name = "init", about = "Create an empty repository")]
    Init,
    #[command(name = "status", about = "List changed files")]
    Status {
        #[arg(long, help = "One `XY path` line per file")]
        porcelain: bool,
    },
    #[command(name = "file-status", about = "Print the status of a single path")]
    FileStatus {
        #[arg(index = 1)]
        path: PathBuf,
    },
    #[command(name = "stage", about = "Stage a file or directory")]
    Stage {
        #[arg(index = 1, required = true)]
        paths: Vec<PathBuf>,
    },
    #[command(name = "unstage", about = "Reset staged changes back to HEAD")]
    Unstage {
        #[arg(index = 1, required = true)]
        paths: Vec<PathBuf>,
    },
    #[command(name = "commit", about = "Record the index as a new commit")]
    Commit {
        #[arg(short, long, help = "The commit message")]
        message: String,
        #[arg(long, help = "Replace the last commit")]
        amend: bool,
        #[arg(short = 's', long = "signoff", help = "Add a Signed-off-by trailer")]
        sign_off: bool,
    },
    #[command(name = "checkout", about = "Discard working changes to a file")]
    Checkout {
        #[arg(index = 1)]
        path: PathBuf,
    },
    #[command(name = "switch", about = "Switch branches")]
    Switch {
        #[arg(index = 1)]
        branch: String,
        #[arg(short = 'c', long = "create", help = "Create the branch at HEAD first")]
        create: bool,
    },
    #[command(name = "show", about = "Print the committed content of a file")]
    Show {
        #[arg(index = 1)]
        path: PathBuf,
    },
    #[command(name = "diff", about = "Write the patch of a file to a temporary file")]
    Diff {
        #[arg(index = 1)]
        path: PathBuf,
        #[arg(long, help = "Print the patch instead of its location")]
        print: bool,
    },
    #[command(name = "branch", about = "List branches")]
    Branch,
    #[command(name = "last-message", about = "Print the message of the last commit")]
    LastMessage,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("GTRACK_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = TrackerConfig::default().with_utf8_file_names(!cli.latin1_file_names);
    if let Some(git) = cli.git {
        config = config.with_git_executable(git);
    }

    let workdir = match cli.workdir {
        Some(workdir) => workdir,
        None => std::env::current_dir()?,
    };
    let tracker = Tracker::open(&workdir, config).await;
    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Commands::Init => {
            tracker.init().await?;
            writeln!(
                stdout,
                "Initialized empty repository in {}",
                tracker.workdir().join(".git").display()
            )?;
        }
        Commands::Status { porcelain } => {
            ensure_controlled(&tracker)?;
            if let Some(error) = tracker.last_error() {
                anyhow::bail!("unable to scan the working tree: {error:#}");
            }
            let files = tracker.changed_files();

            if porcelain {
                render_porcelain(&mut stdout, &files)?;
            } else {
                render_long(&mut stdout, tracker.current_branch().as_deref(), &files)?;
            }
        }
        Commands::FileStatus { path } => {
            let status = tracker.file_status(workdir.join(&path)).await;
            writeln!(stdout, "{status}")?;
        }
        Commands::Stage { paths } => {
            for path in paths {
                tracker.stage_file(workdir.join(path)).await?;
            }
        }
        Commands::Unstage { paths } => {
            for path in paths {
                tracker.unstage_file(workdir.join(path)).await?;
            }
        }
        Commands::Commit {
            message,
            amend,
            sign_off,
        } => {
            let short_id = tracker
                .commit(&message, CommitOptions { amend, sign_off })
                .await?;
            let branch = tracker.current_branch().unwrap_or_else(|| "HEAD".to_string());
            let summary = message.lines().next().unwrap_or_default();

            writeln!(stdout, "[{branch} {short_id}] {summary}")?;
        }
        Commands::Checkout { path } => {
            tracker.check_out_file(workdir.join(path)).await?;
        }
        Commands::Switch { branch, create } => {
            tracker.check_out_branch(&branch, create).await?;
            writeln!(stdout, "Switched to branch '{branch}'")?;
        }
        Commands::Show { path } => {
            ensure_controlled(&tracker)?;
            match tracker.file_content(workdir.join(&path)).await {
                Some(content) => stdout.write_all(&content)?,
                None => anyhow::bail!("{} is not part of the last commit", path.display()),
            }
        }
        Commands::Diff { path, print } => {
            let patch_path = tracker.diff_file(workdir.join(path)).await?;

            if print {
                stdout.write_all(&std::fs::read(&patch_path)?)?;
                std::fs::remove_file(&patch_path)?;
            } else {
                writeln!(stdout, "{}", patch_path.display())?;
            }
        }
        Commands::Branch => {
            ensure_controlled(&tracker)?;
            let current = tracker.current_branch();

            for branch in tracker.branches() {
                let marker = if current.as_deref() == Some(branch.as_str()) {
                    "*"
                } else {
                    " "
                };
                writeln!(stdout, "{marker} {branch}")?;
            }
        }
        Commands::LastMessage => {
            if let Some(message) = tracker.last_commit_message() {
                writeln!(stdout, "{message}")?;
            }
        }
    }

    Ok(())
}

fn ensure_controlled(tracker: &Tracker) -> Result<()> {
    if tracker.is_controlled() {
        Ok(())
    } else {
        Err(gtrack::TrackerError::NotARepository {
            path: tracker.workdir().to_path_buf(),
        }
        .into())
    }
}
