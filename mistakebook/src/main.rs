// Mistake notebook - command-line front end
// Entry point, argument parsing and terminal interaction

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mistakebook::app;
use mistakebook::commands::{Interaction, Outcome, Session};
use mistakebook::config::{AppConfig, DATA_DIR_ENV};
use mistakebook::store::MistakeDraft;
use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Keep track of mistakes by subject and chapter
#[derive(Parser)]
#[command(name = "mistakebook")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Data directory (default: ./mistakes_data)
    #[arg(long, global = true, env = DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    /// Answer yes to every confirmation
    #[arg(short, long, global = true)]
    yes: bool,

    /// Enable verbose logging (sets log level to DEBUG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// List subjects
    Subjects,

    /// Add or remove a subject
    #[command(subcommand)]
    Subject(SubjectCommand),

    /// List the chapters of a subject
    Chapters { subject: String },

    /// Add or remove a chapter
    #[command(subcommand)]
    Chapter(ChapterCommand),

    /// List the mistakes of a chapter
    List { subject: String, chapter: String },

    /// Show one mistake
    Show {
        id: String,
        /// Image position to show (1-based)
        #[arg(long)]
        image: Option<usize>,
    },

    /// Log a new mistake
    Add {
        subject: String,
        chapter: String,
        #[command(flatten)]
        text: MistakeText,
    },

    /// Replace the text of a mistake
    Update {
        id: String,
        #[command(flatten)]
        text: MistakeText,
    },

    /// Delete a mistake and its images
    Rm { id: String },

    /// Manage the images of a mistake
    #[command(subcommand)]
    Image(ImageCommand),

    /// Export the notebook to a zip archive
    Export { dest: PathBuf },

    /// Replace the notebook with the contents of a zip archive
    Import { src: PathBuf },
}

#[derive(Subcommand)]
enum SubjectCommand {
    Add { name: String },
    Rm { name: String },
}

#[derive(Subcommand)]
enum ChapterCommand {
    Add { subject: String, name: String },
    Rm { subject: String, chapter: String },
}

#[derive(Subcommand)]
enum ImageCommand {
    /// Attach image files
    Add {
        id: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Remove the image at a position (1-based)
    Rm { id: String, position: usize },
    /// Position after moving forward from `--at`
    Next {
        id: String,
        #[arg(long)]
        at: Option<usize>,
    },
    /// Position after moving back from `--at`
    Prev {
        id: String,
        #[arg(long)]
        at: Option<usize>,
    },
}

#[derive(Args)]
struct MistakeText {
    #[arg(long)]
    title: String,
    #[arg(long)]
    description: String,
    #[arg(long, default_value = "")]
    answer: String,
}

impl From<MistakeText> for MistakeDraft {
    fn from(text: MistakeText) -> Self {
        MistakeDraft::new(text.title, text.description, text.answer)
    }
}

/// Terminal interaction. Answers given on the command line are used first;
/// anything else is asked on stdin.
#[derive(Default)]
struct Terminal {
    assume_yes: bool,
    texts: VecDeque<String>,
    open_files: Vec<PathBuf>,
    save_file: Option<PathBuf>,
}

impl Terminal {
    fn read_line(prompt: &str) -> Option<String> {
        eprint!("{} ", prompt);
        std::io::stderr().flush().ok()?;

        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }
}

impl Interaction for Terminal {
    fn confirm(&mut self, title: &str, question: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        Self::read_line(&format!("{}: {} [y/N]", title, question))
            .map(|answer| matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
            .unwrap_or(false)
    }

    fn ask_text(&mut self, title: &str, prompt: &str) -> Option<String> {
        self.texts
            .pop_front()
            .or_else(|| Self::read_line(&format!("{}: {}", title, prompt)))
    }

    fn pick_open_files(&mut self, _title: &str) -> Vec<PathBuf> {
        std::mem::take(&mut self.open_files)
    }

    fn pick_save_file(&mut self, _title: &str) -> Option<PathBuf> {
        self.save_file.take()
    }

    fn status(&mut self, message: &str) {
        eprintln!("{}", message);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG always wins; --verbose falls back to DEBUG
    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "mistakebook=info,warn".into())
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = AppConfig::resolve(cli.data_dir).context("Failed to resolve data directory")?;
    let state = app::setup(config)
        .await
        .context("Failed to open the notebook")?;

    let terminal = Terminal {
        assume_yes: cli.yes,
        ..Default::default()
    };
    let mut session = Session::new(state, terminal);

    let outcome = run(&mut session, cli.command)
        .await
        .unwrap_or_else(|failed| failed);
    if outcome.ok {
        println!("{}", outcome.message);
        Ok(())
    } else {
        eprintln!("{}", outcome.message);
        std::process::exit(1);
    }
}

/// Run one command. Failed preparatory steps short-circuit with their outcome.
async fn run(session: &mut Session<Terminal>, command: Command) -> Result<Outcome, Outcome> {
    let outcome = match command {
        Command::Subjects => {
            let subjects = session.state().catalog_service.list_subjects().await;
            Outcome::success(subjects.join("\n"))
        }
        Command::Subject(SubjectCommand::Add { name }) => {
            session.interaction_mut().texts.push_back(name);
            session.add_subject().await
        }
        Command::Subject(SubjectCommand::Rm { name }) => {
            require(session.select_subject(&name).await)?;
            session.delete_subject().await
        }
        Command::Chapters { subject } => {
            require(session.select_subject(&subject).await)?;
            let chapters = session.state().catalog_service.list_chapters(&subject).await;
            Outcome::success(chapters.join("\n"))
        }
        Command::Chapter(ChapterCommand::Add { subject, name }) => {
            require(session.select_subject(&subject).await)?;
            session.interaction_mut().texts.push_back(name);
            session.add_chapter().await
        }
        Command::Chapter(ChapterCommand::Rm { subject, chapter }) => {
            require(session.select_subject(&subject).await)?;
            require(session.select_chapter(&chapter).await)?;
            session.delete_chapter().await
        }
        Command::List { subject, chapter } => {
            require(session.select_subject(&subject).await)?;
            require(session.select_chapter(&chapter).await)?;
            let lines: Vec<String> = session
                .visible_mistakes()
                .await
                .iter()
                .map(|m| format!("{}  {}  {}  [{} images]", m.id, m.date, m.title, m.images.len()))
                .collect();
            Outcome::success(lines.join("\n"))
        }
        Command::Show { id, image } => {
            require(select_record(session, &id).await)?;
            show_position(session, image).await?;
            show(session).await
        }
        Command::Add {
            subject,
            chapter,
            text,
        } => {
            require(session.select_subject(&subject).await)?;
            require(session.select_chapter(&chapter).await)?;
            session.add_mistake(text.into()).await
        }
        Command::Update { id, text } => {
            require(select_record(session, &id).await)?;
            session.update_mistake(text.into()).await
        }
        Command::Rm { id } => {
            require(select_record(session, &id).await)?;
            session.delete_mistake().await
        }
        Command::Image(ImageCommand::Add { id, files }) => {
            require(select_record(session, &id).await)?;
            session.interaction_mut().open_files = files;
            session.add_images().await
        }
        Command::Image(ImageCommand::Rm { id, position }) => {
            require(select_record(session, &id).await)?;
            require(session.show_image(position).await)?;
            session.delete_image().await
        }
        Command::Image(ImageCommand::Next { id, at }) => {
            require(select_record(session, &id).await)?;
            show_position(session, at).await?;
            Outcome::success(session.next_image().await)
        }
        Command::Image(ImageCommand::Prev { id, at }) => {
            require(select_record(session, &id).await)?;
            show_position(session, at).await?;
            Outcome::success(session.prev_image().await)
        }
        Command::Export { dest } => {
            session.interaction_mut().save_file = Some(dest);
            session.export_archive().await
        }
        Command::Import { src } => {
            session.interaction_mut().open_files = vec![src];
            session.import_archive().await
        }
    };
    Ok(outcome)
}

fn require(outcome: Outcome) -> Result<(), Outcome> {
    if outcome.ok {
        Ok(())
    } else {
        Err(outcome)
    }
}

/// Select a mistake by id together with its subject and chapter
async fn select_record(session: &mut Session<Terminal>, id: &str) -> Outcome {
    let record = match session.state().mistakes_service.get_mistake(id).await {
        Ok(record) => record,
        Err(e) => return Outcome::from_error("Select mistake", e),
    };

    session.select_subject(&record.subject).await;
    session.select_chapter(&record.chapter).await;
    session.select_mistake(id).await
}

/// Move the image cursor to a 1-based position, if one was given
async fn show_position(
    session: &mut Session<Terminal>,
    position: Option<usize>,
) -> Result<(), Outcome> {
    match position {
        Some(position) => require(session.show_image(position).await),
        None => Ok(()),
    }
}

async fn show(session: &Session<Terminal>) -> Outcome {
    let Some(view) = session.current_view().await else {
        return Outcome::failure("Select a mistake first");
    };

    let record = &view.record;
    let image = view
        .image
        .as_ref()
        .map(|path| {
            if path.exists() {
                path.display().to_string()
            } else {
                format!("{} (missing)", path.display())
            }
        })
        .unwrap_or_else(|| "no image".to_string());

    Outcome::success(format!(
        "{}\n{} / {}  {}\n\nDescription:\n{}\n\nAnswer:\n{}\n\nImage {}: {}",
        record.title,
        record.subject,
        record.chapter,
        record.date,
        record.description,
        record.answer,
        view.image_label,
        image
    ))
}
