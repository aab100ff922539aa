mod client;
mod render;

use std::io::{self, BufRead, IsTerminal, Write};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use dialoguer::Confirm;

use client::{BookUpdate, BooksClient, ClientError, Credentials, NewBook};

#[derive(Debug, Parser)]
#[command(name = "books", about = "CLI tool for managing books via the Books API")]
struct Cli {
    /// Base URL of the Books API
    #[arg(long, global = true, env = "BOOKS_API_URL", default_value = "http://127.0.0.1:8000")]
    api_url: String,

    /// API key sent as X-API-Key
    #[arg(long, global = true, env = "BOOKS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Bearer token from `books login`
    #[arg(long, global = true, env = "BOOKS_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a new book
    Create {
        #[arg(short, long)]
        title: String,
        #[arg(short, long)]
        author: String,
        #[arg(short, long)]
        year: i64,
        #[arg(short, long)]
        price: f64,
    },
    /// List books with optional search and pagination
    List {
        /// Case-sensitive substring of title or author
        #[arg(short, long)]
        q: Option<String>,
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
        #[arg(short, long, default_value_t = 0)]
        offset: u32,
    },
    /// Show one book
    Get { id: i64 },
    /// Update an existing book (only the fields given are changed)
    Update {
        id: i64,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        author: Option<String>,
        #[arg(short, long)]
        year: Option<i64>,
        #[arg(short, long)]
        price: Option<f64>,
    },
    /// Delete a book
    Delete {
        id: i64,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Exchange a username and password for a bearer token
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },
}

/// How a command finished short of success.
enum Failure {
    /// Already reported to the user.
    Reported,
    Client { error: ClientError, id: Option<i64> },
    Other(anyhow::Error),
}

impl From<anyhow::Error> for Failure {
    fn from(err: anyhow::Error) -> Self {
        Failure::Other(err)
    }
}

impl Failure {
    fn client(id: Option<i64>) -> impl FnOnce(ClientError) -> Failure {
        move |error| Failure::Client { error, id }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init()
        .ok();

    let cli = Cli::parse();

    let client = match BooksClient::new(
        &cli.api_url,
        Credentials {
            api_key: cli.api_key.clone(),
            token: cli.token.clone(),
        },
    ) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("{}", format!("Error: {err:#}").red());
            return ExitCode::FAILURE;
        }
    };

    match run(&client, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            report(&client, failure);
            ExitCode::FAILURE
        }
    }
}

async fn run(client: &BooksClient, command: Command) -> Result<(), Failure> {
    match command {
        Command::Create {
            title,
            author,
            year,
            price,
        } => {
            let book = NewBook {
                title,
                author,
                year,
                price,
            };
            let created = client.create(&book).await.map_err(Failure::client(None))?;
            println!("{}", render::saved("Book created successfully!", &created));
        }
        Command::List { q, limit, offset } => {
            let books = client
                .list(q.as_deref(), limit, offset)
                .await
                .map_err(Failure::client(None))?;
            println!("{}", render::table(&books));
        }
        Command::Get { id } => {
            let book = client.get(id).await.map_err(Failure::client(Some(id)))?;
            println!("{}", render::details(&book));
        }
        Command::Update {
            id,
            title,
            author,
            year,
            price,
        } => {
            let update = BookUpdate {
                title,
                author,
                year,
                price,
            };
            if update.is_empty() {
                eprintln!(
                    "{}",
                    "No fields to update. Please provide at least one field.".red()
                );
                return Err(Failure::Reported);
            }
            let updated = client
                .update(id, &update)
                .await
                .map_err(Failure::client(Some(id)))?;
            println!("{}", render::saved("Book updated successfully!", &updated));
        }
        Command::Delete { id, yes } => {
            if !yes && !confirm(&format!("Are you sure you want to delete book with ID {id}?"))? {
                println!("{}", "Deletion cancelled.".yellow());
                return Ok(());
            }
            let deleted = client.delete(id).await.map_err(Failure::client(Some(id)))?;
            println!("{}", deleted.message.green());
        }
        Command::Login { username, password } => {
            let token = client
                .login(&username, &password)
                .await
                .map_err(Failure::client(None))?;
            println!("{}", render::token(&token));
        }
    }
    Ok(())
}

/// Ask for confirmation. Without a terminal the answer is read from stdin.
fn confirm(prompt: &str) -> anyhow::Result<bool> {
    if io::stdin().is_terminal() {
        return Ok(Confirm::new().with_prompt(prompt).default(false).interact()?);
    }

    print!("{prompt} [y/N]: ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn report(client: &BooksClient, failure: Failure) {
    match failure {
        Failure::Reported => {}
        Failure::Client {
            error: ClientError::Connect(err),
            ..
        } => {
            eprintln!("{}", format!("Error connecting to API: {err}").red());
            eprintln!("Make sure the API is running at {}", client.base_url());
        }
        Failure::Client {
            error,
            id: Some(id),
        } if error.is_not_found() => {
            eprintln!("{}", format!("Book with ID {id} not found.").red());
        }
        Failure::Client { error, .. } => {
            eprintln!("{}", format!("Error: {error}").red());
        }
        Failure::Other(err) => {
            eprintln!("{}", format!("Error: {err:#}").red());
        }
    }
}
