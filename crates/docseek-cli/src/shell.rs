//! Line-oriented command shell over the coordinator.

use std::io::Write;
use std::path::PathBuf;

use docseek_core::Error;
use docseek_runtime::{Coordinator, SearchParams, SelectedFile, UploadStatus, View};
use tracing::debug;

use crate::render;

pub const HELP: &str = "\
Commands:
  key <token>                        Validate and store an API key
  key clear                          Forget the API key
  status                             Show key, upload and view state
  view <upload|search|documents>     Switch view
  upload <path>                      Upload a PDF, TXT or DOCX file (max 10MB)
  reset                              Clear a finished upload
  docs                               Reload the document list
  delete <file_id>                   Delete a document (asks first)
  search [-n LIMIT] [-t THRESHOLD] <query>
                                     Search (limit 5|10|20|50, threshold 0.3-0.9)
  scope [file_id...]                 Restrict search to files; no ids clears it
  health                             Check the document service
  help                               Show this help
  quit                               End the session";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetKey(String),
    ClearKey,
    Status,
    Show(View),
    Upload(PathBuf),
    Reset,
    Docs,
    Delete(String),
    Search {
        limit: Option<u32>,
        threshold: Option<f64>,
        query: String,
    },
    Scope(Vec<String>),
    Health,
    Help,
    Quit,
}

impl Command {
    /// Parse one input line. `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(None);
        };
        let rest: Vec<&str> = words.collect();

        let command = match head {
            "key" => match rest.as_slice() {
                ["clear"] => Self::ClearKey,
                [token] => Self::SetKey(token.to_string()),
                _ => return Err("Usage: key <token> | key clear".into()),
            },
            "status" => Self::Status,
            "view" => match rest.as_slice() {
                [name] => Self::Show(name.parse()?),
                _ => return Err("Usage: view <upload|search|documents>".into()),
            },
            "upload" => {
                if rest.is_empty() {
                    return Err("Usage: upload <path>".into());
                }
                Self::Upload(PathBuf::from(rest.join(" ")))
            }
            "reset" => Self::Reset,
            "docs" | "documents" => Self::Docs,
            "delete" => match rest.as_slice() {
                [id] => Self::Delete(id.to_string()),
                _ => return Err("Usage: delete <file_id>".into()),
            },
            "search" => parse_search(&rest)?,
            "scope" => Self::Scope(rest.iter().map(|s| s.to_string()).collect()),
            "health" => Self::Health,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(format!("Unknown command: {}. Type `help`.", other)),
        };
        Ok(Some(command))
    }
}

fn parse_search(args: &[&str]) -> Result<Command, String> {
    let mut limit = None;
    let mut threshold = None;
    let mut i = 0;
    while i < args.len() {
        match args[i] {
            "-n" => {
                let value = args.get(i + 1).ok_or("Missing value for -n")?;
                limit = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Invalid limit: {}", value))?,
                );
                i += 2;
            }
            "-t" => {
                let value = args.get(i + 1).ok_or("Missing value for -t")?;
                threshold = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Invalid threshold: {}", value))?,
                );
                i += 2;
            }
            _ => break,
        }
    }
    Ok(Command::Search {
        limit,
        threshold,
        query: args[i..].join(" "),
    })
}

/// Interactive session state kept outside the coordinator.
pub struct Shell<'a> {
    coordinator: &'a Coordinator,
    params: SearchParams,
    scope: Vec<String>,
}

impl<'a> Shell<'a> {
    pub fn new(coordinator: &'a Coordinator) -> Self {
        Self {
            coordinator,
            params: SearchParams::default(),
            scope: Vec::new(),
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        println!("DocSeek. Type `help` for commands.");
        if self.coordinator.credentials().prompt_needed() {
            println!("Set your API key first: key <sk-...>");
        }

        loop {
            print!("docseek:{}> ", self.coordinator.view());
            std::io::stdout().flush()?;

            let Some(line) = read_line()? else {
                break;
            };
            match Command::parse(&line) {
                Ok(None) => {}
                Ok(Some(Command::Quit)) => break,
                Ok(Some(command)) => self.execute(command).await,
                Err(msg) => println!("{}", msg),
            }
        }
        Ok(())
    }

    async fn execute(&mut self, command: Command) {
        debug!("Executing {:?}", command);
        let coord = self.coordinator;
        match command {
            Command::SetKey(token) => match coord.credentials().validate(&token).await {
                Ok(()) => println!("API key accepted."),
                Err(e) => println!("{}", e.user_message()),
            },
            Command::ClearKey => {
                coord.credentials().clear();
                println!("API key cleared.");
            }
            Command::Status => {
                println!("{}", render::credential(&coord.credentials().current()));
                println!("{}", render::upload_job(&coord.uploads().job()));
                println!("View: {} · epoch {}", coord.view(), coord.epoch());
                let busy = render::busy(
                    coord.credentials().is_validating(),
                    coord.search().is_searching(),
                    coord.registry().deleting().as_deref(),
                );
                if let Some(line) = busy {
                    println!("{}", line);
                }
                println!("Search: {}", self.params.summary());
                if !self.scope.is_empty() {
                    println!("Scope: {}", self.scope.join(", "));
                }
            }
            Command::Show(view) => {
                report(coord.show(view).await);
                self.print_view(view);
            }
            Command::Upload(path) => self.upload(path).await,
            Command::Reset => match coord.uploads().reset() {
                Ok(()) => println!("Ready for another upload."),
                Err(e) => println!("{}", e.user_message()),
            },
            Command::Docs => {
                report(coord.registry().refresh().await.map(|_| ()));
                self.print_view(View::Documents);
            }
            Command::Delete(file_id) => {
                match coord.registry().delete(&file_id, &confirm).await {
                    Ok(()) => println!("Deleted."),
                    Err(Error::ConfirmationDeclined) => println!("Cancelled."),
                    Err(e) => println!("{}", e.user_message()),
                }
            }
            Command::Search {
                limit,
                threshold,
                query,
            } => {
                let params = match SearchParams::new(
                    limit.unwrap_or(self.params.limit()),
                    threshold.unwrap_or(self.params.threshold()),
                ) {
                    Ok(params) => params,
                    Err(e) => {
                        println!("{}", e.user_message());
                        return;
                    }
                };
                self.params = params;
                let result = coord
                    .search()
                    .search_within(&query, params, &self.scope)
                    .await;
                match result {
                    Ok(_) if query.trim().is_empty() => {}
                    Ok(_) => self.print_view(View::Search),
                    Err(e) => println!("{}", e.user_message()),
                }
            }
            Command::Scope(ids) => {
                self.scope = ids;
                if self.scope.is_empty() {
                    println!("Searching all documents.");
                } else {
                    println!("Searching within {} document(s).", self.scope.len());
                }
            }
            Command::Health => match coord.health().await {
                Ok(health) => println!("{}", render::health(&health)),
                Err(e) => println!("Service unreachable: {}", e.user_message()),
            },
            Command::Help => println!("{}", HELP),
            Command::Quit => {}
        }
    }

    async fn upload(&self, path: PathBuf) {
        let coord = self.coordinator;
        let file = match SelectedFile::from_path(&path) {
            Ok(file) => file,
            Err(e) => {
                println!("{}", e.user_message());
                return;
            }
        };

        let mut job_rx = coord.uploads().subscribe();
        let progress = tokio::spawn(async move {
            let mut last = 0u8;
            while job_rx.changed().await.is_ok() {
                let job = job_rx.borrow_and_update().clone();
                if job.status == UploadStatus::Uploading && job.progress >= last.saturating_add(10) {
                    last = job.progress;
                    println!("  {}%", job.progress);
                }
                if matches!(job.status, UploadStatus::Success | UploadStatus::Error) {
                    break;
                }
            }
        });

        let result = coord.upload(file).await;
        progress.abort();
        match result {
            Ok(summary) => {
                println!(
                    "Uploaded {} ({} chunks). {}",
                    summary.filename, summary.chunks_created, summary.message
                );
                println!("Switched to search; run `upload` again after `reset`.");
            }
            Err(e) => println!("{}", e.user_message()),
        }
    }

    fn print_view(&self, view: View) {
        let coord = self.coordinator;
        match view {
            View::Upload => println!("{}", render::upload_job(&coord.uploads().job())),
            View::Search => {
                let search = coord.search();
                println!("{}", render::search_view(&search.view(), &search.last_query()));
            }
            View::Documents => {
                let registry = coord.registry();
                println!(
                    "{}",
                    render::registry_view(
                        &registry.view(),
                        &registry.count_label(),
                        registry.total_chunks()
                    )
                );
            }
        }
    }
}

fn report(result: docseek_core::Result<()>) {
    if let Err(e) = result {
        debug!("Command failed: {}", e);
    }
}

fn read_line() -> std::io::Result<Option<String>> {
    let mut line = String::new();
    if std::io::stdin().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

/// Ask on the terminal; anything but `y`/`yes` declines.
fn confirm(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    if std::io::stdout().flush().is_err() {
        return false;
    }
    match read_line() {
        Ok(Some(answer)) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
        _ => false,
    }
}
