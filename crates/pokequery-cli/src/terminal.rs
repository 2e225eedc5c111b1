//! Terminal Interface
//!
//! Line-oriented prompts on stdin/stdout: the server's dataset prompt, the
//! client menu, and a background task that prints query and persist
//! outcomes as they arrive.

use std::io::Write;
use std::path::PathBuf;

use pokequery_runtime::{ClientEvents, PersistEvent, QueryEvent};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::task::JoinHandle;

use crate::error::Result;

// ----------------------------------------------------------------------------
// Prompts
// ----------------------------------------------------------------------------

/// Reads answers to prompts from stdin
pub struct Terminal {
    lines: Lines<BufReader<Stdin>>,
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Print `text` and read one line; `None` at end of input
    pub async fn prompt(&mut self, text: &str) -> Result<Option<String>> {
        print!("{text}");
        std::io::stdout().flush()?;
        Ok(self.lines.next_line().await?)
    }

    /// Ask for the dataset until an existing file is named
    ///
    /// Returns `None` when the user types `q` or input ends.
    pub async fn prompt_dataset(&mut self) -> Result<Option<PathBuf>> {
        loop {
            let Some(answer) =
                self.prompt("Enter the name of the pokemon.csv file or type q to quit: ").await?
            else {
                return Ok(None);
            };
            let answer = answer.trim();
            if answer == "q" {
                return Ok(None);
            }
            let path = PathBuf::from(answer);
            if path.is_file() {
                return Ok(Some(path));
            }
            println!("Pokemon file is not found. Please enter the name of the file again.");
        }
    }

    pub async fn prompt_menu(&mut self) -> Result<Option<MenuChoice>> {
        loop {
            println!();
            println!("Please select an option:");
            println!("(a) Type search");
            println!("(b) Save results");
            println!("(c) Exit the program");
            let Some(answer) = self.prompt("> ").await? else {
                return Ok(None);
            };
            match MenuChoice::parse(&answer) {
                Some(choice) => return Ok(Some(choice)),
                None => println!("Invalid option {:?}, please choose a, b or c.", answer.trim()),
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Menu
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Search,
    Save,
    Exit,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "a" | "A" => Some(MenuChoice::Search),
            "b" | "B" => Some(MenuChoice::Save),
            "c" | "C" => Some(MenuChoice::Exit),
            _ => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Event Printer
// ----------------------------------------------------------------------------

/// Print background outcomes until both event streams close
pub fn spawn_event_printer(events: ClientEvents) -> JoinHandle<()> {
    let ClientEvents {
        mut queries,
        mut persists,
    } = events;
    tokio::spawn(async move {
        let mut queries_open = true;
        let mut persists_open = true;
        while queries_open || persists_open {
            tokio::select! {
                event = queries.recv(), if queries_open => match event {
                    Some(event) => println!("{}", describe_query(&event)),
                    None => queries_open = false,
                },
                event = persists.recv(), if persists_open => match event {
                    Some(event) => println!("{}", describe_persist(&event)),
                    None => persists_open = false,
                },
            }
        }
    })
}

pub fn describe_query(event: &QueryEvent) -> String {
    match event {
        QueryEvent::Completed { category, records } => {
            format!("Search for {category} complete: {records} record(s) captured.")
        }
        QueryEvent::Failed { category, error } => {
            format!("Search for {category} failed: {error}")
        }
    }
}

pub fn describe_persist(event: &PersistEvent) -> String {
    match event {
        PersistEvent::Completed(report) => format!(
            "Saved {} record(s) to {}.",
            report.records_written, report.destination
        ),
        PersistEvent::Failed { destination, error } => {
            format!("Saving to {destination} failed: {error}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pokequery_runtime::{Category, PersistReport, PokequeryError};

    #[test]
    fn test_menu_choice_parsing() {
        assert_eq!(MenuChoice::parse("a"), Some(MenuChoice::Search));
        assert_eq!(MenuChoice::parse(" B \n"), Some(MenuChoice::Save));
        assert_eq!(MenuChoice::parse("c"), Some(MenuChoice::Exit));
        assert_eq!(MenuChoice::parse("d"), None);
        assert_eq!(MenuChoice::parse(""), None);
    }

    #[test]
    fn test_event_descriptions() {
        let done = QueryEvent::Completed {
            category: Category::Fire,
            records: 3,
        };
        assert_eq!(
            describe_query(&done),
            "Search for Fire complete: 3 record(s) captured."
        );

        let failed = PersistEvent::Failed {
            destination: "out.csv".to_string(),
            error: PokequeryError::NoData,
        };
        assert!(describe_persist(&failed).starts_with("Saving to out.csv failed"));

        let saved = PersistEvent::Completed(PersistReport {
            destination: "out.csv".to_string(),
            records_written: 2,
            newly_registered: true,
            server_paused: false,
        });
        assert_eq!(describe_persist(&saved), "Saved 2 record(s) to out.csv.");
    }
}
