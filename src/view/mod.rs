//! Interactive text menu.
//!
//! Reads typed values from any `BufRead` and writes prompts and results to
//! any `Write`, so the loop can be driven from stdin or from a test buffer.
//! End of input ends the session like choosing "Exit".

use crate::analysis::AggregationMode;
use crate::models::{DiplomaProject, Profile, Record, RecordError, RecordId, ResearchWork};
use crate::registry::{Registry, RegistryError};
use crate::report;
use anyhow::Result;
use std::io::{BufRead, Write};
use std::str::FromStr;
use tracing::debug;

const MENU: &str = "\n--- Student Registry ---
1. Add student
2. Find student
3. Remove student
4. Show all students
5. Group averages (sequential)
6. Group averages (parallel)
7. Change student group
8. Exit
Enter your choice: ";

/// Menu entries, numbered as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Add,
    Find,
    Remove,
    ShowAll,
    AverageSequential,
    AverageParallel,
    ChangeGroup,
    Exit,
}

impl MenuChoice {
    pub fn from_number(n: u32) -> Option<Self> {
        match n {
            1 => Some(MenuChoice::Add),
            2 => Some(MenuChoice::Find),
            3 => Some(MenuChoice::Remove),
            4 => Some(MenuChoice::ShowAll),
            5 => Some(MenuChoice::AverageSequential),
            6 => Some(MenuChoice::AverageParallel),
            7 => Some(MenuChoice::ChangeGroup),
            8 => Some(MenuChoice::Exit),
            _ => None,
        }
    }
}

enum Flow {
    Continue,
    Quit,
}

/// Line-oriented prompt helper over an input/output pair.
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn show(&mut self, message: &str) -> Result<()> {
        writeln!(self.output, "{}", message)?;
        Ok(())
    }

    /// Print `text` and read one line, trimmed. `None` at end of input.
    fn prompt(&mut self, text: &str) -> Result<Option<String>> {
        write!(self.output, "{}", text)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Prompt until the answer parses and passes `accept`.
    fn prompt_value<T: FromStr>(
        &mut self,
        text: &str,
        accept: impl Fn(&T) -> bool,
        retry: &str,
    ) -> Result<Option<T>> {
        loop {
            let Some(line) = self.prompt(text)? else {
                return Ok(None);
            };
            match line.parse::<T>() {
                Ok(value) if accept(&value) => return Ok(Some(value)),
                _ => self.show(retry)?,
            }
        }
    }

    fn prompt_int(&mut self, text: &str) -> Result<Option<i32>> {
        self.prompt_value(text, |_| true, "Invalid input. Please enter a whole number.")
    }

    fn prompt_id(&mut self) -> Result<Option<RecordId>> {
        self.prompt_value(
            "Enter student ID: ",
            |_| true,
            "Invalid input. Please enter a non-negative whole number.",
        )
    }

    /// Prompt for a space-separated list of grades; an empty line is an empty list.
    fn prompt_grades(&mut self, text: &str) -> Result<Option<Vec<i32>>> {
        loop {
            let Some(line) = self.prompt(text)? else {
                return Ok(None);
            };
            let parsed: Result<Vec<i32>, _> = line.split_whitespace().map(str::parse).collect();
            match parsed {
                Ok(grades) => return Ok(Some(grades)),
                Err(_) => self.show("Invalid input. Grades must be whole numbers.")?,
            }
        }
    }

    /// Walk the user through entering a new record.
    ///
    /// `Ok(None)` means input ended; `Ok(Some(Err(_)))` means the values were
    /// read but do not form a valid record.
    fn read_record(&mut self) -> Result<Option<Result<Record, RecordError>>> {
        let Some(name) = self.prompt("Enter full name and initials: ")? else {
            return Ok(None);
        };
        let Some(group) = self.prompt("Enter group index: ")? else {
            return Ok(None);
        };
        let Some(department) = self.prompt_int("Enter department number: ")? else {
            return Ok(None);
        };
        let Some(category) = self.prompt_value(
            "Enter student category (1: Junior, 2: Senior, 3: Graduate): ",
            |c: &u32| (1..=3).contains(c),
            "Invalid input. Please enter 1, 2, or 3.",
        )?
        else {
            return Ok(None);
        };

        let profile = match Profile::new(name, group, department) {
            Ok(profile) => profile,
            Err(e) => return Ok(Some(Err(e))),
        };

        let record = match category {
            1 => {
                let Some(grades) =
                    self.prompt_grades("Enter up to 5 session grades (space-separated): ")?
                else {
                    return Ok(None);
                };
                Record::junior(profile, grades)
            }
            2 => {
                let Some(grades) =
                    self.prompt_grades("Enter up to 4 session grades (space-separated): ")?
                else {
                    return Ok(None);
                };
                let Some(research) = self.read_research_work()? else {
                    return Ok(None);
                };
                Record::senior(profile, grades, research)
            }
            _ => {
                let Some(diploma) = self.read_diploma_project()? else {
                    return Ok(None);
                };
                Ok(Record::graduate(profile, diploma))
            }
        };

        Ok(Some(record))
    }

    fn read_research_work(&mut self) -> Result<Option<ResearchWork>> {
        let Some(topic) = self.prompt("Enter research work topic: ")? else {
            return Ok(None);
        };
        let Some(place) = self.prompt("Enter research work place: ")? else {
            return Ok(None);
        };
        let Some(supervisor_grade) = self.prompt_int("Enter supervisor grade: ")? else {
            return Ok(None);
        };
        let Some(commission_grade) = self.prompt_int("Enter commission grade: ")? else {
            return Ok(None);
        };
        Ok(Some(ResearchWork {
            topic,
            place,
            supervisor_grade,
            commission_grade,
        }))
    }

    fn read_diploma_project(&mut self) -> Result<Option<DiplomaProject>> {
        let Some(topic) = self.prompt("Enter diploma project topic: ")? else {
            return Ok(None);
        };
        let Some(place) = self.prompt("Enter diploma project place: ")? else {
            return Ok(None);
        };
        let Some(supervisor_grade) = self.prompt_int("Enter supervisor grade: ")? else {
            return Ok(None);
        };
        let Some(reviewer_grade) = self.prompt_int("Enter reviewer grade: ")? else {
            return Ok(None);
        };
        let Some(state_commission_grade) = self.prompt_int("Enter state commission grade: ")?
        else {
            return Ok(None);
        };
        Ok(Some(DiplomaProject {
            topic,
            place,
            supervisor_grade,
            reviewer_grade,
            state_commission_grade,
        }))
    }
}

/// Run the menu loop until the user exits or input ends.
///
/// Table invariant violations are returned as errors; everything else is
/// reported to the user and the loop continues.
pub fn run_menu<R: BufRead, W: Write>(
    registry: &Registry,
    console: &mut Console<R, W>,
) -> Result<()> {
    loop {
        let Some(choice) = console.prompt(MENU)? else {
            return Ok(());
        };

        let flow = match choice.parse().ok().and_then(MenuChoice::from_number) {
            Some(choice) => {
                debug!("Menu choice: {:?}", choice);
                handle_choice(registry, console, choice)?
            }
            None => {
                console.show("Invalid choice. Please try again.")?;
                Flow::Continue
            }
        };

        if let Flow::Quit = flow {
            return Ok(());
        }
    }
}

fn handle_choice<R: BufRead, W: Write>(
    registry: &Registry,
    console: &mut Console<R, W>,
    choice: MenuChoice,
) -> Result<Flow> {
    match choice {
        MenuChoice::Add => match console.read_record()? {
            None => return Ok(Flow::Quit),
            Some(Err(e)) => console.show(&format!("Error adding student: {}", e))?,
            Some(Ok(record)) => match registry.insert(record) {
                Ok(id) => console.show(&format!("Student added successfully with ID {}.", id))?,
                Err(e @ RegistryError::IdsExhausted) => {
                    console.show(&format!("Error adding student: {}", e))?
                }
                Err(e) => return Err(e.into()),
            },
        },
        MenuChoice::Find => {
            let Some(id) = console.prompt_id()? else {
                return Ok(Flow::Quit);
            };
            match registry.find(id) {
                Some(record) => {
                    console.show(&format!("ID: {}\n{}", id, record.to_string().trim_end()))?
                }
                None => console.show("Student not found.")?,
            }
        }
        MenuChoice::Remove => {
            let Some(id) = console.prompt_id()? else {
                return Ok(Flow::Quit);
            };
            if registry.remove(id) {
                console.show("Student removed successfully.")?;
            } else {
                console.show("Student not found.")?;
            }
        }
        MenuChoice::ShowAll => {
            let mut traversal = registry.traverse();
            if traversal.entries.is_empty() {
                console.show("Registry is empty.")?;
            } else {
                traversal.entries.sort_by_key(|(id, _)| *id);
                console.show(&report::render_record_table(&traversal.entries))?;

                let stats = traversal.stats;
                console.show(&format!(
                    "Table: {} live / {} slots, {} tombstones",
                    stats.live, stats.capacity, stats.tombstones
                ))?;
            }
        }
        MenuChoice::AverageSequential | MenuChoice::AverageParallel => {
            let mode = if choice == MenuChoice::AverageSequential {
                AggregationMode::Sequential
            } else {
                AggregationMode::Parallel
            };
            let aggregation = registry.aggregate_by_group(mode);
            console.show(&report::render_averages(&aggregation))?;
        }
        MenuChoice::ChangeGroup => {
            let Some(id) = console.prompt_id()? else {
                return Ok(Flow::Quit);
            };
            let Some(current) = registry.inspect(id, |record| record.group().to_string()) else {
                console.show("Student not found.")?;
                return Ok(Flow::Continue);
            };
            let prompt = format!("Enter new group index (current: {}): ", current);
            let Some(group) = console.prompt(&prompt)? else {
                return Ok(Flow::Quit);
            };
            // Removed by another session between the two prompts.
            if registry.update_group(id, group) {
                console.show("Group changed successfully.")?;
            } else {
                console.show("Student not found.")?;
            }
        }
        MenuChoice::Exit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn run(registry: &Registry, script: &str) -> String {
        let mut output = Vec::new();
        let mut console = Console::new(Cursor::new(script.as_bytes()), &mut output);
        run_menu(registry, &mut console).unwrap();
        drop(console);
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_add_junior_and_find() {
        let registry = Registry::default();
        let output = run(&registry, "1\nIvanov I.I.\nIU7-21B\n101\n1\n5 4 5\n2\n1\n8\n");

        assert!(output.contains("Student added successfully with ID 1."));
        assert!(output.contains("Name: Ivanov I.I."));
        assert!(output.contains("Session Grades: 5 4 5"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_add_senior_and_graduate() {
        let registry = Registry::default();
        run(
            &registry,
            "1\nSenior S.S.\nG1\n2\n2\n4 4\nTopic\nLab\n5\n5\n\
             1\nGrad G.G.\nG1\n3\n3\nThesis\nUni\n5\n4\n3\n8\n",
        );

        let mut categories: Vec<String> = registry
            .traverse()
            .entries
            .into_iter()
            .map(|(_, r)| r.category().to_string())
            .collect();
        categories.sort();
        assert_eq!(categories, vec!["Graduate", "Senior"]);
    }

    #[test]
    fn test_invalid_record_not_inserted() {
        let registry = Registry::default();
        let output = run(&registry, "1\nPetrov P.P.\nG1\n1\n1\n5 4 5 3 4 5\n8\n");

        assert!(
            output.contains("Error adding student: a Junior student can have at most 5 grades")
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reprompts_on_bad_input() {
        let registry = Registry::default();
        let output = run(&registry, "abc\n9\n1\nName\nG1\nx\n-1\n1\n\n8\n");

        assert!(output.contains("Invalid choice. Please try again."));
        assert!(output.contains("Invalid input. Please enter a whole number."));
        assert!(output.contains("Error adding student: department number cannot be negative"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_and_change_group() {
        let registry = Registry::default();
        let output = run(&registry, "1\nA\nG1\n1\n1\n5\n7\n1\nG2\n3\n42\n3\n1\n8\n");

        assert!(output.contains("Group changed successfully."));
        assert!(output.contains("Student not found."));
        assert!(output.contains("Student removed successfully."));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_group_averages_both_modes() {
        let registry = Registry::default();
        run(&registry, "1\nA\nG1\n1\n1\n5 4 5\n1\nB\nG1\n1\n1\n3 3\n1\nC\nG1\n1\n1\n5 5 5\n");

        let output = run(&registry, "5\n6\n8\n");
        assert_eq!(output.matches("G1").count(), 2);
        assert!(output.contains("4.375"));
    }

    #[test]
    fn test_end_of_input_mid_prompt_exits() {
        let registry = Registry::default();
        let output = run(&registry, "1\nHalf Way\n");
        assert!(output.contains("Enter group index: "));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_show_all() {
        let registry = Registry::default();
        let output = run(&registry, "4\n8\n");
        assert!(output.contains("Registry is empty."));

        run(&registry, "1\nA\nG1\n1\n1\n5\n1\nB\nG2\n1\n1\n4\n3\n1\n");
        let output = run(&registry, "4\n8\n");
        assert!(output.contains("ID: 2"));
        assert!(!output.contains("ID: 1\n"));
        assert!(output.contains("Table: 1 live / 16 slots, 1 tombstones"));
    }

    #[test]
    fn test_add_reports_exhausted_ids() {
        let registry = Registry::default();
        let filler = Record::junior(Profile::new("Max", "G1", 1).unwrap(), vec![]).unwrap();
        registry.insert_with_id(RecordId::MAX, filler).unwrap();

        let output = run(&registry, "1\nA\nG1\n1\n1\n5\n8\n");
        assert!(output.contains("Error adding student: no unused record ids left"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_change_group_unknown_id() {
        let registry = Registry::default();
        let output = run(&registry, "7\n99\n8\n");
        assert!(output.contains("Student not found."));
        assert!(!output.contains("Enter new group index"));
    }
}
