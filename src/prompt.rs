//! Presentation seam: menus, text input and rendered blocks.
//!
//! `App` only talks to a `Ui`; `terminal::TerminalUi` is the real one.

use anyhow::Result;
use std::time::Duration;

pub struct Menu {
    pub prompt: String,
    pub message: Option<String>,
    pub options: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Entry(String),
    /// Input closed before anything was picked.
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Success,
    Warning,
    Error,
    Muted,
}

impl Menu {
    pub fn new(prompt: &str) -> Menu {
        Menu {
            prompt: prompt.to_string(),
            message: None,
            options: vec![],
        }
    }

    pub fn message(mut self, msg: &str) -> Self {
        self.message = Some(msg.to_string());
        self
    }

    pub fn option(mut self, key: &str, label: &str) -> Self {
        self.options.push((key.to_string(), label.to_string()));
        self
    }

    pub fn options<I>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.options.extend(options);
        self
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, label)| label.as_str())
    }

    /// The single "Go Back" menu shown under notices and tables.
    pub fn back() -> Menu {
        Menu::new("Action").option("back", "⬅️  Go Back")
    }
}

impl Selection {
    pub fn key(&self) -> Option<&str> {
        match self {
            Selection::Entry(key) => Some(key),
            Selection::Cancel => None,
        }
    }
}

pub struct Input {
    pub label: String,
    pub default: Option<String>,
    pub required: bool,
}

impl Input {
    pub fn new(label: &str) -> Input {
        Input {
            label: label.to_string(),
            default: None,
            required: false,
        }
    }

    pub fn default(mut self, value: &str) -> Self {
        self.default = Some(value.to_string());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

pub trait Ui {
    fn clear(&mut self) -> Result<()>;
    fn header(&mut self, title: &str) -> Result<()>;
    fn notice(&mut self, tone: Tone, text: &str) -> Result<()>;
    fn table(&mut self, headers: &[&str], rows: &[Vec<String>]) -> Result<()>;
    /// A single value shown large, e.g. a freshly generated password.
    fn highlight(&mut self, caption: &str, value: &str) -> Result<()>;

    fn select(&mut self, menu: &Menu) -> Result<Selection>;
    /// `None` when input is closed.
    fn text(&mut self, input: &Input) -> Result<Option<String>>;
    fn password(&mut self, label: &str) -> Result<Option<String>>;
    fn confirm(&mut self, label: &str, default: bool) -> Result<bool>;

    /// Shows `message` for as long as `work` blocks.
    fn spin<T, F>(&mut self, message: &str, work: F) -> T
    where
        F: FnOnce() -> T;
    fn pause(&mut self, duration: Duration);
}

#[cfg(test)]
pub mod scripted {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Answer {
        Pick(String),
        Cancel,
        Text(Option<String>),
        Confirm(bool),
    }

    /// Answers prompts from a queue and keeps a log of what was drawn.
    #[derive(Default)]
    pub struct ScriptedUi {
        answers: VecDeque<Answer>,
        pub log: Vec<String>,
        pub tables: Vec<Vec<Vec<String>>>,
    }

    impl ScriptedUi {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn pick(mut self, key: &str) -> Self {
            self.answers.push_back(Answer::Pick(key.to_string()));
            self
        }

        pub fn cancel(mut self) -> Self {
            self.answers.push_back(Answer::Cancel);
            self
        }

        pub fn type_in(mut self, text: &str) -> Self {
            self.answers.push_back(Answer::Text(Some(text.to_string())));
            self
        }

        pub fn confirm_with(mut self, yes: bool) -> Self {
            self.answers.push_back(Answer::Confirm(yes));
            self
        }

        pub fn remaining(&self) -> usize {
            self.answers.len()
        }

        pub fn saw(&self, needle: &str) -> bool {
            self.log.iter().any(|line| line.contains(needle))
        }

        fn next(&mut self, what: &str) -> Answer {
            self.answers
                .pop_front()
                .unwrap_or_else(|| panic!("no scripted answer for {}", what))
        }
    }

    impl Ui for ScriptedUi {
        fn clear(&mut self) -> Result<()> {
            self.log.push("clear".to_string());
            Ok(())
        }

        fn header(&mut self, title: &str) -> Result<()> {
            self.log.push(format!("header: {}", title));
            Ok(())
        }

        fn notice(&mut self, tone: Tone, text: &str) -> Result<()> {
            self.log.push(format!("{:?}: {}", tone, text));
            Ok(())
        }

        fn table(&mut self, headers: &[&str], rows: &[Vec<String>]) -> Result<()> {
            self.log.push(format!("table: {}", headers.join("|")));
            self.tables.push(rows.to_vec());
            Ok(())
        }

        fn highlight(&mut self, caption: &str, value: &str) -> Result<()> {
            self.log.push(format!("{}: {}", caption, value));
            Ok(())
        }

        fn select(&mut self, menu: &Menu) -> Result<Selection> {
            self.log.push(format!("select: {}", menu.prompt));
            match self.next(&menu.prompt) {
                Answer::Pick(key) => {
                    assert!(
                        menu.label(&key).is_some(),
                        "{} is not offered by {:?}: {:?}",
                        key,
                        menu.prompt,
                        menu.options
                    );
                    Ok(Selection::Entry(key))
                }
                Answer::Cancel => Ok(Selection::Cancel),
                other => panic!("{:?} given to menu {}", other, menu.prompt),
            }
        }

        fn text(&mut self, input: &Input) -> Result<Option<String>> {
            self.log.push(format!("text: {}", input.label));
            match self.next(&input.label) {
                Answer::Text(Some(t)) if t.is_empty() => Ok(input.default.clone().or(Some(t))),
                Answer::Text(t) => Ok(t),
                Answer::Cancel => Ok(None),
                other => panic!("{:?} given to input {}", other, input.label),
            }
        }

        fn password(&mut self, label: &str) -> Result<Option<String>> {
            self.log.push(format!("password: {}", label));
            match self.next(label) {
                Answer::Text(t) => Ok(t),
                Answer::Cancel => Ok(None),
                other => panic!("{:?} given to password {}", other, label),
            }
        }

        fn confirm(&mut self, label: &str, _default: bool) -> Result<bool> {
            self.log.push(format!("confirm: {}", label));
            match self.next(label) {
                Answer::Confirm(yes) => Ok(yes),
                other => panic!("{:?} given to confirm {}", other, label),
            }
        }

        fn spin<T, F>(&mut self, message: &str, work: F) -> T
        where
            F: FnOnce() -> T,
        {
            self.log.push(format!("spin: {}", message));
            work()
        }

        fn pause(&mut self, _duration: Duration) {
            self.log.push("pause".to_string());
        }
    }
}
