//! `Ui` on a plain terminal via `console`.
//!
//! Answers are read line by line from stdin so the tool also works with
//! piped input; a closed stdin cancels whatever was being asked.

use crate::prompt::{Input, Menu, Selection, Tone, Ui};
use anyhow::Result;
use console::{style, Style, Term};
use log::debug;
use std::io::{self, BufRead};
use std::thread;
use std::time::Duration;
use unicode_width::UnicodeWidthStr;

const BRAND: &str = "Pass-TUI";

pub struct TerminalUi {
    term: Term,
}

impl TerminalUi {
    pub fn new() -> TerminalUi {
        TerminalUi {
            term: Term::stdout(),
        }
    }

    fn read_line(&self) -> Result<Option<String>> {
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
    }

    fn ask(&self, prompt: &str) -> Result<Option<String>> {
        self.term.write_str(&format!("{} ", style(prompt).cyan().bold()))?;
        self.term.flush()?;
        self.read_line()
    }

    fn complain(&self, text: &str) -> Result<()> {
        self.term.write_line(&style(text).red().to_string())?;
        Ok(())
    }
}

impl Default for TerminalUi {
    fn default() -> Self {
        TerminalUi::new()
    }
}

impl Ui for TerminalUi {
    fn clear(&mut self) -> Result<()> {
        if self.term.is_term() {
            self.term.clear_screen()?;
        }
        Ok(())
    }

    fn header(&mut self, title: &str) -> Result<()> {
        let width = self.term.size().1 as usize;
        let left = format!(" 🔒 {}", title);
        let right = format!("{} ", BRAND);
        let gap = width.saturating_sub(left.width() + right.width()).max(1);

        let bar = Style::new().white().on_blue().bold();
        self.term
            .write_line(&bar.apply_to(format!("{}{}{}", left, " ".repeat(gap), right)).to_string())?;
        self.term
            .write_line(&style("▔".repeat(width.max(1))).blue().to_string())?;
        Ok(())
    }

    fn notice(&mut self, tone: Tone, text: &str) -> Result<()> {
        let line = match tone {
            Tone::Info => style(text.to_string()).cyan(),
            Tone::Success => style(text.to_string()).green().bold(),
            Tone::Warning => style(format!("⚠️  {}", text)).yellow(),
            Tone::Error => style(text.to_string()).red().bold(),
            Tone::Muted => style(text.to_string()).dim(),
        };
        self.term.write_line(&format!("  {}", line))?;
        Ok(())
    }

    fn table(&mut self, headers: &[&str], rows: &[Vec<String>]) -> Result<()> {
        for line in format_table(headers, rows) {
            self.term.write_line(&line)?;
        }
        Ok(())
    }

    fn highlight(&mut self, caption: &str, value: &str) -> Result<()> {
        self.term.write_line("")?;
        self.term.write_line(&format!("  {}", style(caption).dim()))?;
        self.term
            .write_line(&format!("  {}", style(value).green().bold()))?;
        self.term.write_line("")?;
        Ok(())
    }

    fn select(&mut self, menu: &Menu) -> Result<Selection> {
        if let Some(msg) = &menu.message {
            self.term
                .write_line(&style(msg).magenta().bold().to_string())?;
        }
        if !menu.prompt.is_empty() {
            self.term.write_line(&style(&menu.prompt).bold().to_string())?;
        }
        for (idx, (_, label)) in menu.options.iter().enumerate() {
            self.term
                .write_line(&format!("  {} {}", style(format!("{:>2})", idx + 1)).dim(), label))?;
        }

        loop {
            let answer = match self.ask("›")? {
                Some(answer) => answer,
                None => return Ok(Selection::Cancel),
            };
            if let Some(key) = pick(menu, answer.trim()) {
                return Ok(Selection::Entry(key));
            }
            self.complain(&format!(
                "Pick a number between 1 and {}.",
                menu.options.len()
            ))?;
        }
    }

    fn text(&mut self, input: &Input) -> Result<Option<String>> {
        let prompt = match &input.default {
            Some(default) => format!("{} [{}]:", input.label, default),
            None => format!("{}:", input.label),
        };

        loop {
            let answer = match self.ask(&prompt)? {
                Some(answer) => answer,
                None => return Ok(None),
            };
            if answer.trim().is_empty() {
                if let Some(default) = &input.default {
                    return Ok(Some(default.clone()));
                }
                if input.required {
                    self.complain("Required.")?;
                    continue;
                }
            }
            return Ok(Some(answer));
        }
    }

    fn password(&mut self, label: &str) -> Result<Option<String>> {
        if !self.term.is_term() {
            return self.ask(&format!("{}:", label));
        }
        self.term
            .write_str(&format!("{} ", style(format!("{}:", label)).cyan().bold()))?;
        self.term.flush()?;
        Ok(Some(self.term.read_secure_line()?))
    }

    fn confirm(&mut self, label: &str, default: bool) -> Result<bool> {
        let hint = if default { "(Y/n)" } else { "(y/N)" };
        loop {
            let answer = match self.ask(&format!("{} {}", label, hint))? {
                Some(answer) => answer,
                None => return Ok(default),
            };
            match parse_yes_no(&answer) {
                Some(yes) => return Ok(yes),
                None if answer.trim().is_empty() => return Ok(default),
                None => self.complain("Please answer yes or no.")?,
            }
        }
    }

    fn spin<T, F>(&mut self, message: &str, work: F) -> T
    where
        F: FnOnce() -> T,
    {
        let shown = self
            .term
            .write_line(&format!("  {} {}", style("⠿").cyan(), style(message).dim()))
            .map_err(|err| debug!("spinner: {}", err))
            .is_ok();

        let res = work();

        if shown && self.term.is_term() {
            if let Err(err) = self.term.clear_last_lines(1) {
                debug!("spinner: {}", err);
            }
        }
        res
    }

    fn pause(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Accepts the 1-based position or the option key itself.
fn pick(menu: &Menu, answer: &str) -> Option<String> {
    if let Ok(n) = answer.parse::<usize>() {
        return menu
            .options
            .get(n.checked_sub(1)?)
            .map(|(key, _)| key.clone());
    }
    menu.options
        .iter()
        .find(|(key, _)| key == answer)
        .map(|(key, _)| key.clone())
}

fn parse_yes_no(answer: &str) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

pub fn format_table(headers: &[&str], rows: &[Vec<String>]) -> Vec<String> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.width()).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(widths.len()) {
            widths[idx] = widths[idx].max(cell.width());
        }
    }

    let rule = |left: &str, mid: &str, right: &str| {
        let parts: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
        format!("{}{}{}", left, parts.join(mid), right)
    };
    let line = |cells: Vec<&str>| {
        let parts: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(idx, w)| {
                let cell = cells.get(idx).copied().unwrap_or("");
                format!(" {}{} ", cell, " ".repeat(w - cell.width().min(*w)))
            })
            .collect();
        format!("│{}│", parts.join("│"))
    };

    let mut out = vec![rule("┌", "┬", "┐"), line(headers.to_vec()), rule("├", "┼", "┤")];
    for row in rows {
        out.push(line(row.iter().map(String::as_str).collect()));
    }
    out.push(rule("└", "┴", "┘"));
    out
}
