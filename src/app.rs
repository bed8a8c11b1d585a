use crate::item::{
    Item, NewLogin, PasswordPolicy, UserInfo, DEFAULT_LENGTH, DEFAULT_SEPARATOR, DEFAULT_WORDS,
};
use crate::pass_cli::PassCli;
use crate::process::Runner;
use crate::prompt::{Input, Menu, Tone, Ui};
use crate::screen::{transition, Action, Flow, Screen, VaultView};
use crate::search::search;
use anyhow::Result;
use log::{debug, info, warn};
use serde_json::Value;
use std::time::Duration;

const SHORT_PAUSE: Duration = Duration::from_secs(1);
const HIDDEN: &str = "********";
/// Keeps vault ids apart from the fixed menu keys.
const VAULT_KEY: &str = "vault:";

pub struct App<R, U> {
    cli: PassCli<R>,
    ui: U,
    flow: Flow,
    notice_pause: Duration,
}

impl<R: Runner, U: Ui> App<R, U> {
    pub fn new(cli: PassCli<R>, ui: U, flow: Flow) -> App<R, U> {
        App {
            cli,
            ui,
            flow,
            notice_pause: Duration::from_secs(3),
        }
    }

    pub fn notice_pause(mut self, pause: Duration) -> Self {
        self.notice_pause = pause;
        self
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    pub fn cli(&self) -> &PassCli<R> {
        &self.cli
    }

    /// Interactive session: one login check, then the menu loop.
    pub fn launch(&mut self) -> Result<()> {
        let cli = &self.cli;
        let logged_in = self.ui.spin("Checking session...", || cli.is_logged_in());
        let start = if logged_in {
            Screen::MainMenu
        } else {
            Screen::LoggedOut
        };
        self.run(start)
    }

    /// Runs a single screen behind the login gate. `false` means the user
    /// never got past the gate.
    pub fn open(&mut self, screen: Screen) -> Result<bool> {
        let passed = match screen {
            Screen::Logout => self.require_session()?,
            _ => self.ensure_logged_in(&screen.title())?,
        };
        if passed {
            self.run(screen)?;
        }
        Ok(passed)
    }

    pub fn run(&mut self, mut screen: Screen) -> Result<()> {
        while screen != Screen::Exit {
            let action = self.step(&screen)?;
            debug!("{:?} -> {:?}", screen, action);
            screen = transition(self.flow, screen, action);
        }
        Ok(())
    }

    fn step(&mut self, screen: &Screen) -> Result<Action> {
        match screen {
            Screen::LoggedOut => self.logged_out(),
            Screen::MainMenu => self.main_menu(),
            Screen::VaultList => self.vault_list(),
            Screen::VaultItems(view) => self.vault_items(view),
            Screen::CreateLogin(view) => self.create_login(view),
            Screen::Search => self.search(),
            Screen::GeneratePassword => self.generate_password(),
            Screen::UserInfo => self.user_info(),
            Screen::Logout => self.logout(),
            Screen::Exit => Ok(Action::Exit),
        }
    }

    fn draw(&mut self, screen: &Screen) -> Result<()> {
        self.ui.clear()?;
        self.ui.header(&screen.title())
    }

    fn back(&mut self) -> Result<Action> {
        self.ui.select(&Menu::back())?;
        Ok(Action::Back)
    }

    fn goodbye(&mut self) -> Result<Action> {
        self.ui.notice(Tone::Muted, "Goodbye!")?;
        Ok(Action::Exit)
    }

    fn ensure_logged_in(&mut self, title: &str) -> Result<bool> {
        let cli = &self.cli;
        if self.ui.spin("Checking session...", || cli.is_logged_in()) {
            return Ok(true);
        }

        self.ui.clear()?;
        self.ui.header(title)?;
        self.ui
            .notice(Tone::Warning, "You are not logged in to Proton Pass CLI.")?;
        let choice = self.ui.select(
            &Menu::new("Action")
                .option("login", "Log In")
                .option("exit", "Exit"),
        )?;

        if choice.key() != Some("login") || !self.run_login()? {
            return Ok(false);
        }
        let cli = &self.cli;
        Ok(self.ui.spin("Checking session...", || cli.is_logged_in()))
    }

    fn require_session(&mut self) -> Result<bool> {
        let cli = &self.cli;
        if self.ui.spin("Checking session...", || cli.is_logged_in()) {
            return Ok(true);
        }

        self.draw(&Screen::Logout)?;
        self.ui.notice(Tone::Warning, "You are not logged in.")?;
        self.back()?;
        Ok(false)
    }

    fn run_login(&mut self) -> Result<bool> {
        self.ui.clear()?;
        self.ui.header("Pass TUI: Login")?;
        self.ui.notice(
            Tone::Muted,
            "Launching interactive Proton Pass CLI login flow...",
        )?;

        // The external tool owns the terminal until it exits.
        if let Err(err) = self.cli.login() {
            info!("login failed: {}", err);
            self.ui.notice(Tone::Error, "Login failed or was cancelled.")?;
            self.back()?;
            return Ok(false);
        }

        self.ui.notice(Tone::Success, "Login complete. Returning...")?;
        self.ui.pause(SHORT_PAUSE);
        Ok(true)
    }

    fn logged_out(&mut self) -> Result<Action> {
        self.draw(&Screen::LoggedOut)?;
        self.ui
            .notice(Tone::Warning, "You are not logged in to Proton Pass CLI.")?;

        let choice = self.ui.select(
            &Menu::new("Action")
                .option("login", "Log In")
                .option("exit", "Exit"),
        )?;

        match choice.key() {
            Some("login") if self.run_login()? => Ok(Action::LoggedIn),
            Some("login") => Ok(Action::LoginFailed),
            _ => self.goodbye(),
        }
    }

    fn main_menu(&mut self) -> Result<Action> {
        self.draw(&Screen::MainMenu)?;

        let choice = self.ui.select(
            &Menu::new("What would you like to do?")
                .option("vaults", "List Vaults")
                .option("user", "Show User Info")
                .option("password", "Generate Password")
                .option("search", "Search")
                .option("logout", "Log Out")
                .option("exit", "Exit Pass TUI"),
        )?;

        Ok(match choice.key() {
            Some("vaults") => Action::OpenVaults,
            Some("user") => Action::ShowUserInfo,
            Some("password") => Action::GeneratePassword,
            Some("search") => Action::Search,
            Some("logout") => Action::Logout,
            _ => return self.goodbye(),
        })
    }

    fn vault_list(&mut self) -> Result<Action> {
        self.draw(&Screen::VaultList)?;

        let cli = &self.cli;
        let vaults = match self.ui.spin("Connecting to Proton...", || cli.list_vaults()) {
            Ok(vaults) => vaults,
            Err(err) => {
                self.ui.notice(Tone::Error, &format!("Error: {}", err))?;
                return self.back();
            }
        };

        if vaults.is_empty() {
            self.ui.notice(Tone::Warning, "No vaults found.")?;
            return self.back();
        }

        let menu = Menu::new("Vaults")
            .message("Select a vault to open:")
            .options(vaults.iter().map(|v| (vault_key(&v.id), v.name.clone())))
            .option("back", "Back to Home");

        let choice = self.ui.select(&menu)?;
        match choice
            .key()
            .and_then(|key| key.strip_prefix(VAULT_KEY))
            .and_then(|id| vaults.iter().find(|v| v.id == id))
        {
            Some(vault) => Ok(Action::OpenVault(vault.clone())),
            None => Ok(Action::Back),
        }
    }

    fn vault_items(&mut self, view: &VaultView) -> Result<Action> {
        let screen = Screen::VaultItems(view.clone());
        self.draw(&screen)?;

        let items = match &view.items {
            Some(items) => items,
            None => {
                let cli = &self.cli;
                let name = &view.vault.name;
                let items = match self.ui.spin("Fetching items...", || cli.list_items(name)) {
                    Ok(items) => items,
                    Err(err) => {
                        warn!("listing items of {} failed: {}", name, err);
                        vec![]
                    }
                };
                return Ok(Action::Loaded(items));
            }
        };

        if items.is_empty() {
            self.ui.notice(Tone::Warning, "This vault is empty.")?;
            return self.back();
        }

        self.ui.table(
            &["Title", "Username", "Password", "2FA"],
            &item_rows(items, view.show_passwords),
        )?;

        let toggle = if view.show_passwords {
            "Hide Passwords"
        } else {
            "Reveal Passwords"
        };
        let choice = self.ui.select(
            &Menu::new("Actions")
                .option("show", toggle)
                .option("create", "Create New Login")
                .option("back", "Back to Vaults"),
        )?;

        Ok(match choice.key() {
            Some("show") => Action::TogglePasswords,
            Some("create") => Action::CreateLogin,
            _ => Action::Back,
        })
    }

    fn create_login(&mut self, view: &VaultView) -> Result<Action> {
        let vault_name = view.vault.name.trim().to_string();
        if vault_name.is_empty() {
            self.ui.clear()?;
            self.ui.notice(Tone::Warning, "There has been an error.")?;
            return self.back();
        }

        self.draw(&Screen::CreateLogin(view.clone()))?;
        self.ui.notice(
            Tone::Info,
            &format!("Create a new login in this vault ({}).", vault_name),
        )?;

        let title = match self.ui.text(&Input::new("Title").required())? {
            Some(title) => title,
            None => return Ok(Action::Back),
        };
        let username = self.ui.text(&Input::new("Username (optional)"))?;
        let email = self.ui.text(&Input::new("Email (optional)"))?;
        let password = self.ui.password("Password")?;
        let url = self.ui.text(&Input::new("URL (optional)"))?;

        if !self.ui.confirm("Generate login?", false)? {
            return Ok(Action::Back);
        }

        let req = NewLogin {
            vault_name: vault_name.clone(),
            title,
            username: filled(username),
            email: filled(email),
            password: filled(password),
            url: filled(url),
        };

        let cli = &self.cli;
        match self.ui.spin("Generating login...", || cli.create_login(&req)) {
            Ok(()) => self.ui.notice(
                Tone::Success,
                &format!(
                    "Login created successfully! Redirecting back to {}.",
                    vault_name
                ),
            )?,
            Err(err) => self.ui.notice(
                Tone::Error,
                &format!(
                    "Error creating login: {}. Redirecting back to {}.",
                    err, vault_name
                ),
            )?,
        }

        self.ui.pause(self.notice_pause);
        Ok(Action::Back)
    }

    fn search(&mut self) -> Result<Action> {
        self.draw(&Screen::Search)?;

        let query = match self.ui.text(&Input::new("Search term").required())? {
            Some(query) => query,
            None => return Ok(Action::Back),
        };

        let cli = &self.cli;
        let vaults = match self.ui.spin("Loading vaults...", || cli.list_vaults()) {
            Ok(vaults) => vaults,
            Err(err) => {
                self.ui.notice(Tone::Error, &format!("Error: {}", err))?;
                return self.back();
            }
        };

        let rows = self.ui.spin("Searching items...", || {
            search(&vaults, &query, |vault| cli.list_items(&vault.name))
        });

        if rows.is_empty() {
            self.ui.notice(Tone::Warning, "No matches found.")?;
            return self.back();
        }

        let cells: Vec<Vec<String>> = rows.iter().map(|row| row.cells()).collect();
        self.ui
            .table(&["Vault", "Title", "Username/Email", "Type"], &cells)?;
        self.back()
    }

    fn generate_password(&mut self) -> Result<Action> {
        self.draw(&Screen::GeneratePassword)?;

        let choice = self.ui.select(
            &Menu::new("Type")
                .option("random", "Random Password")
                .option("passphrase", "Passphrase")
                .option("back", "Back"),
        )?;

        let policy = match choice.key() {
            Some("random") => self.random_policy()?,
            Some("passphrase") => self.passphrase_policy()?,
            _ => None,
        };
        let policy = match policy {
            Some(policy) => policy,
            None => return Ok(Action::Back),
        };

        let cli = &self.cli;
        let password = match self.ui.spin("Generating password...", || {
            cli.generate_password(&policy)
        }) {
            Ok(password) => password,
            Err(err) => {
                self.ui.notice(
                    Tone::Error,
                    &format!("Password generation failed: {}", err),
                )?;
                return self.back();
            }
        };

        self.ui.highlight("Generated Password", &password)?;

        match self.ui.spin("Scoring password...", || cli.score_password(&password)) {
            Ok(score) => {
                let tone = if score.is_strong() {
                    Tone::Success
                } else {
                    Tone::Error
                };
                self.ui.notice(tone, &format!("Strength: {}", score.label))?;
            }
            Err(err) => debug!("scoring failed: {}", err),
        }

        self.back()
    }

    fn random_policy(&mut self) -> Result<Option<PasswordPolicy>> {
        let length = match self.ui.text(&Input::new("Length").default(&DEFAULT_LENGTH.to_string()))? {
            Some(length) => number_or(&length, DEFAULT_LENGTH),
            None => return Ok(None),
        };
        let numbers = self.ui.confirm("Include numbers?", true)?;
        let symbols = self.ui.confirm("Include symbols?", true)?;
        let uppercase = self.ui.confirm("Include uppercase?", true)?;

        Ok(Some(PasswordPolicy::Random {
            length,
            numbers,
            symbols,
            uppercase,
        }))
    }

    fn passphrase_policy(&mut self) -> Result<Option<PasswordPolicy>> {
        let word_count = match self.ui.text(&Input::new("Words").default(&DEFAULT_WORDS.to_string()))? {
            Some(count) => number_or(&count, DEFAULT_WORDS),
            None => return Ok(None),
        };
        let separator = match self.ui.text(&Input::new("Separator").default(DEFAULT_SEPARATOR))? {
            Some(separator) => separator,
            None => return Ok(None),
        };
        let capitalize = self.ui.confirm("Capitalize words?", false)?;
        let numbers = self.ui.confirm("Include numbers?", false)?;

        Ok(Some(PasswordPolicy::Passphrase {
            word_count,
            separator,
            capitalize,
            numbers,
        }))
    }

    fn user_info(&mut self) -> Result<Action> {
        self.draw(&Screen::UserInfo)?;

        let cli = &self.cli;
        match self.ui.spin("Fetching user info...", || cli.user_info()) {
            Ok(info) => self.ui.table(&["Field", "Value"], &user_info_rows(&info))?,
            Err(err) => self.ui.notice(Tone::Error, &format!("Error: {}", err))?,
        }
        self.back()
    }

    fn logout(&mut self) -> Result<Action> {
        self.draw(&Screen::Logout)?;

        if !self.ui.confirm("Log out of Proton Pass CLI?", false)? {
            return Ok(Action::Back);
        }

        let cli = &self.cli;
        if let Err(err) = self.ui.spin("Logging out...", || cli.logout()) {
            self.ui
                .notice(Tone::Error, &format!("Logout failed: {}", err))?;
            return self.back();
        }

        self.ui.notice(Tone::Success, "Logged out successfully.")?;
        self.ui.pause(SHORT_PAUSE);
        Ok(Action::LoggedOut)
    }
}

fn vault_key(id: &str) -> String {
    format!("{}{}", VAULT_KEY, id)
}

/// Title, identity, password (masked unless `show_passwords`), 2FA.
pub fn item_rows(items: &[Item], show_passwords: bool) -> Vec<Vec<String>> {
    items
        .iter()
        .map(|item| {
            let password = if show_passwords {
                item.password().unwrap_or("N/A")
            } else {
                HIDDEN
            };
            vec![
                item.title.clone(),
                item.identity().to_string(),
                password.to_string(),
                if item.has_totp() { "Yes" } else { "No" }.to_string(),
            ]
        })
        .collect()
}

/// Scalars as text, nested values as compact JSON.
pub fn user_info_rows(info: &UserInfo) -> Vec<Vec<String>> {
    info.iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            vec![key.clone(), value]
        })
        .collect()
}

fn filled(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn number_or(input: &str, default: u32) -> u32 {
    input.trim().parse().unwrap_or(default)
}
