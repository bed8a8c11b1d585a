//! The session as an explicit state machine.
//!
//! `App` performs the I/O for the current `Screen` and reports what happened
//! as an `Action`; `transition` alone decides where that leads.

use crate::item::{Item, Vault};
use log::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    LoggedOut,
    MainMenu,
    VaultList,
    VaultItems(VaultView),
    /// Remembers the view it was opened from so it can go back there.
    CreateLogin(VaultView),
    Search,
    GeneratePassword,
    UserInfo,
    Logout,
    Exit,
}

/// One open vault. Lives only as long as the items screen does, so the
/// password toggle starts hidden on every visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultView {
    pub vault: Vault,
    pub show_passwords: bool,
    /// `None` until fetched.
    pub items: Option<Vec<Item>>,
}

impl VaultView {
    pub fn new(vault: Vault) -> VaultView {
        VaultView {
            vault,
            show_passwords: false,
            items: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    LoggedIn,
    LoginFailed,
    OpenVaults,
    ShowUserInfo,
    GeneratePassword,
    Search,
    Logout,
    OpenVault(Vault),
    Loaded(Vec<Item>),
    TogglePasswords,
    CreateLogin,
    LoggedOut,
    /// Done with the current screen, or "back" was picked.
    Back,
    Exit,
}

/// Standalone commands run one screen and stop where the menu would
/// otherwise come back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Interactive,
    Standalone,
}

impl Flow {
    fn home(self) -> Screen {
        match self {
            Flow::Interactive => Screen::MainMenu,
            Flow::Standalone => Screen::Exit,
        }
    }
}

impl Screen {
    pub fn title(&self) -> String {
        match self {
            Screen::LoggedOut | Screen::MainMenu | Screen::Exit => "Pass TUI: Home".to_string(),
            Screen::VaultList => "Pass TUI: Vaults".to_string(),
            Screen::VaultItems(view) => format!("Pass TUI: Vaults > {}", view.vault.name),
            Screen::CreateLogin(view) => {
                format!("Pass TUI: Vaults > {} > New Login", view.vault.name)
            }
            Screen::Search => "Pass TUI: Search".to_string(),
            Screen::GeneratePassword => "Pass TUI: Generate Password".to_string(),
            Screen::UserInfo => "Pass TUI: User Info".to_string(),
            Screen::Logout => "Pass TUI: Logout".to_string(),
        }
    }
}

pub fn transition(flow: Flow, screen: Screen, action: Action) -> Screen {
    match (screen, action) {
        (_, Action::Exit) => Screen::Exit,

        (Screen::LoggedOut, Action::LoggedIn) => Screen::MainMenu,
        (Screen::LoggedOut, Action::LoginFailed) => Screen::LoggedOut,

        (Screen::MainMenu, Action::OpenVaults) => Screen::VaultList,
        (Screen::MainMenu, Action::ShowUserInfo) => Screen::UserInfo,
        (Screen::MainMenu, Action::GeneratePassword) => Screen::GeneratePassword,
        (Screen::MainMenu, Action::Search) => Screen::Search,
        (Screen::MainMenu, Action::Logout) => Screen::Logout,

        (Screen::VaultList, Action::OpenVault(vault)) => Screen::VaultItems(VaultView::new(vault)),
        (Screen::VaultList, Action::Back) => flow.home(),

        (Screen::VaultItems(view), Action::Loaded(items)) => Screen::VaultItems(VaultView {
            items: Some(items),
            ..view
        }),
        (Screen::VaultItems(view), Action::TogglePasswords) => Screen::VaultItems(VaultView {
            show_passwords: !view.show_passwords,
            ..view
        }),
        (Screen::VaultItems(view), Action::CreateLogin) => Screen::CreateLogin(view),
        (Screen::VaultItems(_), Action::Back) => Screen::VaultList,

        // Coming back from a create means the vault may have a new item.
        (Screen::CreateLogin(view), Action::Back) => {
            Screen::VaultItems(VaultView { items: None, ..view })
        }

        (Screen::Search, Action::Back)
        | (Screen::GeneratePassword, Action::Back)
        | (Screen::UserInfo, Action::Back)
        | (Screen::Logout, Action::Back) => flow.home(),

        (Screen::Logout, Action::LoggedOut) => match flow {
            Flow::Interactive => Screen::LoggedOut,
            Flow::Standalone => Screen::Exit,
        },

        (screen, action) => {
            debug!("ignoring {:?} on {:?}", action, screen);
            screen
        }
    }
}
