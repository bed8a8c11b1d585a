use crate::item::{Item, Vault};
use crate::pass_cli::CliError;
use log::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRow {
    pub vault: String,
    pub title: String,
    pub identity: String,
    pub kind: String,
}

impl SearchRow {
    fn new(vault: &Vault, item: &Item) -> SearchRow {
        let title = if item.title.is_empty() {
            "Untitled".to_string()
        } else {
            item.title.clone()
        };
        SearchRow {
            vault: vault.name.clone(),
            title,
            identity: item.identity().to_string(),
            kind: item.kind.clone(),
        }
    }

    pub fn cells(&self) -> Vec<String> {
        vec![
            self.vault.clone(),
            self.title.clone(),
            self.identity.clone(),
            self.kind.clone(),
        ]
    }
}

/// Case-insensitive substring match on title, username, email, url and note.
/// The empty query matches everything.
pub fn matches(item: &Item, query: &str) -> bool {
    let query = query.to_lowercase();
    let login = item.login.as_ref();

    let fields = [
        Some(&item.title),
        login.and_then(|l| l.username.as_ref()),
        login.and_then(|l| l.email.as_ref()),
        login.and_then(|l| l.url.as_ref()),
        item.note.as_ref(),
    ];

    fields
        .iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&query))
}

/// Scans every vault in order. A vault whose items can't be listed is
/// skipped, the rest of the scan goes on.
pub fn search<F>(vaults: &[Vault], query: &str, mut list_items: F) -> Vec<SearchRow>
where
    F: FnMut(&Vault) -> Result<Vec<Item>, CliError>,
{
    let mut rows = vec![];
    for vault in vaults {
        let items = match list_items(vault) {
            Ok(items) => items,
            Err(err) => {
                warn!("search: skipping vault {}: {}", vault.name, err);
                continue;
            }
        };
        rows.extend(
            items
                .iter()
                .filter(|item| matches(item, query))
                .map(|item| SearchRow::new(vault, item)),
        );
    }
    rows
}
