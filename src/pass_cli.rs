//! Typed access to the `pass-cli` executable.
//!
//! Every operation builds a discrete argv (nothing goes through a shell), runs
//! it through a `Runner` and classifies the result:
//!
//! * non-zero exit: `CliError::CommandFailed` carrying stderr
//! * exit 0 but undecodable stdout: `CliError::MalformedOutput` carrying stdout
//! * budget exceeded: `CliError::Timeout`
//!
//! List endpoints accept both `{"vaults": [...]}` and a bare `[...]`.

use crate::item::{Item, Login, NewLogin, PasswordPolicy, PasswordScore, UserInfo, Vault};
use crate::process::{Limit, Output, ProcessError, Runner};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("{stderr}")]
    CommandFailed { stderr: String },
    #[error("unexpected output from pass-cli: {raw}")]
    MalformedOutput { raw: String },
    #[error("pass-cli did not answer within {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unavailable(String),
}

impl From<ProcessError> for CliError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Timeout(after) => CliError::Timeout(after),
            other => CliError::Unavailable(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// info, logout, user info, generate, score
    pub control: Duration,
    /// vault list, item list, create
    pub bulk: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            control: Duration::from_secs(20),
            bulk: Duration::from_secs(60),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct RawVault {
    vault_id: Option<String>,
    id: Option<String>,
    name: Option<String>,
}

impl RawVault {
    fn into_vault(self) -> Option<Vault> {
        let id = non_blank(self.vault_id).or_else(|| non_blank(self.id));
        match (id, non_blank(self.name)) {
            (Some(id), Some(name)) => Some(Vault { id, name }),
            (id, name) => {
                warn!("skipping vault without id or name ({:?}, {:?})", id, name);
                None
            }
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct RawItem {
    id: Option<String>,
    item_id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<Value>,
    content: Option<RawContent>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct RawContent {
    title: Option<String>,
    note: Option<String>,
    content: Value,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct RawLogin {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
    url: Option<String>,
    urls: Option<Vec<Value>>,
    totp_uri: Option<String>,
}

impl RawItem {
    fn into_item(self) -> Option<Item> {
        let id = match non_blank(self.id).or_else(|| non_blank(self.item_id)) {
            Some(id) => id,
            None => {
                warn!("skipping item without an id");
                return None;
            }
        };
        let content = self.content.unwrap_or_default();

        // `content.content` is tagged by item type: {"Login": {...}}, {"Note": null}, ...
        let variant = match &content.content {
            Value::Object(map) => map.keys().next().cloned(),
            Value::String(s) => Some(s.clone()),
            _ => None,
        };

        let kind = match self.kind {
            Some(Value::String(s)) if !s.is_empty() => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => variant.unwrap_or_else(|| "N/A".to_string()),
        };

        let login = content
            .content
            .get("Login")
            .filter(|v| !v.is_null())
            .and_then(|v| match serde_json::from_value::<RawLogin>(v.clone()) {
                Ok(login) => Some(login),
                Err(err) => {
                    warn!("item {}: unreadable login section: {}", id, err);
                    None
                }
            })
            .map(|l| {
                let urls: Vec<&str> = l
                    .urls
                    .iter()
                    .flatten()
                    .filter_map(Value::as_str)
                    .collect();
                Login {
                    username: l.username,
                    email: l.email,
                    password: l.password,
                    url: l.url.or_else(|| {
                        if urls.is_empty() {
                            None
                        } else {
                            Some(urls.join(", "))
                        }
                    }),
                    totp_uri: l.totp_uri,
                }
            });

        Some(Item {
            id,
            kind,
            title: content.title.unwrap_or_default(),
            note: content.note,
            login,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Decodes each record on its own; one that does not fit is skipped.
fn records<T>(values: Vec<Value>, what: &str) -> Vec<T>
where
    T: DeserializeOwned,
{
    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!("skipping unreadable {}: {}", what, err);
                None
            }
        })
        .collect()
}

pub struct PassCli<R> {
    runner: R,
    timeouts: Timeouts,
}

impl<R: Runner> PassCli<R> {
    pub fn new(runner: R, timeouts: Timeouts) -> PassCli<R> {
        PassCli { runner, timeouts }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Any non-blank `info` output counts as a live session. Expired tokens
    /// that still print something are not told apart.
    pub fn is_logged_in(&self) -> bool {
        match self.exec(argv(&["info"]), self.control(), None) {
            Ok(stdout) => !stdout.trim().is_empty(),
            Err(err) => {
                debug!("login check failed: {}", err);
                false
            }
        }
    }

    pub fn login(&self) -> Result<(), CliError> {
        self.exec(argv(&["login"]), Limit::Interactive, None)
            .map(drop)
    }

    pub fn logout(&self) -> Result<(), CliError> {
        self.exec(argv(&["logout"]), self.control(), None).map(drop)
    }

    pub fn list_vaults(&self) -> Result<Vec<Vault>, CliError> {
        let raw: Vec<Value> = self.call(
            argv(&["vault", "list", "--output", "json"]),
            self.bulk(),
            Some("vaults"),
        )?;

        let mut seen = HashSet::new();
        Ok(records::<RawVault>(raw, "vault")
            .into_iter()
            .filter_map(RawVault::into_vault)
            .filter(|v| {
                let fresh = seen.insert(v.id.clone());
                if !fresh {
                    warn!("vault {} listed twice, keeping the first", v.id);
                }
                fresh
            })
            .collect())
    }

    pub fn list_items(&self, vault_name: &str) -> Result<Vec<Item>, CliError> {
        let raw: Vec<Value> = self.call(
            argv(&[
                "item",
                "list",
                vault_name,
                "--filter-state=active",
                "--output",
                "json",
            ]),
            self.bulk(),
            Some("items"),
        )?;
        Ok(records::<RawItem>(raw, "item")
            .into_iter()
            .filter_map(RawItem::into_item)
            .collect())
    }

    pub fn user_info(&self) -> Result<UserInfo, CliError> {
        self.call(
            argv(&["user", "info", "--output", "json"]),
            self.control(),
            None,
        )
    }

    pub fn create_login(&self, req: &NewLogin) -> Result<(), CliError> {
        if req.title.trim().is_empty() {
            return Err(CliError::Validation("a title is required".to_string()));
        }
        if req.vault_name.trim().is_empty() {
            return Err(CliError::Validation("no vault selected".to_string()));
        }
        let secret = req.password.as_deref();
        self.exec(create_args(req), self.bulk(), secret).map(drop)
    }

    pub fn generate_password(&self, policy: &PasswordPolicy) -> Result<String, CliError> {
        let stdout = self.exec(policy_args(policy), self.control(), None)?;
        let password = stdout.trim();
        if password.is_empty() {
            return Err(CliError::MalformedOutput { raw: stdout });
        }
        Ok(password.to_string())
    }

    pub fn score_password(&self, password: &str) -> Result<PasswordScore, CliError> {
        let args = argv(&["password", "score", password, "--output", "json"]);
        let stdout = self.exec(args, self.control(), Some(password))?;
        decode(&stdout, None)
    }

    fn control(&self) -> Limit {
        Limit::Bounded(self.timeouts.control)
    }

    fn bulk(&self) -> Limit {
        Limit::Bounded(self.timeouts.bulk)
    }

    fn call<T>(&self, args: Vec<String>, limit: Limit, envelope: Option<&str>) -> Result<T, CliError>
    where
        T: DeserializeOwned,
    {
        let stdout = self.exec(args, limit, None)?;
        decode(&stdout, envelope)
    }

    fn exec(&self, args: Vec<String>, limit: Limit, secret: Option<&str>) -> Result<String, CliError> {
        debug!("pass-cli {}", redact(&args, secret).join(" "));
        let output = self.runner.run(&args, limit)?;
        if !output.success() {
            return Err(CliError::CommandFailed {
                stderr: failure_message(&output),
            });
        }
        Ok(output.stdout)
    }
}

fn decode<T>(stdout: &str, envelope: Option<&str>) -> Result<T, CliError>
where
    T: DeserializeOwned,
{
    let malformed = |err: serde_json::Error| {
        debug!("decoding pass-cli output failed: {}", err);
        CliError::MalformedOutput {
            raw: stdout.trim().to_string(),
        }
    };

    let value: Value = serde_json::from_str(stdout).map_err(malformed)?;
    let value = match envelope {
        Some(key) => unwrap_envelope(value, key),
        None => value,
    };
    serde_json::from_value(value).map_err(malformed)
}

/// `{"<key>": [...]}` becomes `[...]`, anything else is left alone.
fn unwrap_envelope(value: Value, key: &str) -> Value {
    match value {
        Value::Object(mut map) if map.get(key).map_or(false, Value::is_array) => {
            debug!("unwrapping `{}` envelope", key);
            map.remove(key).unwrap_or_default()
        }
        other => other,
    }
}

fn failure_message(output: &Output) -> String {
    let stderr = output.stderr.trim();
    if stderr.is_empty() {
        format!("pass-cli exited with status {}", output.code)
    } else {
        stderr.to_string()
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn redact(args: &[String], secret: Option<&str>) -> Vec<String> {
    let secret = match secret {
        Some(s) if !s.is_empty() => s,
        _ => return args.to_vec(),
    };
    args.iter()
        .map(|arg| match arg.split_once('=') {
            _ if arg == secret => "***".to_string(),
            Some((flag, value)) if value == secret => format!("{}=***", flag),
            _ => arg.clone(),
        })
        .collect()
}

/// Every flag is always present, empty when the field was left blank.
pub fn create_args(req: &NewLogin) -> Vec<String> {
    let or_empty = |v: &Option<String>| v.clone().unwrap_or_default();
    vec![
        "item".to_string(),
        "create".to_string(),
        "login".to_string(),
        format!("--vault-name={}", req.vault_name),
        format!("--title={}", req.title),
        format!("--username={}", or_empty(&req.username)),
        format!("--email={}", or_empty(&req.email)),
        format!("--password={}", or_empty(&req.password)),
        format!("--url={}", or_empty(&req.url)),
    ]
}

pub fn policy_args(policy: &PasswordPolicy) -> Vec<String> {
    let mut args = argv(&["password", "generate"]);
    match policy {
        PasswordPolicy::Random {
            length,
            numbers,
            symbols,
            uppercase,
        } => args.extend(vec![
            "random".to_string(),
            format!("--length={}", length),
            format!("--numbers={}", numbers),
            format!("--symbols={}", symbols),
            format!("--uppercase={}", uppercase),
        ]),
        PasswordPolicy::Passphrase {
            word_count,
            separator,
            capitalize,
            numbers,
        } => args.extend(vec![
            "passphrase".to_string(),
            format!("--count={}", word_count),
            format!("--separator={}", separator),
            format!("--capitalize={}", capitalize),
            format!("--numbers={}", numbers),
        ]),
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::scripted::ScriptedRunner;

    const ITEMS: &str = r#"{"items": [
        {"id": "i1", "content": {"title": "GitHub", "note": "work account",
            "content": {"Login": {"email": "jos@example.org", "username": "jos",
                "password": "hunter2", "urls": ["https://github.com"], "totp_uri": "otpauth://x"}}}},
        {"id": "i2", "type": "note", "content": {"title": "Wifi", "note": null,
            "content": {"Note": null}}}
    ]}"#;

    fn cli(runner: ScriptedRunner) -> PassCli<ScriptedRunner> {
        PassCli::new(runner, Timeouts::default())
    }

    #[test]
    fn vault_envelope_and_bare_array_decode_the_same() {
        let enveloped = cli(ScriptedRunner::new()
            .ok(r#"{"vaults": [{"vault_id": "v1", "name": "Personal"}, {"vault_id": "v2", "name": "Work"}]}"#));
        let bare = cli(ScriptedRunner::new()
            .ok(r#"[{"vault_id": "v1", "name": "Personal"}, {"vault_id": "v2", "name": "Work"}]"#));

        let a = enveloped.list_vaults().unwrap();
        let b = bare.list_vaults().unwrap();
        assert_eq!(a, b);
        assert_eq!(a[1].name, "Work");
        assert_eq!(
            enveloped.runner().calls(),
            vec![argv(&["vault", "list", "--output", "json"])]
        );
        assert_eq!(
            enveloped.runner().limits(),
            vec![Limit::Bounded(Duration::from_secs(60))]
        );
    }

    #[test]
    fn duplicate_vault_ids_keep_the_first() {
        let cli = cli(ScriptedRunner::new().ok(
            r#"[{"vault_id": "v1", "name": "A"}, {"vault_id": "v1", "name": "B"}, {"id": "v2", "name": "C"}]"#,
        ));
        let names: Vec<String> = cli.list_vaults().unwrap().into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["A", "C"]);
    }

    #[test]
    fn list_items_decodes_nested_login() {
        let cli = cli(ScriptedRunner::new().ok(ITEMS));
        let items = cli.list_items("Personal").unwrap();

        assert_eq!(
            cli.runner().calls(),
            vec![argv(&[
                "item",
                "list",
                "Personal",
                "--filter-state=active",
                "--output",
                "json"
            ])]
        );
        assert_eq!(items.len(), 2);

        let github = &items[0];
        assert_eq!(github.title, "GitHub");
        assert_eq!(github.kind, "Login");
        assert_eq!(github.note.as_deref(), Some("work account"));
        let login = github.login.as_ref().unwrap();
        assert_eq!(login.url.as_deref(), Some("https://github.com"));
        assert_eq!(login.password.as_deref(), Some("hunter2"));
        assert!(github.has_totp());

        assert_eq!(items[1].kind, "note");
        assert!(items[1].login.is_none());
    }

    #[test]
    fn null_urls_keep_the_login() {
        let cli = cli_with(
            r#"[{"id": "i1", "content": {"title": "Forum", "content": {"Login":
                {"username": "jos", "email": "jos@x.org", "password": "hunter2", "urls": null}}}}]"#,
        );
        let items = cli.list_items("Personal").unwrap();

        assert_eq!(items[0].identity(), "jos@x.org");
        assert_eq!(items[0].password(), Some("hunter2"));
        assert_eq!(items[0].login.as_ref().unwrap().url, None);
    }

    #[test]
    fn vault_with_both_id_keys_prefers_vault_id() {
        let cli = cli_with(
            r#"{"vaults": [{"id": "x", "vault_id": "v1", "name": "Personal"}, {"name": "Nameless"}]}"#,
        );
        assert_eq!(
            cli.list_vaults().unwrap(),
            vec![Vault {
                id: "v1".to_string(),
                name: "Personal".to_string(),
            }]
        );
    }

    #[test]
    fn odd_items_are_skipped_not_fatal() {
        let cli = cli_with(
            r#"[{"id": null, "content": {"title": "Ghost"}},
                {"id": "i2", "content": {"title": "Wifi"}},
                "garbage",
                {"item_id": "i3", "content": {"title": "Bank"}}]"#,
        );
        let items = cli.list_items("Personal").unwrap();

        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["i2", "i3"]);
        assert_eq!(items[0].title, "Wifi");
    }

    #[test]
    fn non_zero_exit_is_command_failed() {
        let cli = cli(ScriptedRunner::new().fail("vault not found\n"));
        match cli.list_items("Nope") {
            Err(CliError::CommandFailed { stderr }) => assert_eq!(stderr, "vault not found"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn silent_failure_reports_the_status() {
        let cli = cli(ScriptedRunner::new().reply(2, "", ""));
        let err = cli.logout().unwrap_err();
        assert_eq!(err.to_string(), "pass-cli exited with status 2");
    }

    #[test]
    fn undecodable_output_is_malformed() {
        let cli = cli(ScriptedRunner::new().ok("Please log in first\n"));
        match cli.list_vaults() {
            Err(CliError::MalformedOutput { raw }) => assert_eq!(raw, "Please log in first"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn wrong_shape_is_malformed() {
        let cli = cli(ScriptedRunner::new().ok(r#"{"vaults": "none"}"#));
        assert!(matches!(
            cli.list_vaults(),
            Err(CliError::MalformedOutput { .. })
        ));

        let cli = cli_with(r#"["not", "an", "object"]"#);
        assert!(matches!(
            cli.user_info(),
            Err(CliError::MalformedOutput { .. })
        ));
    }

    fn cli_with(stdout: &str) -> PassCli<ScriptedRunner> {
        cli(ScriptedRunner::new().ok(stdout))
    }

    #[test]
    fn expiry_is_timeout() {
        let cli = cli(ScriptedRunner::new().time_out(Duration::from_secs(60)));
        assert!(matches!(cli.list_vaults(), Err(CliError::Timeout(_))));
    }

    #[test]
    fn login_check_needs_non_blank_output() {
        assert!(cli_with("Logged in as jos\n").is_logged_in());
        assert!(!cli_with("  \n").is_logged_in());
        assert!(!cli(ScriptedRunner::new().reply(1, "session expired", "")).is_logged_in());

        let checked = cli_with("ok");
        checked.is_logged_in();
        assert_eq!(checked.runner().calls(), vec![argv(&["info"])]);
        assert_eq!(
            checked.runner().limits(),
            vec![Limit::Bounded(Duration::from_secs(20))]
        );
    }

    #[test]
    fn login_is_interactive() {
        let cli = cli_with("");
        cli.login().unwrap();
        assert_eq!(cli.runner().limits(), vec![Limit::Interactive]);
    }

    #[test]
    fn user_info_keeps_arbitrary_fields() {
        let cli = cli_with(r#"{"email": "jos@example.org", "plan": {"name": "free"}, "storage": 12}"#);
        let info = cli.user_info().unwrap();
        assert_eq!(info["email"], "jos@example.org");
        assert_eq!(info["storage"], 12);
        assert!(info["plan"].is_object());
    }

    #[test]
    fn empty_title_never_reaches_the_executable() {
        let cli = cli(ScriptedRunner::new());
        let req = NewLogin {
            vault_name: "Personal".to_string(),
            title: "  ".to_string(),
            ..NewLogin::default()
        };

        assert!(matches!(cli.create_login(&req), Err(CliError::Validation(_))));
        assert!(cli.runner().calls().is_empty());
    }

    #[test]
    fn create_fills_every_flag_in_order() {
        let cli = cli_with("");
        let req = NewLogin {
            vault_name: "Personal".to_string(),
            title: "GitHub".to_string(),
            email: Some("jos@example.org".to_string()),
            password: Some("s3cret; rm -rf".to_string()),
            ..NewLogin::default()
        };
        cli.create_login(&req).unwrap();

        assert_eq!(
            cli.runner().calls(),
            vec![argv(&[
                "item",
                "create",
                "login",
                "--vault-name=Personal",
                "--title=GitHub",
                "--username=",
                "--email=jos@example.org",
                "--password=s3cret; rm -rf",
                "--url=",
            ])]
        );
        assert_eq!(
            cli.runner().limits(),
            vec![Limit::Bounded(Duration::from_secs(60))]
        );
    }

    #[test]
    fn random_policy_arguments() {
        let policy = PasswordPolicy::Random {
            length: 24,
            numbers: true,
            symbols: true,
            uppercase: true,
        };
        assert_eq!(
            policy_args(&policy).join(" "),
            "password generate random --length=24 --numbers=true --symbols=true --uppercase=true"
        );
    }

    #[test]
    fn passphrase_policy_arguments() {
        let policy = PasswordPolicy::Passphrase {
            word_count: 4,
            separator: ".".to_string(),
            capitalize: true,
            numbers: false,
        };
        assert_eq!(
            policy_args(&policy),
            argv(&[
                "password",
                "generate",
                "passphrase",
                "--count=4",
                "--separator=.",
                "--capitalize=true",
                "--numbers=false",
            ])
        );
    }

    #[test]
    fn generated_password_is_trimmed() {
        let cli = cli_with("correct-horse-battery\n");
        assert_eq!(
            cli.generate_password(&PasswordPolicy::passphrase()).unwrap(),
            "correct-horse-battery"
        );
        assert!(matches!(
            cli_with("\n").generate_password(&PasswordPolicy::random()),
            Err(CliError::MalformedOutput { .. })
        ));
    }

    #[test]
    fn score_reads_the_label() {
        let cli = cli_with(r#"{"password_score": "Strong", "penalties": []}"#);
        let score = cli.score_password("-x9!").unwrap();
        assert!(score.is_strong());
        assert_eq!(
            cli.runner().calls(),
            vec![argv(&["password", "score", "-x9!", "--output", "json"])]
        );
    }

    #[test]
    fn secrets_are_redacted_from_logs() {
        let args = argv(&["item", "create", "--password=hunter2", "--title=hunter2x"]);
        assert_eq!(
            redact(&args, Some("hunter2")),
            argv(&["item", "create", "--password=***", "--title=hunter2x"])
        );
        assert_eq!(redact(&args, None), args);
    }
}
