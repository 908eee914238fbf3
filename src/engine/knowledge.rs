// src/engine/knowledge.rs

//! The [`KnowledgeBase`]: environment facts about the evidence source
//! (OS guess, hostname, timezone, registered users) populated once by a
//! preprocessing pass before extraction, read-only afterward.
//!
//! Preprocessing plugins each contribute one attribute and declare a
//! weight 1 to 3; the driver runs all weight-1 plugins, then weight-2,
//! then weight-3, so plugins that need no prior knowledge run first and
//! later plugins may consult what earlier tiers collected. A plugin
//! failure is logged and does not stop other plugins from running.
//!
//! [`KnowledgeBase`]: KnowledgeBase

use std::collections::HashMap;
use std::io::{Read, Result};
use std::sync::Arc;

use ::si_trace_print::{defn, defo, defx};

use crate::common::FPath;
use crate::data::pathspec::{PathSpec, PathSpecP};
use crate::de_wrn;
use crate::readers::resolver::{FileSystem, Resolver};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// KnowledgeBase
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Operating-system family of the evidence source.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum OsFamily {
    Linux,
    MacOs,
    Windows,
    Unknown,
}

impl OsFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            OsFamily::Linux => "linux",
            OsFamily::MacOs => "macos",
            OsFamily::Windows => "windows",
            OsFamily::Unknown => "unknown",
        }
    }
}

/// One registered user account found on the evidence source.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UserAccount {
    pub username: String,
    pub identifier: String,
    pub homedir: FPath,
}

/// Read-mostly store of environment facts. Written only during
/// preprocessing (single writer, no extraction yet running), then shared
/// immutably across all workers.
#[derive(Clone, Debug)]
pub struct KnowledgeBase {
    pub platform_guess: OsFamily,
    pub hostname: Option<String>,
    /// Timezone name, e.g. `"Europe/Amsterdam"`.
    pub timezone: Option<String>,
    /// Text codepage for legacy single-byte log files.
    pub codepage: String,
    pub registered_users: Vec<UserAccount>,
    /// Windows registry control-set name; `None` on non-Windows sources.
    pub control_set_name: Option<String>,
    /// Resolved symbolic path placeholders, e.g.
    /// `"%%environ_systemroot%%"` to `"/Windows"`.
    pub collected_paths: HashMap<String, FPath>,
}

impl Default for KnowledgeBase {
    fn default() -> KnowledgeBase {
        KnowledgeBase::new()
    }
}

impl KnowledgeBase {
    pub fn new() -> KnowledgeBase {
        KnowledgeBase {
            platform_guess: OsFamily::Unknown,
            hostname: None,
            timezone: None,
            codepage: String::from("utf-8"),
            registered_users: Vec::new(),
            control_set_name: None,
            collected_paths: HashMap::new(),
        }
    }

    /// Expand symbolic placeholders in a path pattern to concrete paths.
    /// `%%users.homedir%%` fans out to one path per registered user;
    /// other `%%…%%` placeholders substitute from `collected_paths`.
    /// An unresolvable placeholder yields no paths (logged).
    pub fn expand_path_placeholders(
        &self,
        pattern: &str,
    ) -> Vec<FPath> {
        defn!("({:?})", pattern);
        const USERS_HOMEDIR: &str = "%%users.homedir%%";
        if pattern.contains(USERS_HOMEDIR) {
            let expanded: Vec<FPath> = self
                .registered_users
                .iter()
                .map(|user| pattern.replace(USERS_HOMEDIR, user.homedir.as_str()))
                .collect();
            defx!("return {} per-user paths", expanded.len());
            return expanded;
        }
        let mut resolved: FPath = pattern.to_string();
        let mut scan_from: usize = 0;
        while let Some(offset) = resolved[scan_from..].find("%%") {
            let start: usize = scan_from + offset;
            let rest: &str = &resolved[start + 2..];
            let end: usize = match rest.find("%%") {
                Some(val) => start + 2 + val + 2,
                None => break,
            };
            let placeholder: String = resolved[start..end].to_string();
            match self.collected_paths.get(&placeholder) {
                Some(path) => {
                    resolved.replace_range(start..end, path.as_str());
                    // resume after the inserted value; a value that itself
                    // contains "%%" markers must never re-expand
                    scan_from = start + path.len();
                }
                None => {
                    de_wrn!("unresolved path placeholder {:?} in {:?}", placeholder, pattern);
                    defx!("return no paths");
                    return Vec::new();
                }
            }
        }
        defx!("return {:?}", resolved);
        vec![resolved]
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PreprocessPlugin
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One preprocessing step contributing one `KnowledgeBase` attribute.
pub trait PreprocessPlugin {
    fn name(&self) -> &'static str;
    /// Operating systems this plugin applies to.
    fn supported_os(&self) -> &'static [OsFamily];
    /// Execution tier, 1 to 3. Lower weights run first; a higher-weight
    /// plugin may rely on attributes collected by lower tiers.
    fn weight(&self) -> u8;
    /// The `KnowledgeBase` attribute this plugin populates.
    fn attribute(&self) -> &'static str;
    fn run(
        &self,
        resolver: &mut Resolver,
        fs: &dyn FileSystem,
        knowledge: &mut KnowledgeBase,
    ) -> Result<()>;
}

/// The built-in preprocessing plugins, in an explicit deterministic
/// order within each weight tier.
pub fn preprocess_plugins() -> Vec<Box<dyn PreprocessPlugin>> {
    vec![
        Box::new(HostnamePlugin {}),
        Box::new(TimezonePlugin {}),
        Box::new(UserAccountsPlugin {}),
    ]
}

/// Populate `knowledge` from the evidence source: guess the OS family,
/// then run every applicable plugin in weight order 1 → 2 → 3.
/// Plugin failures are logged and never fatal.
pub fn run_preprocessing(
    resolver: &mut Resolver,
    fs: &dyn FileSystem,
    knowledge: &mut KnowledgeBase,
) {
    defn!();
    knowledge.platform_guess = guess_platform(resolver, fs);
    defo!("platform_guess {:?}", knowledge.platform_guess);
    let plugins: Vec<Box<dyn PreprocessPlugin>> = preprocess_plugins();
    for weight in 1..=3u8 {
        for plugin in plugins.iter() {
            if plugin.weight() != weight {
                continue;
            }
            if !plugin.supported_os().contains(&knowledge.platform_guess) {
                defo!("skip plugin {:?} (unsupported OS)", plugin.name());
                continue;
            }
            match plugin.run(resolver, fs, knowledge) {
                Ok(_) => defo!("plugin {:?} set {:?}", plugin.name(), plugin.attribute()),
                Err(_err) => {
                    de_wrn!(
                        "preprocessing plugin {:?} failed for attribute {:?}: {}",
                        plugin.name(), plugin.attribute(), _err,
                    );
                }
            }
        }
    }
    defx!();
}

/// Guess the OS family from landmark paths under the source root.
fn guess_platform(
    resolver: &mut Resolver,
    fs: &dyn FileSystem,
) -> OsFamily {
    if source_file_exists(resolver, fs, "/etc/passwd") {
        if source_file_exists(resolver, fs, "/System/Library/CoreServices/SystemVersion.plist") {
            return OsFamily::MacOs;
        }
        return OsFamily::Linux;
    }
    if source_file_exists(resolver, fs, "/Windows/System32/config/SOFTWARE")
        || source_file_exists(resolver, fs, "/Windows/System32")
    {
        return OsFamily::Windows;
    }
    OsFamily::Unknown
}

/// Build a `PathSpec` for `relative` under the source root.
fn source_pathspec(
    fs: &dyn FileSystem,
    relative: &str,
) -> Result<PathSpecP> {
    let root = fs.open_root()?;
    let root_spec: &PathSpecP = root.pathspec();
    let location: FPath = format!(
        "{}/{}",
        root_spec.location.trim_end_matches('/'),
        relative.trim_start_matches('/'),
    );
    Ok(Arc::new(PathSpec {
        type_indicator: root_spec.type_indicator,
        location,
        store_index: None,
        parent: root_spec.parent.clone(),
    }))
}

fn source_file_exists(
    resolver: &mut Resolver,
    fs: &dyn FileSystem,
    relative: &str,
) -> bool {
    let pathspec: PathSpecP = match source_pathspec(fs, relative) {
        Ok(val) => val,
        Err(_) => return false,
    };
    resolver.open_file_entry(fs, &pathspec).is_ok()
}

/// Read the content of `relative` under the source root as lossy UTF-8.
fn read_source_file(
    resolver: &mut Resolver,
    fs: &dyn FileSystem,
    relative: &str,
) -> Result<String> {
    let pathspec: PathSpecP = source_pathspec(fs, relative)?;
    let entry = resolver.open_file_entry(fs, &pathspec)?;
    let mut bytes: Vec<u8> = Vec::new();
    entry.open_stream()?.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// built-in plugins
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const OS_LINUX_MACOS: [OsFamily; 2] = [OsFamily::Linux, OsFamily::MacOs];

/// `/etc/hostname`, first non-empty line.
struct HostnamePlugin {}

impl PreprocessPlugin for HostnamePlugin {
    fn name(&self) -> &'static str {
        "hostname"
    }

    fn supported_os(&self) -> &'static [OsFamily] {
        &OS_LINUX_MACOS
    }

    fn weight(&self) -> u8 {
        1
    }

    fn attribute(&self) -> &'static str {
        "hostname"
    }

    fn run(
        &self,
        resolver: &mut Resolver,
        fs: &dyn FileSystem,
        knowledge: &mut KnowledgeBase,
    ) -> Result<()> {
        let content: String = read_source_file(resolver, fs, "/etc/hostname")?;
        if let Some(line) = content.lines().map(str::trim).find(|line| !line.is_empty()) {
            knowledge.hostname = Some(line.to_string());
        }
        Ok(())
    }
}

/// `/etc/timezone`, first non-empty line.
struct TimezonePlugin {}

impl PreprocessPlugin for TimezonePlugin {
    fn name(&self) -> &'static str {
        "timezone"
    }

    fn supported_os(&self) -> &'static [OsFamily] {
        &OS_LINUX_MACOS
    }

    fn weight(&self) -> u8 {
        2
    }

    fn attribute(&self) -> &'static str {
        "timezone"
    }

    fn run(
        &self,
        resolver: &mut Resolver,
        fs: &dyn FileSystem,
        knowledge: &mut KnowledgeBase,
    ) -> Result<()> {
        let content: String = read_source_file(resolver, fs, "/etc/timezone")?;
        if let Some(line) = content.lines().map(str::trim).find(|line| !line.is_empty()) {
            knowledge.timezone = Some(line.to_string());
        }
        Ok(())
    }
}

/// `/etc/passwd` account records; also records each user's home
/// directory for `%%users.homedir%%` expansion.
struct UserAccountsPlugin {}

impl PreprocessPlugin for UserAccountsPlugin {
    fn name(&self) -> &'static str {
        "user_accounts"
    }

    fn supported_os(&self) -> &'static [OsFamily] {
        &OS_LINUX_MACOS
    }

    fn weight(&self) -> u8 {
        2
    }

    fn attribute(&self) -> &'static str {
        "registered_users"
    }

    fn run(
        &self,
        resolver: &mut Resolver,
        fs: &dyn FileSystem,
        knowledge: &mut KnowledgeBase,
    ) -> Result<()> {
        let content: String = read_source_file(resolver, fs, "/etc/passwd")?;
        for line in content.lines() {
            let line: &str = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            // username:password:uid:gid:gecos:homedir:shell
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() < 6 {
                defo!("skip malformed passwd line {:?}", line);
                continue;
            }
            knowledge.registered_users.push(UserAccount {
                username: fields[0].to_string(),
                identifier: fields[2].to_string(),
                homedir: fields[5].to_string(),
            });
        }
        Ok(())
    }
}
