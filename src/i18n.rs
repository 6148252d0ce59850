// i18n.rs — runtime translation of user-facing strings
//
// Strings live in assets/i18n.json as { "<lang>": { "key": "value" } }.
// Lookup order: selected language, then "en", then the key itself.
// `{name}` placeholders are filled by `tr_with`.

use once_cell::sync::OnceCell;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::RwLock,
};

pub const FALLBACK_LANG: &str = "en";

/// Languages offered in the menu, as (code, native name).
pub const LANGUAGES: [(&str, &str); 4] = [
    ("en", "English"),
    ("zh-Hans", "简体中文"),
    ("ja", "日本語"),
    ("fr", "Français"),
];

type Table = HashMap<String, HashMap<String, String>>;

#[derive(Debug, Clone, Default)]
pub struct I18n {
    pub lang: String,
    map: HashMap<String, String>,
    fallback_map: HashMap<String, String>,
}

impl I18n {
    pub fn from_table(table: &Table, lang: &str) -> Self {
        let pick = |code: &str| table.get(code).cloned().unwrap_or_default();
        Self {
            lang: lang.to_string(),
            map: pick(lang),
            fallback_map: pick(FALLBACK_LANG),
        }
    }

    pub fn get(&self, key: &str) -> String {
        self.map
            .get(key)
            .or_else(|| self.fallback_map.get(key))
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}

static I18N: OnceCell<RwLock<I18n>> = OnceCell::new();

/// <exe_dir>/assets/i18n.json, then ./assets/i18n.json.
fn find_table_file() -> Option<PathBuf> {
    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("assets").join("i18n.json")));

    beside_exe
        .into_iter()
        .chain(std::iter::once(PathBuf::from("assets").join("i18n.json")))
        .find(|p| p.exists())
}

fn load_table(path: &Path) -> Option<Table> {
    let text = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&text) {
        Ok(table) => Some(table),
        Err(err) => {
            log::warn!("ignoring malformed {}: {err}", path.display());
            None
        }
    }
}

/// Select a language. Later calls replace the active one.
pub fn init(lang: impl Into<String>) {
    let lang = lang.into();
    let table = find_table_file().and_then(|p| load_table(&p)).unwrap_or_default();
    if table.is_empty() {
        log::warn!("no translations found, showing raw keys");
    }

    let i = I18n::from_table(&table, &lang);
    if let Some(lock) = I18N.get() {
        if let Ok(mut w) = lock.write() {
            *w = i;
        }
    } else {
        let _ = I18N.set(RwLock::new(i));
    }
}

/// Localized text for `key`, or the key itself when missing.
pub fn tr(key: &str) -> String {
    match I18N.get().and_then(|l| l.read().ok()) {
        Some(i) => i.get(key),
        None => key.to_string(),
    }
}

/// Localized text with `{name}` placeholders substituted. Unknown
/// placeholders are left in place.
pub fn tr_with(key: &str, args: &[(&str, String)]) -> String {
    fill(tr(key), args)
}

fn fill(mut s: String, args: &[(&str, String)]) -> String {
    for (k, v) in args {
        s = s.replace(&format!("{{{k}}}"), v);
    }
    s
}
