//! Lightweight text signatures used when the type hint is inconclusive.

use clipflow_core::Category;

/// Source language detected for `code` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    JavaScript,
    Css,
    Shell,
    Rust,
    Generic,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::Css => "css",
            Language::Shell => "shell",
            Language::Rust => "rust",
            Language::Generic => "generic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [
            Language::Python,
            Language::JavaScript,
            Language::Css,
            Language::Shell,
            Language::Rust,
            Language::Generic,
        ]
        .into_iter()
        .find(|l| l.as_str() == s)
    }

    /// Language implied by a normalized MIME hint.
    pub fn from_hint(hint: &str) -> Option<Self> {
        if hint.contains("python") {
            Some(Language::Python)
        } else if ["javascript", "ecmascript", "typescript"]
            .iter()
            .any(|k| hint.contains(k))
        {
            Some(Language::JavaScript)
        } else if hint.ends_with("/css") {
            Some(Language::Css)
        } else if hint.contains("shellscript") || hint.ends_with("x-sh") {
            Some(Language::Shell)
        } else if hint.contains("rust") {
            Some(Language::Rust)
        } else {
            None
        }
    }
}

/// Statement keywords and the companion keyword that must also appear.
const SQL_LEADS: &[(&str, &[&str])] = &[
    ("SELECT", &["FROM"]),
    ("INSERT", &["INTO"]),
    ("UPDATE", &["SET"]),
    ("DELETE", &["FROM"]),
    ("CREATE", &["TABLE", "INDEX", "VIEW", "DATABASE", "SCHEMA"]),
    ("ALTER", &["TABLE"]),
    ("DROP", &["TABLE", "INDEX", "VIEW", "DATABASE", "SCHEMA"]),
    ("WITH", &["SELECT"]),
];

const SHELL_COMMANDS: &[&str] = &[
    "sudo", "npm", "npx", "pip", "pip3", "docker", "kubectl", "git", "cd", "ls", "curl", "wget",
    "apt", "apt-get", "brew", "cargo", "make", "ssh", "chmod", "chown", "systemctl", "yarn",
];

const CSS_PROPERTIES: &[&str] = &[
    "margin:", "padding:", "color:", "background:", "display:", "border:", "font-size:",
    "width:", "height:",
];

const CODE_PUNCTUATION: &[char] = &['{', '}', ';', '(', ')', '[', ']', '='];

/// Category from text alone. `text` must be trimmed and non-empty.
pub fn detect_category(text: &str) -> Category {
    if is_url(text) {
        Category::Url
    } else if text.starts_with('{') || text.starts_with('[') {
        Category::Json
    } else if is_sql(text) {
        Category::Sql
    } else if detect_language(text).is_some() {
        Category::Code
    } else {
        Category::Text
    }
}

fn is_url(text: &str) -> bool {
    let lower = text.get(..8).unwrap_or(text).to_ascii_lowercase();
    (lower.starts_with("http://") || lower.starts_with("https://"))
        && !text.contains(char::is_whitespace)
}

/// Leading SQL statement keyword with its companion keyword.
pub fn is_sql(text: &str) -> bool {
    let body: String = text
        .lines()
        .skip_while(|l| {
            let l = l.trim();
            l.is_empty() || l.starts_with("--")
        })
        .collect::<Vec<_>>()
        .join("\n");

    let words: Vec<String> = body
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_uppercase)
        .collect();

    let Some(first) = words.first() else {
        return false;
    };
    SQL_LEADS
        .iter()
        .find(|(lead, _)| *lead == first.as_str())
        .is_some_and(|(_, companions)| words[1..].iter().any(|w| companions.contains(&w.as_str())))
}

/// Source language, if the text looks like code at all.
pub fn detect_language(text: &str) -> Option<Language> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let any_line = |pred: &dyn Fn(&str) -> bool| lines.iter().any(|l| pred(l));

    if any_line(&|l| {
        l.starts_with("fn ")
            || l.starts_with("pub fn ")
            || l.starts_with("impl ")
            || l.starts_with("let mut ")
            || l.starts_with("#[derive")
            || (l.starts_with("use ") && l.contains("::"))
    }) {
        return Some(Language::Rust);
    }

    if text.contains("console.log")
        || text.contains("=>")
        || text.contains("className=")
        || text.contains("<div")
        || any_line(&|l| {
            l.starts_with("function ")
                || l.starts_with("const ")
                || l.starts_with("let ")
                || l.starts_with("export ")
                || (l.starts_with("import ") && (l.contains(" from '") || l.contains(" from \"")))
        })
    {
        return Some(Language::JavaScript);
    }

    if text.contains("print(")
        || text.contains("__name__")
        || any_line(&|l| {
            l.starts_with("def ")
                || l.starts_with("import ")
                || l.starts_with("elif ")
                || (l.starts_with("from ") && l.contains(" import "))
                || (l.starts_with("class ") && l.ends_with(':'))
        })
    {
        return Some(Language::Python);
    }

    if text.contains('{')
        && text.contains('}')
        && text.contains(';')
        && !text.contains("function")
        && CSS_PROPERTIES.iter().any(|p| text.contains(p))
    {
        return Some(Language::Css);
    }

    let first_word = text.split_whitespace().next().unwrap_or_default();
    if text.starts_with("#!") || text.starts_with("$ ") || SHELL_COMMANDS.contains(&first_word) {
        return Some(Language::Shell);
    }

    let punctuation = text.chars().filter(|c| CODE_PUNCTUATION.contains(c)).count();
    if lines.len() > 1 && (punctuation > 3 || text.contains("return ")) {
        return Some(Language::Generic);
    }

    None
}
