//! Project-type classification.
//!
//! Maps a free-text request to a canonical project category and a target
//! directory for generated files. Pure keyword matching over a fixed,
//! ordered table; earlier entries win ties. A request that matches nothing
//! falls back to `python` or `web` depending on language hints. Requests
//! can also name an explicit location ("create a todo app in my_workspace"),
//! which replaces the default projects root.
//!
//! This is a text-to-struct transform with no side effects and no failure
//! mode; absence of a match is the default path, not an error.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

/// Canonical project categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectCategory {
    Todo,
    Calculator,
    Portfolio,
    Blog,
    Game,
    Api,
    Python,
    Web,
}

impl ProjectCategory {
    /// The directory name generated projects of this category live in.
    pub fn dir_name(&self) -> &'static str {
        match self {
            ProjectCategory::Todo => "todo_app",
            ProjectCategory::Calculator => "calculator_app",
            ProjectCategory::Portfolio => "portfolio_app",
            ProjectCategory::Blog => "blog_app",
            ProjectCategory::Game => "game_app",
            ProjectCategory::Api => "api_project",
            ProjectCategory::Python => "python_project",
            ProjectCategory::Web => "web_app",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectCategory::Todo => "todo",
            ProjectCategory::Calculator => "calculator",
            ProjectCategory::Portfolio => "portfolio",
            ProjectCategory::Blog => "blog",
            ProjectCategory::Game => "game",
            ProjectCategory::Api => "api",
            ProjectCategory::Python => "python",
            ProjectCategory::Web => "web",
        }
    }
}

impl std::fmt::Display for ProjectCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the classifier derived from one utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSpec {
    pub category: ProjectCategory,

    /// Relative directory generated files default into
    pub target_directory: PathBuf,

    /// Which keywords fired, for diagnostics
    pub detected_keywords: Vec<String>,
}

/// Ordered keyword table. First category with a hit wins.
const KEYWORD_TABLE: &[(ProjectCategory, &[&str])] = &[
    (ProjectCategory::Todo, &["todo", "to-do", "task list", "checklist"]),
    (ProjectCategory::Calculator, &["calculator", "calc app"]),
    (ProjectCategory::Portfolio, &["portfolio"]),
    (ProjectCategory::Blog, &["blog"]),
    (ProjectCategory::Game, &["game", "tic tac toe", "tic-tac-toe", "snake"]),
    (ProjectCategory::Api, &["api", "rest service", "endpoint", "backend server"]),
    (
        ProjectCategory::Web,
        &["website", "web app", "webpage", "landing page", "html", "frontend"],
    ),
    (ProjectCategory::Python, &["python script", "python project"]),
];

/// Fallback language hints when no category keyword matched.
const PYTHON_HINTS: &[&str] = &["python", ".py"];

/// Natural-language patterns naming an explicit target directory.
/// Checked in order; the first capture wins.
static LOCATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"save in location:\s*([\w./\\-]+)",
        r"create in directory:\s*([\w./\\-]+)",
        r"location:\s*([\w./\\-]+)",
        r"folder:\s*([\w./\\-]+)",
        r"(?:create|put|save|make)\b.*?\bin(?:to)?\s+(?:the\s+)?([\w./\\-]+)\s*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("location pattern must compile"))
    .collect()
});

/// Words that look like a trailing location but name a technology instead.
const LOCATION_STOPWORDS: &[&str] = &[
    "python", "html", "css", "javascript", "js", "typescript", "rust", "react", "flask", "django",
];

/// Classify an utterance into a project spec.
///
/// `projects_root` is the configured root for generated files (e.g.
/// `ai_projects`); it is used for the default target directory only. An
/// explicit location in the utterance replaces it.
pub fn classify(utterance: &str, projects_root: &Path) -> ProjectSpec {
    let lowered = utterance.to_lowercase();

    let mut detected = Vec::new();
    let mut category = None;

    for (cat, keywords) in KEYWORD_TABLE {
        let hits: Vec<&str> = keywords
            .iter()
            .copied()
            .filter(|k| keyword_hit(&lowered, k))
            .collect();
        if !hits.is_empty() {
            detected.extend(hits.iter().map(|s| s.to_string()));
            category = Some(*cat);
            break;
        }
    }

    let category = category.unwrap_or_else(|| {
        let hints: Vec<&str> = PYTHON_HINTS
            .iter()
            .copied()
            .filter(|h| keyword_hit(&lowered, h))
            .collect();
        if hints.is_empty() {
            ProjectCategory::Web
        } else {
            detected.extend(hints.iter().map(|s| s.to_string()));
            ProjectCategory::Python
        }
    });

    let target_directory = match extract_location(&lowered) {
        Some(custom) => custom.join(category.dir_name()),
        None => projects_root.join(category.dir_name()),
    };

    ProjectSpec {
        category,
        target_directory,
        detected_keywords: detected,
    }
}

/// Single-word keywords match on word boundaries so "capital" does not
/// trigger "api"; phrases and extensions match as substrings.
fn keyword_hit(lowered: &str, keyword: &str) -> bool {
    if keyword.chars().any(|c| !c.is_alphanumeric()) {
        lowered.contains(keyword)
    } else {
        lowered
            .split(|c: char| !c.is_alphanumeric())
            .any(|w| w == keyword)
    }
}

/// Scan the lowered utterance for an explicit target directory.
fn extract_location(lowered: &str) -> Option<PathBuf> {
    for pattern in LOCATION_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(lowered) {
            let raw = caps.get(1).map(|m| m.as_str())?;
            if LOCATION_STOPWORDS.contains(&raw) {
                continue;
            }
            let sanitized = sanitize_segment(raw);
            if !sanitized.as_os_str().is_empty() {
                return Some(sanitized);
            }
        }
    }
    None
}

/// Strip traversal segments and leading separators from a captured path.
fn sanitize_segment(raw: &str) -> PathBuf {
    let normalized = raw.replace('\\', "/");
    let mut out = PathBuf::new();
    for component in Path::new(normalized.trim_matches(|c| c == '"' || c == '\'')).components() {
        match component {
            Component::Normal(seg) => out.push(seg),
            // `..`, `/`, `.`, drive prefixes all dropped
            _ => {}
        }
    }
    out
}
