/// Path classification: maps a path to a semantic [`Category`].
///
/// Classification is a pure function of the path string. Rules live in one
/// static, ordered table; the first matching rule wins and anything that
/// matches nothing falls back to [`Category::Other`].
use crate::model::ScanResultItem;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

/// Semantic buckets a scanned entry can fall into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Cache,
    Log,
    Temporary,
    AppContainer,
    DeveloperCache,
    Download,
    Archive,
    Document,
    Image,
    Video,
    Audio,
    Source,
    Executable,
    Other,
}

impl Category {
    /// Human-readable label for display.
    pub fn label(self) -> &'static str {
        match self {
            Self::Cache => "Cache",
            Self::Log => "Log",
            Self::Temporary => "Temporary",
            Self::AppContainer => "App container",
            Self::DeveloperCache => "Developer cache",
            Self::Download => "Download",
            Self::Archive => "Archive",
            Self::Document => "Document",
            Self::Image => "Image",
            Self::Video => "Video",
            Self::Audio => "Audio",
            Self::Source => "Source",
            Self::Executable => "Executable",
            Self::Other => "Other",
        }
    }
}

/// A single classification rule.
enum Rule {
    /// Matches when the normalised path contains this `/`-delimited fragment.
    Location(&'static str, Category),
    /// Matches on the lowercased extension via [`categorise_extension`].
    Extension,
}

/// Ordered rule table. Developer caches come before generic caches because
/// several of them live under the generic cache directories.
const RULES: &[Rule] = &[
    Rule::Location("/library/developer/xcode/deriveddata/", Category::DeveloperCache),
    Rule::Location("/library/developer/xcode/archives/", Category::DeveloperCache),
    Rule::Location("/library/developer/coresimulator/caches/", Category::DeveloperCache),
    Rule::Location("/library/caches/homebrew/", Category::DeveloperCache),
    Rule::Location("/.cache/pip/", Category::DeveloperCache),
    Rule::Location("/.npm/_cacache/", Category::DeveloperCache),
    Rule::Location("/.gradle/caches/", Category::DeveloperCache),
    Rule::Location("/.m2/repository/", Category::DeveloperCache),
    Rule::Location("/.cargo/registry/", Category::DeveloperCache),
    Rule::Location("/node_modules/", Category::DeveloperCache),
    Rule::Location("/library/containers/", Category::AppContainer),
    Rule::Location("/library/group containers/", Category::AppContainer),
    Rule::Location("/.var/app/", Category::AppContainer),
    Rule::Location("/library/caches/", Category::Cache),
    Rule::Location("/.cache/", Category::Cache),
    Rule::Location("/appdata/local/temp/", Category::Temporary),
    Rule::Location("/library/logs/", Category::Log),
    Rule::Location("/var/log/", Category::Log),
    Rule::Extension,
    Rule::Location("/downloads/", Category::Download),
];

/// Classify a path. Total: always returns a category.
pub fn classify(path: &Path) -> Category {
    let normalised = normalise(path);

    for rule in RULES {
        match rule {
            Rule::Location(fragment, category) => {
                if normalised.contains(fragment) {
                    return *category;
                }
            }
            Rule::Extension => {
                let ext = path
                    .extension()
                    .map(|e| e.to_string_lossy())
                    .unwrap_or_default();
                if let Some(category) = categorise_extension(&ext) {
                    return category;
                }
            }
        }
    }
    Category::Other
}

/// Lowercase, forward slashes, and wrapped in `/` on both ends so that
/// location fragments match whole components, including the final one.
fn normalise(path: &Path) -> String {
    let lower = path.to_string_lossy().replace('\\', "/").to_lowercase();
    format!("/{}/", lower.trim_matches('/'))
}

/// Categorise a file extension, or `None` if it is not a known one.
///
/// Extensions are lowercased into a fixed-size stack buffer; anything longer
/// than 16 bytes is unknown.
pub fn categorise_extension(ext: &str) -> Option<Category> {
    let bytes = ext.as_bytes();
    if bytes.is_empty() || bytes.len() > 16 {
        return None;
    }

    let mut lower = [0u8; 16];
    for (dest, &src) in lower.iter_mut().zip(bytes.iter()) {
        *dest = src.to_ascii_lowercase();
    }
    let lower_str = std::str::from_utf8(&lower[..bytes.len()]).ok()?;

    let category = match lower_str {
        "log" | "trace" | "crash" | "ips" => Category::Log,
        "tmp" | "temp" | "bak" | "old" | "swp" | "part" | "crdownload" => Category::Temporary,
        "zip" | "rar" | "7z" | "tar" | "gz" | "tgz" | "bz2" | "xz" | "zst" | "cab" | "iso"
        | "dmg" | "pkg" | "xip" => Category::Archive,
        "doc" | "docx" | "pdf" | "txt" | "rtf" | "odt" | "xls" | "xlsx" | "ppt" | "pptx"
        | "csv" | "md" | "epub" | "pages" | "numbers" | "key" => Category::Document,
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "svg" | "webp" | "ico" | "tiff" | "tif"
        | "psd" | "raw" | "cr2" | "nef" | "heic" | "heif" => Category::Image,
        "mp4" | "mkv" | "avi" | "mov" | "wmv" | "flv" | "webm" | "m4v" | "mpg" | "mpeg" | "3gp" => {
            Category::Video
        }
        "mp3" | "wav" | "flac" | "aac" | "ogg" | "wma" | "m4a" | "opus" | "aiff" => {
            Category::Audio
        }
        "rs" | "py" | "js" | "ts" | "jsx" | "tsx" | "c" | "cpp" | "h" | "hpp" | "cs" | "java"
        | "go" | "rb" | "php" | "swift" | "kt" | "scala" | "html" | "css" | "scss" | "json"
        | "xml" | "yaml" | "yml" | "toml" | "sql" | "sh" => Category::Source,
        "exe" | "msi" | "dll" | "so" | "dylib" | "app" | "deb" | "rpm" | "appimage" => {
            Category::Executable
        }
        _ => return None,
    };
    Some(category)
}

/// Size and count totals for a single category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryStats {
    pub category: Category,
    pub total_size: u64,
    pub item_count: u64,
}

/// Per-category totals over a result set, largest category first.
pub fn summarise_categories(items: &[ScanResultItem]) -> Vec<CategoryStats> {
    let mut map: HashMap<Category, CategoryStats> = HashMap::new();

    for item in items {
        let entry = map.entry(item.category).or_insert(CategoryStats {
            category: item.category,
            total_size: 0,
            item_count: 0,
        });
        entry.total_size += item.size;
        entry.item_count += 1;
    }

    let mut results: Vec<CategoryStats> = map.into_values().collect();
    results.sort_by(|a, b| {
        b.total_size
            .cmp(&a.total_size)
            .then_with(|| a.category.cmp(&b.category))
    });
    results
}
