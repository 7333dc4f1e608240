use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;
use tracing::{info, warn};

const SYSTEM_MARKER: &str = "===SYSTEM===";
const USER_MARKER: &str = "===USER===";

/// System and user instructions for a vision call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub system: String,
    pub user: String,
}

impl PromptTemplate {
    /// Parse a prompt file laid out as `===SYSTEM===` text followed by
    /// `===USER===` text. Both sections must be non-empty.
    pub fn parse(contents: &str) -> Result<Self, PromptError> {
        let system_idx = contents.find(SYSTEM_MARKER).ok_or(PromptError::MissingMarkers)?;
        let user_idx = contents.find(USER_MARKER).ok_or(PromptError::MissingMarkers)?;
        if user_idx <= system_idx {
            return Err(PromptError::MissingMarkers);
        }

        let system = contents[system_idx + SYSTEM_MARKER.len()..user_idx].trim();
        let user = contents[user_idx + USER_MARKER.len()..].trim();
        if system.is_empty() || user.is_empty() {
            return Err(PromptError::EmptySection);
        }

        Ok(Self {
            system: system.to_string(),
            user: user.to_string(),
        })
    }

    pub fn prompt_length(&self) -> usize {
        self.system.chars().count() + self.user.chars().count()
    }
}

/// A prompt file with a built-in fallback, loaded once on first use.
///
/// Concurrent first callers share a single load.
pub struct PromptSource {
    path: PathBuf,
    fallback_system: &'static str,
    fallback_user: &'static str,
    cached: OnceCell<PromptTemplate>,
}

impl PromptSource {
    pub fn new(path: impl Into<PathBuf>, fallback_system: &'static str, fallback_user: &'static str) -> Self {
        Self {
            path: path.into(),
            fallback_system,
            fallback_user,
            cached: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self) -> &PromptTemplate {
        self.cached.get_or_init(|| self.load()).await
    }

    async fn load(&self) -> PromptTemplate {
        let loaded = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => PromptTemplate::parse(&contents),
            Err(e) => Err(PromptError::Io(e)),
        };

        match loaded {
            Ok(template) => {
                info!(path = %self.path.display(), "Loaded prompt template");
                template
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to read/parse prompt file, using built-in prompt"
                );
                PromptTemplate {
                    system: self.fallback_system.to_string(),
                    user: self.fallback_user.to_string(),
                }
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("Failed to read prompt file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Prompt file must contain ===SYSTEM=== followed by ===USER===")]
    MissingMarkers,

    #[error("Prompt file SYSTEM/USER sections must not be empty")]
    EmptySection,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_shipped_prompt_files_parse() {
        for file in ["palm-validation.prompt", "palm-analysis.prompt"] {
            let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("prompts").join(file);
            let contents = std::fs::read_to_string(&path).unwrap();
            let template = PromptTemplate::parse(&contents).unwrap();
            assert!(template.user.contains("JSON"), "{file}");
        }
    }

    #[test]
    fn test_parse_sections() {
        let template =
            PromptTemplate::parse("===SYSTEM===\n  You are kind.\n===USER===\nLook at this.\n").unwrap();
        assert_eq!(template.system, "You are kind.");
        assert_eq!(template.user, "Look at this.");
        assert_eq!(template.prompt_length(), "You are kind.".len() + "Look at this.".len());
    }

    #[test]
    fn test_parse_rejects_bad_layout() {
        assert!(matches!(
            PromptTemplate::parse("just text"),
            Err(PromptError::MissingMarkers)
        ));
        assert!(matches!(
            PromptTemplate::parse("===USER===\nu\n===SYSTEM===\ns"),
            Err(PromptError::MissingMarkers)
        ));
        assert!(matches!(
            PromptTemplate::parse("===SYSTEM===\n\n===USER===\nu"),
            Err(PromptError::EmptySection)
        ));
    }

    #[tokio::test]
    async fn test_missing_file_uses_fallback() {
        let source = PromptSource::new("/nonexistent/palm.prompt", "fallback system", "fallback user");
        let template = source.get().await;
        assert_eq!(template.system, "fallback system");
        assert_eq!(template.user, "fallback user");
    }

    #[tokio::test]
    async fn test_file_is_cached_after_first_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "===SYSTEM===\nfrom file\n===USER===\nuser from file").unwrap();

        let source = PromptSource::new(file.path(), "fallback", "fallback");
        assert_eq!(source.get().await.system, "from file");

        std::fs::write(file.path(), "garbage").unwrap();
        assert_eq!(source.get().await.system, "from file");
    }
}
