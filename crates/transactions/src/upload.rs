use rand::Rng;
use std::path::{Path, PathBuf};
use tokio::fs;

const DEFAULT_NAME: &str = "upload.csv";

/// Stores uploaded files in one directory under collision-free names.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `data` to a new file and returns its path.
    pub async fn save(&self, original_name: Option<&str>, data: &[u8]) -> std::io::Result<PathBuf> {
        fs::create_dir_all(&self.dir).await?;

        let path = self.dir.join(unique_file_name(original_name));
        fs::write(&path, data).await?;

        tracing::debug!("Stored upload of {} bytes at {}", data.len(), path.display());
        Ok(path)
    }
}

/// `<16 hex chars>-<name>`, keeping only the final path component of the
/// client-supplied name and replacing anything unusual.
fn unique_file_name(original_name: Option<&str>) -> String {
    let mut rng = rand::thread_rng();
    let prefix: String = (0..8).map(|_| format!("{:02x}", rng.r#gen::<u8>())).collect();

    let name = original_name
        .and_then(|n| Path::new(n).file_name())
        .and_then(|n| n.to_str())
        .map(sanitize)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_NAME.to_string());

    format!("{prefix}-{name}")
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_unique_file_name_keeps_base_name() {
        let name = unique_file_name(Some("../../etc/statement.csv"));
        let (prefix, rest) = name.split_once('-').unwrap();
        assert_eq!(prefix.len(), 16);
        assert!(prefix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(rest, "statement.csv");
    }

    #[test]
    fn test_unique_file_name_default() {
        assert!(unique_file_name(None).ends_with("-upload.csv"));
        assert!(unique_file_name(Some("")).ends_with("-upload.csv"));
    }

    #[test]
    fn test_unique_file_name_sanitizes() {
        assert!(unique_file_name(Some("my file (1).csv")).ends_with("-my_file__1_.csv"));
    }

    #[test]
    fn test_names_do_not_collide() {
        assert_ne!(unique_file_name(Some("a.csv")), unique_file_name(Some("a.csv")));
    }

    #[tokio::test]
    async fn test_save_writes_file() {
        let dir = TempDir::new().unwrap();
        let store = UploadStore::new(dir.path().join("uploads"));

        let path = store.save(Some("data.csv"), b"a,b,c,d\n").await.unwrap();
        assert!(path.starts_with(store.dir()));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a,b,c,d\n");
    }
}
