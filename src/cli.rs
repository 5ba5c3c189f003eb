//! Command-line interface parsing for reelpress
//!
//! The only argument is the path of the WordPress export. Tuning knobs come
//! from the environment (see [`crate::config`]).

use clap::Parser;
use std::path::{Path, PathBuf};

/// reelpress - enrich exported movie posts with TMDB metadata and posters
#[derive(Parser, Debug)]
#[command(name = "reelpress")]
#[command(about = "Migrate a WordPress export into records enriched with TMDB metadata")]
#[command(
    long_about = "Migrate a WordPress export into records enriched with TMDB metadata.\n\n\
    Migrated posts are printed to stdout as JSON; logs go to stderr.\n\n\
    Environment:\n  \
    TMDB_API_KEY              TMDB API key\n  \
    REELPRESS_CACHE_DIR       cache root (default: XDG cache dir)\n  \
    REELPRESS_CACHE_TTL_DAYS  cache entry lifetime in days (default: 30)\n  \
    REELPRESS_MAX_CONCURRENT  posts resolved at once (default: 8)"
)]
#[command(version)]
pub struct Cli {
    /// Path to the WordPress export (WXR) file
    #[arg(value_name = "EXPORT")]
    pub export: PathBuf,
}

impl Cli {
    /// The export path, resolved against `cwd` unless already absolute
    pub fn export_path(&self, cwd: &Path) -> PathBuf {
        if self.export.is_absolute() {
            self.export.clone()
        } else {
            cwd.join(&self.export)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_export_path() {
        let cli = Cli::parse_from(["reelpress", "export.xml"]);
        assert_eq!(cli.export, PathBuf::from("export.xml"));
    }

    #[test]
    fn test_cli_requires_export_path() {
        let result = Cli::try_parse_from(["reelpress"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_rejects_flags() {
        let result = Cli::try_parse_from(["reelpress", "--plan", "export.xml"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_export_path_relative_to_cwd() {
        let cli = Cli::parse_from(["reelpress", "dumps/export.xml"]);
        assert_eq!(
            cli.export_path(Path::new("/home/blog")),
            PathBuf::from("/home/blog/dumps/export.xml")
        );
    }

    #[test]
    fn test_export_path_absolute_is_kept() {
        let cli = Cli::parse_from(["reelpress", "/srv/export.xml"]);
        assert_eq!(
            cli.export_path(Path::new("/home/blog")),
            PathBuf::from("/srv/export.xml")
        );
    }
}
